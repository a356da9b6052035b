use super::types::{alloc_plane, AnalysisError, DifferenceMap, MotionMask};
use ndarray::Array2;

/// A pixel is motion iff its difference is strictly greater than `threshold`
pub fn build_mask(diff: &DifferenceMap, threshold: u8) -> Result<MotionMask, AnalysisError> {
    let mut plane = alloc_plane::<bool>(diff.len())?;
    plane.extend(diff.iter().map(|&value| value > threshold));
    Ok(Array2::from_shape_vec(diff.dim(), plane)?)
}

pub fn motion_pixel_count(mask: &MotionMask) -> usize {
    mask.iter().filter(|&&on| on).count()
}
