use super::types::{alloc_plane, plane_size, AnalysisError, DifferenceMap, GrayPlane};
use image::RgbImage;
use ndarray::Array2;

// BT.709 luma weights scaled to integers summing to 10_000
const LUMA_R: u32 = 2126;
const LUMA_G: u32 = 7152;
const LUMA_B: u32 = 722;
const LUMA_SCALE: u32 = 10_000;

/// BT.709 luminance of an sRGB pixel, rounded to the nearest byte
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let weighted = LUMA_R * r as u32 + LUMA_G * g as u32 + LUMA_B * b as u32;
    ((weighted + LUMA_SCALE / 2) / LUMA_SCALE) as u8
}

/// Convert an RGB frame to a luminance plane of the same size
pub fn to_grayscale(frame: &RgbImage) -> Result<GrayPlane, AnalysisError> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return Err(AnalysisError::EmptyFrame);
    }

    let mut plane = alloc_plane::<u8>(width as usize * height as usize)?;
    plane.extend(
        frame
            .as_raw()
            .chunks_exact(3)
            .map(|px| luminance(px[0], px[1], px[2])),
    );

    Ok(Array2::from_shape_vec(
        (height as usize, width as usize),
        plane,
    )?)
}

/// Per-pixel |incoming - reference|
pub fn absolute_difference(
    reference: &GrayPlane,
    incoming: &GrayPlane,
) -> Result<DifferenceMap, AnalysisError> {
    if reference.dim() != incoming.dim() {
        return Err(AnalysisError::DimensionMismatch {
            expected: plane_size(reference),
            actual: plane_size(incoming),
        });
    }

    let mut plane = alloc_plane::<u8>(reference.len())?;
    plane.extend(
        reference
            .iter()
            .zip(incoming.iter())
            .map(|(a, b)| a.abs_diff(*b)),
    );

    Ok(Array2::from_shape_vec(reference.dim(), plane)?)
}

/// Result of differencing one incoming frame
#[derive(Debug)]
pub enum Difference {
    /// No reference existed yet; the incoming frame became the reference
    Seeded,
    /// Difference against the previous frame
    Ready(DifferenceMap),
}

/// Holds the previous frame's luminance plane and differences each new frame
/// against it. The reference is replaced by every frame that converts
/// successfully, whatever the comparison outcome.
#[derive(Debug, Default)]
pub struct FrameDifferencer {
    reference: Option<GrayPlane>,
}

impl FrameDifferencer {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn has_reference(&self) -> bool {
        self.reference.is_some()
    }

    pub fn difference(&mut self, frame: &RgbImage) -> Result<Difference, AnalysisError> {
        let incoming = to_grayscale(frame)?;

        let outcome = match self.reference.as_ref() {
            None => Ok(Difference::Seeded),
            Some(reference) => absolute_difference(reference, &incoming).map(Difference::Ready),
        };

        self.reference = Some(incoming);
        outcome
    }
}
