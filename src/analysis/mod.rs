mod blobs;
mod difference;
mod filter;
mod mask;
pub mod types;

pub use blobs::{extract_blobs, Connectivity};
pub use difference::{Difference, FrameDifferencer};
pub use filter::{MotionFilter, SizeEnvelope, Verdict};
pub use mask::{build_mask, motion_pixel_count};
pub use types::{AnalysisError, Rect};

use crate::config::DetectionSettings;
use image::RgbImage;

/// Outcome of analysing one frame
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    /// First frame of a session: it only seeds the reference
    Seeded,
    Verdict(Verdict),
}

/// Frame difference -> threshold mask -> blobs -> size/ROI filter.
///
/// One analyzer belongs to one capture session; the only state it carries
/// between frames is the differencer's reference plane.
pub struct FrameAnalyzer {
    differencer: FrameDifferencer,
    threshold: u8,
    connectivity: Connectivity,
    filter: MotionFilter,
    max_frame_pixels: usize,
}

impl FrameAnalyzer {
    pub fn new(settings: &DetectionSettings) -> Self {
        Self {
            differencer: FrameDifferencer::new(),
            threshold: settings.threshold,
            connectivity: settings.connectivity,
            filter: MotionFilter::new(settings.envelope, settings.roi),
            max_frame_pixels: settings.max_frame_pixels,
        }
    }

    #[cfg(test)]
    pub fn has_reference(&self) -> bool {
        self.differencer.has_reference()
    }

    pub fn analyze(&mut self, frame: &RgbImage) -> Result<Analysis, AnalysisError> {
        let _span = tracing::debug_span!("analyze").entered();

        let pixels = frame.width() as usize * frame.height() as usize;
        if pixels > self.max_frame_pixels {
            // grayscale, difference and mask planes
            return Err(AnalysisError::ResourceExhausted {
                bytes: pixels.saturating_mul(3),
            });
        }

        let diff = match self.differencer.difference(frame)? {
            Difference::Seeded => {
                tracing::debug!("Reference frame seeded");
                return Ok(Analysis::Seeded);
            }
            Difference::Ready(diff) => diff,
        };

        let mask = {
            let _span = tracing::debug_span!("mask").entered();
            build_mask(&diff, self.threshold)?
        };

        tracing::debug!("{} pixels over threshold", motion_pixel_count(&mask));

        let blobs = {
            let _span = tracing::debug_span!("blobs").entered();
            extract_blobs(&mask, self.connectivity)?
        };

        let blob_count = blobs.len();
        let verdict = self.filter.apply(blobs);

        tracing::debug!(
            "Blobs: {} found, {} accepted, motion={}",
            blob_count,
            verdict.regions.len(),
            verdict.motion
        );

        Ok(Analysis::Verdict(verdict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn settings() -> DetectionSettings {
        DetectionSettings::default()
    }

    fn frame_with_square(x0: u32, y0: u32, size: u32) -> RgbImage {
        RgbImage::from_fn(200, 150, |x, y| {
            if (x0..x0 + size).contains(&x) && (y0..y0 + size).contains(&y) {
                Rgb([250, 250, 250])
            } else {
                Rgb([10, 10, 10])
            }
        })
    }

    #[test]
    fn first_frame_only_seeds() {
        let mut analyzer = FrameAnalyzer::new(&settings());
        assert_eq!(
            analyzer.analyze(&frame_with_square(10, 10, 40)).unwrap(),
            Analysis::Seeded
        );
        assert!(analyzer.has_reference());
    }

    #[test]
    fn static_scene_has_no_motion() {
        let mut analyzer = FrameAnalyzer::new(&settings());
        let frame = frame_with_square(10, 10, 40);
        analyzer.analyze(&frame).unwrap();
        let Analysis::Verdict(verdict) = analyzer.analyze(&frame).unwrap() else {
            panic!("expected verdict");
        };
        assert!(!verdict.motion);
    }

    #[test]
    fn moved_object_is_detected() {
        let mut analyzer = FrameAnalyzer::new(&settings());
        analyzer.analyze(&frame_with_square(10, 10, 40)).unwrap();
        let Analysis::Verdict(verdict) = analyzer.analyze(&frame_with_square(100, 60, 40)).unwrap()
        else {
            panic!("expected verdict");
        };
        assert!(verdict.motion);
        assert_eq!(
            verdict.regions,
            vec![Rect::new(10, 10, 40, 40), Rect::new(100, 60, 40, 40)]
        );
    }

    #[test]
    fn tiny_change_is_filtered_out() {
        let mut analyzer = FrameAnalyzer::new(&settings());
        analyzer.analyze(&frame_with_square(10, 10, 5)).unwrap();
        let Analysis::Verdict(verdict) = analyzer.analyze(&frame_with_square(80, 80, 5)).unwrap()
        else {
            panic!("expected verdict");
        };
        assert!(!verdict.motion);
    }

    #[test]
    fn motion_outside_roi_is_ignored() {
        let mut settings = settings();
        settings.roi = Some(Rect::new(0, 0, 60, 60));
        let mut analyzer = FrameAnalyzer::new(&settings);

        analyzer.analyze(&frame_with_square(100, 90, 40)).unwrap();
        let Analysis::Verdict(verdict) = analyzer.analyze(&frame_with_square(150, 100, 40)).unwrap()
        else {
            panic!("expected verdict");
        };
        assert!(!verdict.motion);
    }

    #[test]
    fn frame_over_pixel_budget_is_refused() {
        let mut settings = settings();
        settings.max_frame_pixels = 100 * 100;
        let mut analyzer = FrameAnalyzer::new(&settings);

        let err = analyzer.analyze(&frame_with_square(10, 10, 40)).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::ResourceExhausted { bytes } if bytes == 200 * 150 * 3
        ));
        assert!(!analyzer.has_reference());
    }
}
