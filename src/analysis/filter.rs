use super::types::Rect;

/// Inclusive bounds on blob width and height
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeEnvelope {
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for SizeEnvelope {
    fn default() -> Self {
        Self {
            min_width: 20,
            min_height: 20,
            max_width: 500,
            max_height: 500,
        }
    }
}

impl SizeEnvelope {
    pub fn contains(&self, rect: &Rect) -> bool {
        (self.min_width..=self.max_width).contains(&rect.width)
            && (self.min_height..=self.max_height).contains(&rect.height)
    }
}

/// Per-frame decision plus the blobs that earned it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Verdict {
    pub motion: bool,
    pub regions: Vec<Rect>,
}

/// Rejects blobs outside the size envelope or the region of interest
#[derive(Debug, Clone)]
pub struct MotionFilter {
    envelope: SizeEnvelope,
    roi: Option<Rect>,
}

impl MotionFilter {
    /// `roi = None` means the whole frame counts
    pub fn new(envelope: SizeEnvelope, roi: Option<Rect>) -> Self {
        Self { envelope, roi }
    }

    pub fn accepts(&self, blob: &Rect) -> bool {
        self.envelope.contains(blob) && self.roi.map_or(true, |roi| roi.intersects(blob))
    }

    pub fn apply(&self, blobs: Vec<Rect>) -> Verdict {
        let regions: Vec<Rect> = blobs.into_iter().filter(|b| self.accepts(b)).collect();
        Verdict {
            motion: !regions.is_empty(),
            regions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope() -> SizeEnvelope {
        SizeEnvelope {
            min_width: 20,
            min_height: 20,
            max_width: 500,
            max_height: 500,
        }
    }

    #[test]
    fn small_blob_is_rejected_large_blob_accepted() {
        let filter = MotionFilter::new(envelope(), None);
        assert!(!filter.accepts(&Rect::new(10, 10, 5, 5)));
        assert!(filter.accepts(&Rect::new(10, 10, 25, 25)));
    }

    #[test]
    fn oversized_blob_is_rejected() {
        let filter = MotionFilter::new(envelope(), None);
        assert!(!filter.accepts(&Rect::new(0, 0, 501, 40)));
        assert!(filter.accepts(&Rect::new(0, 0, 500, 500)));
    }

    #[test]
    fn blob_outside_roi_never_counts() {
        let roi = Rect::new(0, 0, 100, 100);
        let filter = MotionFilter::new(envelope(), Some(roi));

        let outside = Rect::new(200, 200, 50, 50);
        let verdict = filter.apply(vec![outside]);
        assert!(!verdict.motion);
        assert!(verdict.regions.is_empty());

        let straddling = Rect::new(90, 90, 30, 30);
        let verdict = filter.apply(vec![outside, straddling]);
        assert!(verdict.motion);
        assert_eq!(verdict.regions, vec![straddling]);
    }

    #[test]
    fn no_blobs_no_motion() {
        let verdict = MotionFilter::new(envelope(), None).apply(Vec::new());
        assert_eq!(verdict, Verdict::default());
    }
}
