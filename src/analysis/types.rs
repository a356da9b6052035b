use ndarray::{Array2, ShapeError};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Single-channel luminance plane, indexed `[[y, x]]`
pub type GrayPlane = Array2<u8>;

/// Per-pixel absolute luminance difference between two frames
pub type DifferenceMap = Array2<u8>;

/// Binary plane: `true` where the pixel counts as motion
pub type MotionMask = Array2<bool>;

/// Errors raised while analysing a single frame
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("frame has no pixels")]
    EmptyFrame,

    #[error("frame size changed from {expected:?} to {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("could not allocate {bytes} bytes for a pixel plane")]
    ResourceExhausted { bytes: usize },

    #[error("pixel plane shape error: {0}")]
    Shape(#[from] ShapeError),
}

/// Axis-aligned rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge
    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when the two rectangles share at least one pixel
    pub fn intersects(&self, other: &Rect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        (self.x as u64) < other.right()
            && (other.x as u64) < self.right()
            && (self.y as u64) < other.bottom()
            && (other.y as u64) < self.bottom()
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}@({},{})", self.width, self.height, self.x, self.y)
    }
}

/// Parses `x,y,width,height`
impl FromStr for Rect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<u32> = s
            .split(',')
            .map(|part| part.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("invalid rectangle '{}': {}", s, e))?;

        match parts.as_slice() {
            [x, y, width, height] => Ok(Rect::new(*x, *y, *width, *height)),
            _ => Err(format!(
                "invalid rectangle '{}': expected x,y,width,height",
                s
            )),
        }
    }
}

/// Reserve a plane buffer up front so allocation failure surfaces as an error
/// instead of an abort
pub(crate) fn alloc_plane<T>(len: usize) -> Result<Vec<T>, AnalysisError> {
    let mut plane = Vec::new();
    plane
        .try_reserve_exact(len)
        .map_err(|_| AnalysisError::ResourceExhausted {
            bytes: len.saturating_mul(std::mem::size_of::<T>()),
        })?;
    Ok(plane)
}

/// (width, height) of a plane
pub fn plane_size<T>(plane: &Array2<T>) -> (u32, u32) {
    let (rows, cols) = plane.dim();
    (cols as u32, rows as u32)
}
