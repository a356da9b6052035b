use super::types::{alloc_plane, AnalysisError, MotionMask, Rect};
use ndarray::Array2;

/// Which neighbours count as connected when growing a blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    /// Edge neighbours only
    Four,
    /// Edge and diagonal neighbours
    #[default]
    Eight,
}

impl Connectivity {
    fn offsets(self) -> &'static [(isize, isize)] {
        const FOUR: [(isize, isize); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];
        const EIGHT: [(isize, isize); 8] = [
            (0, 1),
            (0, -1),
            (1, 0),
            (-1, 0),
            (1, 1),
            (1, -1),
            (-1, 1),
            (-1, -1),
        ];
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }
}

impl TryFrom<u8> for Connectivity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(Connectivity::Four),
            8 => Ok(Connectivity::Eight),
            other => Err(format!("connectivity must be 4 or 8, got {}", other)),
        }
    }
}

/// Find every maximal connected region of motion pixels and return its
/// bounding rectangle.
///
/// Blobs are reported in row-major order of their first (top-left-most) pixel,
/// so identical masks always give identical output.
pub fn extract_blobs(
    mask: &MotionMask,
    connectivity: Connectivity,
) -> Result<Vec<Rect>, AnalysisError> {
    let (rows, cols) = mask.dim();
    let mut visited_plane = alloc_plane::<bool>(rows * cols)?;
    visited_plane.resize(rows * cols, false);
    let mut visited = Array2::from_shape_vec((rows, cols), visited_plane)?;

    let mut blobs = Vec::new();
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for y in 0..rows {
        for x in 0..cols {
            if !mask[[y, x]] || visited[[y, x]] {
                continue;
            }

            visited[[y, x]] = true;
            stack.push((y, x));

            let (mut min_x, mut min_y, mut max_x, mut max_y) = (x, y, x, y);

            while let Some((cy, cx)) = stack.pop() {
                min_x = min_x.min(cx);
                min_y = min_y.min(cy);
                max_x = max_x.max(cx);
                max_y = max_y.max(cy);

                for (dy, dx) in connectivity.offsets() {
                    let (Some(ny), Some(nx)) =
                        (cy.checked_add_signed(*dy), cx.checked_add_signed(*dx))
                    else {
                        continue;
                    };
                    if ny >= rows || nx >= cols {
                        continue;
                    }
                    if mask[[ny, nx]] && !visited[[ny, nx]] {
                        visited[[ny, nx]] = true;
                        stack.push((ny, nx));
                    }
                }
            }

            blobs.push(Rect::new(
                min_x as u32,
                min_y as u32,
                (max_x - min_x + 1) as u32,
                (max_y - min_y + 1) as u32,
            ));
        }
    }

    Ok(blobs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: &[&str]) -> MotionMask {
        let height = rows.len();
        let width = rows[0].len();
        Array2::from_shape_fn((height, width), |(y, x)| rows[y].as_bytes()[x] == b'#')
    }

    #[test]
    fn empty_mask_has_no_blobs() {
        let mask = Array2::from_elem((5, 5), false);
        assert!(extract_blobs(&mask, Connectivity::Eight).unwrap().is_empty());
    }

    #[test]
    fn separate_regions_get_separate_rects() {
        let mask = mask_from(&[
            "##....", //
            "##....",
            "......",
            "...###",
            "....#.",
        ]);
        let blobs = extract_blobs(&mask, Connectivity::Four).unwrap();
        assert_eq!(blobs, vec![Rect::new(0, 0, 2, 2), Rect::new(3, 3, 3, 2)]);
    }

    #[test]
    fn diagonal_touch_depends_on_connectivity() {
        let mask = mask_from(&[
            "#..", //
            ".#.",
            "..#",
        ]);
        assert_eq!(extract_blobs(&mask, Connectivity::Four).unwrap().len(), 3);
        assert_eq!(
            extract_blobs(&mask, Connectivity::Eight).unwrap(),
            vec![Rect::new(0, 0, 3, 3)]
        );
    }

    #[test]
    fn concave_shape_is_one_blob() {
        let mask = mask_from(&[
            "#...#", //
            "#...#",
            "#####",
        ]);
        assert_eq!(
            extract_blobs(&mask, Connectivity::Four).unwrap(),
            vec![Rect::new(0, 0, 5, 3)]
        );
    }

    #[test]
    fn extraction_is_deterministic() {
        let mask = mask_from(&[
            "#.#.#.", //
            "......",
            "##..##",
        ]);
        let first = extract_blobs(&mask, Connectivity::Eight).unwrap();
        let second = extract_blobs(&mask, Connectivity::Eight).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn connectivity_parses_from_number() {
        assert_eq!(Connectivity::try_from(4).unwrap(), Connectivity::Four);
        assert_eq!(Connectivity::try_from(8).unwrap(), Connectivity::Eight);
        assert!(Connectivity::try_from(6).is_err());
    }
}
