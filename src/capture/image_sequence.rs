use super::CaptureSource;
use anyhow::{bail, Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

const EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

/// Replays the images of a directory, in file name order, as frames
pub struct ImageSequence {
    frames: Vec<PathBuf>,
    next: usize,
    resolution: (u32, u32),
}

impl ImageSequence {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read frame directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            })
            .collect();
        frames.sort();

        let Some(first) = frames.first() else {
            bail!("No images found in {}", dir.display());
        };
        let resolution = image::image_dimensions(first)
            .with_context(|| format!("Failed to read {}", first.display()))?;

        tracing::info!(
            "Replaying {} frames from {} ({}x{})",
            frames.len(),
            dir.display(),
            resolution.0,
            resolution.1
        );

        Ok(Self {
            frames,
            next: 0,
            resolution,
        })
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

impl CaptureSource for ImageSequence {
    fn start(&mut self) -> Result<()> {
        self.next = 0;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.next = self.frames.len();
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.frames.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;

        let frame = image::open(path)
            .with_context(|| format!("Failed to load frame {}", path.display()))?
            .to_rgb8();
        Ok(Some(frame))
    }

    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn replays_images_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for (name, value) in [("b.png", 20u8), ("a.png", 10), ("c.png", 30)] {
            RgbImage::from_pixel(6, 4, Rgb([value, value, value]))
                .save(dir.path().join(name))
                .unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let mut source = ImageSequence::new(dir.path()).unwrap();
        assert_eq!(source.len(), 3);
        assert_eq!(source.resolution(), (6, 4));

        source.start().unwrap();
        let values: Vec<u8> = std::iter::from_fn(|| source.capture_frame().unwrap())
            .map(|frame| frame.get_pixel(0, 0)[0])
            .collect();
        assert_eq!(values, vec![10, 20, 30]);
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ImageSequence::new(dir.path()).is_err());
    }
}
