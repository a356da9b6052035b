use super::CaptureSource;
use anyhow::{Context, Result};
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

pub struct WebcamCapture {
    camera: Camera,
    streaming: bool,
}

impl WebcamCapture {
    pub fn new(device_index: u32, width: u32, height: u32) -> Result<Self> {
        tracing::info!(
            "Initializing webcam {} near {}x{}",
            device_index,
            width,
            height
        );

        let index = CameraIndex::Index(device_index);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::HighestResolution(
            nokhwa::utils::Resolution::new(width, height),
        ));

        let camera = Camera::new(index, requested).context("Failed to open camera")?;

        tracing::info!(
            "Webcam {} opened at {}",
            camera.info().human_name(),
            camera.resolution()
        );

        Ok(Self {
            camera,
            streaming: false,
        })
    }
}

impl CaptureSource for WebcamCapture {
    fn start(&mut self) -> Result<()> {
        if !self.streaming {
            self.camera
                .open_stream()
                .context("Failed to open camera stream")?;
            self.streaming = true;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if self.streaming {
            self.streaming = false;
            self.camera
                .stop_stream()
                .context("Failed to stop camera stream")?;
        }
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<Option<RgbImage>> {
        let frame = self.camera.frame().context("Failed to capture frame")?;

        let decoded = frame
            .decode_image::<RgbFormat>()
            .context("Failed to decode frame")?;

        Ok(Some(decoded))
    }

    fn resolution(&self) -> (u32, u32) {
        let resolution = self.camera.resolution();
        (resolution.width(), resolution.height())
    }
}
