mod analysis;
mod capture;
mod config;
mod effects;
mod logging;
mod motion;
mod pipeline;
mod session;
mod status;

use analysis::Rect;
use anyhow::{Context, Result};
use capture::{CaptureSource, ImageSequence, WebcamCapture};
use clap::Parser;
use config::DetectorConfig;
use effects::Collaborators;
use logging::ResilientLogger;
use pipeline::{MotionPipeline, SessionError};
use status::{Status, StatusReporter, TracingStatusReporter};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input webcam device index
    #[arg(short, long, default_value_t = 0)]
    device: u32,

    /// Capture resolution width
    #[arg(long, default_value_t = 640)]
    capture_width: u32,

    /// Capture resolution height
    #[arg(long, default_value_t = 480)]
    capture_height: u32,

    /// Target frames per second (0 = as fast as frames arrive)
    #[arg(long, default_value_t = 15)]
    fps: u32,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Replay the images in this directory instead of opening the webcam
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Per-pixel luminance difference threshold (0-255)
    #[arg(long)]
    threshold: Option<u8>,

    /// Region of interest as x,y,width,height
    #[arg(long)]
    roi: Option<Rect>,

    /// Directory for motion snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Activity log file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Disable the audible alert
    #[arg(long)]
    no_beep: bool,

    /// Disable the spoken announcement
    #[arg(long)]
    no_speech: bool,

    /// Disable snapshots
    #[arg(long)]
    no_snapshots: bool,
}

impl Args {
    fn apply(&self, cfg: &mut DetectorConfig) {
        if let Some(threshold) = self.threshold {
            cfg.detection.threshold = threshold;
        }
        if let Some(roi) = self.roi {
            cfg.detection.roi = Some(roi);
        }
        if let Some(dir) = &self.snapshot_dir {
            cfg.effects.snapshot_dir = dir.clone();
        }
        if let Some(file) = &self.log_file {
            cfg.logging.file = file.clone();
        }
        if self.no_beep {
            cfg.effects.audible.enabled = false;
        }
        if self.no_speech {
            cfg.effects.spoken.enabled = false;
        }
        if self.no_snapshots {
            cfg.effects.snapshot.enabled = false;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let status = Arc::new(TracingStatusReporter);
    status.report(&Status::Loading);

    let mut cfg = DetectorConfig::load(args.config.as_deref())?;
    args.apply(&mut cfg);
    cfg.validate().context("Invalid settings")?;

    tracing::info!("Motionwatch starting");
    tracing::info!(
        "Threshold: {}, region size {}x{}..{}x{}, grace {}ms",
        cfg.detection.threshold,
        cfg.detection.envelope.min_width,
        cfg.detection.envelope.min_height,
        cfg.detection.envelope.max_width,
        cfg.detection.envelope.max_height,
        cfg.detection.grace.as_millis()
    );
    match cfg.detection.roi {
        Some(roi) => tracing::info!("Region of interest: {}", roi),
        None => tracing::info!("Region of interest: whole frame"),
    }
    tracing::info!("Activity log: {}", cfg.logging.file.display());

    let collaborators =
        Collaborators::from_settings(&cfg.effects).context("Failed to set up alert effects")?;
    let mut logger = ResilientLogger::from_settings(&cfg.logging).with_notifier(status.clone());
    logger.log(&format!(
        "Motionwatch {} starting, threshold {}",
        env!("CARGO_PKG_VERSION"),
        cfg.detection.threshold
    ));
    let mut pipeline = MotionPipeline::new(cfg, collaborators, logger, status.clone());

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")?;

    let result = match &args.frames_dir {
        Some(dir) => {
            let mut capture = ImageSequence::new(dir).context("Failed to open frame directory")?;
            run(&mut capture, &mut pipeline, &stop, args.fps)
        }
        None => {
            let mut capture =
                WebcamCapture::new(args.device, args.capture_width, args.capture_height)
                    .context("Failed to initialize webcam capture")?;
            run(&mut capture, &mut pipeline, &stop, args.fps)
        }
    };

    // An aborted session has already logged and reported its error
    if let Err(e) = &result {
        if e.downcast_ref::<SessionError>().is_none() {
            pipeline.logger_mut().log(&format!("ERROR: {:#}", e));
            status.report(&Status::Error(format!("{:#}", e)));
        }
    }

    if pipeline.logger().is_primary_failed() {
        tracing::warn!("Activity log file was disabled during the session");
    }

    result
}

fn run<C: CaptureSource>(
    capture: &mut C,
    pipeline: &mut MotionPipeline,
    stop: &AtomicBool,
    fps: u32,
) -> Result<()> {
    let (width, height) = capture.resolution();
    tracing::info!("Capture: {}x{}", width, height);
    tracing::info!("Target FPS: {}", fps);

    session::run_session(capture, pipeline, stop, fps)?;
    Ok(())
}
