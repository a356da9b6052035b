use crate::capture::CaptureSource;
use crate::motion::{MotionEvent, MotionState};
use crate::pipeline::{FrameOutcome, MotionPipeline};
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSummary {
    pub frames: u64,
    pub skipped: u64,
    pub motion_events: u64,
    pub elapsed: Duration,
}

/// Pull frames from `capture` and push them through `pipeline` one at a time
/// until the source runs dry, `stop` is raised, or the session fails.
///
/// The pipeline session and the capture stream are stopped on every exit
/// path. `target_fps = 0` disables frame pacing.
pub fn run_session<C>(
    capture: &mut C,
    pipeline: &mut MotionPipeline,
    stop: &AtomicBool,
    target_fps: u32,
) -> Result<SessionSummary>
where
    C: CaptureSource,
{
    capture.start().context("Failed to start capture")?;
    pipeline.start_session();

    let started = Instant::now();
    let mut summary = SessionSummary::default();
    let result = drive(capture, pipeline, stop, target_fps, &mut summary);

    if pipeline.motion_state() == Some(MotionState::Active) {
        tracing::info!("Stopping while motion is still active");
    }
    pipeline.stop_session();
    if let Err(e) = capture.stop() {
        tracing::warn!("{:#}", e);
    }
    summary.elapsed = started.elapsed();

    tracing::info!(
        "Session ended: {} frames ({} skipped), {} motion events in {:.1}s",
        summary.frames,
        summary.skipped,
        summary.motion_events,
        summary.elapsed.as_secs_f64()
    );

    result.map(|_| summary)
}

fn drive<C>(
    capture: &mut C,
    pipeline: &mut MotionPipeline,
    stop: &AtomicBool,
    target_fps: u32,
    summary: &mut SessionSummary,
) -> Result<()>
where
    C: CaptureSource,
{
    let frame_duration = (target_fps > 0).then(|| Duration::from_secs_f32(1.0 / target_fps as f32));
    let mut total_capture_time = Duration::ZERO;
    let mut total_analysis_time = Duration::ZERO;

    tracing::info!("Press Ctrl+C to stop");

    while !stop.load(Ordering::SeqCst) && pipeline.is_running() {
        let loop_start = Instant::now();

        // Capture frame
        let Some(frame) = capture.capture_frame().context("Failed to capture frame")? else {
            tracing::info!("Frame source exhausted");
            break;
        };
        total_capture_time += loop_start.elapsed();

        // Analyse, update motion state, fire effects
        let analysis_start = Instant::now();
        match pipeline.process_frame(&frame, analysis_start)? {
            FrameOutcome::Analyzed {
                event: MotionEvent::Started,
                ..
            } => summary.motion_events += 1,
            FrameOutcome::Skipped => summary.skipped += 1,
            _ => {}
        }
        total_analysis_time += analysis_start.elapsed();

        summary.frames += 1;

        // Log stats every 30 frames
        if summary.frames % 30 == 0 {
            let avg_capture_ms = total_capture_time.as_secs_f64() * 1000.0 / summary.frames as f64;
            let avg_analysis_ms = total_analysis_time.as_secs_f64() * 1000.0 / summary.frames as f64;
            tracing::info!(
                "Frame {}: capture={:.1}ms, analysis={:.1}ms, motion events={}",
                summary.frames,
                avg_capture_ms,
                avg_analysis_ms,
                summary.motion_events
            );
        }

        // Frame rate limiting
        if let Some(frame_duration) = frame_duration {
            let elapsed = loop_start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            }
        }
    }

    Ok(())
}
