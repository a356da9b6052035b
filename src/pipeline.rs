use crate::analysis::{Analysis, AnalysisError, FrameAnalyzer, Rect};
use crate::config::DetectorConfig;
use crate::effects::{
    Collaborators, DispatchReport, Effect, EffectCooldowns, EffectDispatcher, SnapshotOutcome,
};
use crate::logging::{ResilientLogger, Severity};
use crate::motion::{MotionEvent, MotionState, MotionStateMachine};
use crate::status::{report_if_changed, Status, StatusReporter};
use image::RgbImage;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// A failure that ends the capture session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session aborted: {0}")]
    Aborted(#[source] AnalysisError),
}

/// What the pipeline did with one frame
#[derive(Debug, PartialEq)]
pub enum FrameOutcome {
    /// No session is running; the frame was ignored
    NoSession,
    /// First frame of the session, stored as the reference
    Seeded,
    /// Analysis failed for this frame; no verdict, no state change
    Skipped,
    Analyzed {
        event: MotionEvent,
        regions: Vec<Rect>,
        fired: Vec<Effect>,
    },
}

/// Everything that lives for exactly one capture session
struct SessionState {
    analyzer: FrameAnalyzer,
    motion: MotionStateMachine,
    cooldowns: EffectCooldowns,
    last_status: Option<Status>,
}

impl SessionState {
    fn new(config: &DetectorConfig) -> Self {
        Self {
            analyzer: FrameAnalyzer::new(&config.detection),
            motion: MotionStateMachine::new(config.detection.grace),
            cooldowns: EffectCooldowns::new(&config.effects),
            last_status: None,
        }
    }
}

/// The motion detector core: analyse -> update motion state -> dispatch
/// effects, with every step reported to the activity log.
///
/// Calls must be serialised: one frame at a time, in arrival order.
pub struct MotionPipeline {
    config: DetectorConfig,
    effects: EffectDispatcher,
    logger: ResilientLogger,
    status: Arc<dyn StatusReporter>,
    session: Option<SessionState>,
}

impl MotionPipeline {
    pub fn new(
        config: DetectorConfig,
        collaborators: Collaborators,
        logger: ResilientLogger,
        status: Arc<dyn StatusReporter>,
    ) -> Self {
        let effects = EffectDispatcher::new(&config.effects, collaborators);
        Self {
            config,
            effects,
            logger,
            status,
            session: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    pub fn motion_state(&self) -> Option<MotionState> {
        self.session.as_ref().map(|s| s.motion.state())
    }

    #[cfg(test)]
    pub fn cooldowns(&self) -> Option<&EffectCooldowns> {
        self.session.as_ref().map(|s| &s.cooldowns)
    }

    #[cfg(test)]
    pub fn has_reference(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.analyzer.has_reference())
    }

    pub fn logger(&self) -> &ResilientLogger {
        &self.logger
    }

    pub fn logger_mut(&mut self) -> &mut ResilientLogger {
        &mut self.logger
    }

    /// Begin a session with fresh state. A running session is discarded.
    pub fn start_session(&mut self) {
        if self.session.is_some() {
            self.logger
                .log_with(Severity::Warning, "Session restarted while running");
        }

        let mut session = SessionState::new(&self.config);
        report_if_changed(self.status.as_ref(), &mut session.last_status, Status::Ready);
        self.session = Some(session);

        self.logger.log_with(Severity::Info, "Detection session started");
    }

    /// End the session, dropping the reference frame, motion state and
    /// cooldowns. Waits for queued snapshot writes so their results are
    /// logged.
    pub fn stop_session(&mut self) {
        self.end_session(Status::Stopped);
    }

    fn end_session(&mut self, status: Status) {
        if self.session.take().is_some() {
            self.log_snapshot_writes(true);
            self.status.report(&status);
            self.logger.log_with(Severity::Info, "Detection session stopped");
        }
    }

    pub fn process_frame(
        &mut self,
        frame: &RgbImage,
        now: Instant,
    ) -> Result<FrameOutcome, SessionError> {
        self.log_snapshot_writes(false);

        let Some(session) = self.session.as_mut() else {
            return Ok(FrameOutcome::NoSession);
        };

        let verdict = match session.analyzer.analyze(frame) {
            Ok(Analysis::Seeded) => return Ok(FrameOutcome::Seeded),
            Ok(Analysis::Verdict(verdict)) => verdict,
            Err(AnalysisError::ResourceExhausted { bytes }) => {
                return Err(self.abort(AnalysisError::ResourceExhausted { bytes }));
            }
            Err(e) => {
                self.logger
                    .log_with(Severity::Error, &format!("Frame analysis failed: {}", e));
                return Ok(FrameOutcome::Skipped);
            }
        };

        let event = session.motion.update(verdict.motion, now);

        let report = if event.triggers_effects() {
            self.effects.dispatch(&mut session.cooldowns, frame, now)
        } else {
            DispatchReport::default()
        };

        let status = match event {
            MotionEvent::Started => Some(Status::MotionDetected {
                regions: verdict.regions.len(),
            }),
            MotionEvent::Sustained => Some(Status::MotionActive),
            MotionEvent::Ended { .. } => Some(Status::Idle),
            MotionEvent::Unchanged => match session.motion.state() {
                MotionState::Inactive => Some(Status::Idle),
                MotionState::Active => None,
            },
        };
        if let Some(status) = status {
            report_if_changed(self.status.as_ref(), &mut session.last_status, status);
        }

        self.log_event(event, &verdict.regions);
        self.log_dispatch(&report);

        Ok(FrameOutcome::Analyzed {
            event,
            regions: verdict.regions,
            fired: report.fired_effects(),
        })
    }

    /// The one user notice for a fatal error is the status reported here
    fn abort(&mut self, error: AnalysisError) -> SessionError {
        self.logger.log_with(
            Severity::Critical,
            &format!("Stopping session, frame analysis ran out of memory: {}", error),
        );
        self.end_session(Status::Error(format!("Detection stopped: {}", error)));
        SessionError::Aborted(error)
    }

    fn log_event(&mut self, event: MotionEvent, regions: &[Rect]) {
        match event {
            MotionEvent::Started => {
                let listed: Vec<String> = regions.iter().map(Rect::to_string).collect();
                self.logger.log_with(
                    Severity::Alert,
                    &format!("Motion detected in {} region(s): {}", regions.len(), listed.join(", ")),
                );
            }
            MotionEvent::Sustained => {
                tracing::debug!("Motion sustained ({} region(s))", regions.len());
            }
            MotionEvent::Ended { duration } => {
                self.logger.log_with(
                    Severity::Info,
                    &format!("Motion ended after {:.1}s", duration.as_secs_f64()),
                );
            }
            MotionEvent::Unchanged => {}
        }
    }

    fn log_snapshot_writes(&mut self, wait: bool) {
        for result in self.effects.completed_snapshots(wait) {
            match result {
                Ok(path) => self
                    .logger
                    .log_with(Severity::Info, &format!("Snapshot saved: {}", path.display())),
                Err(e) => self.logger.log_with(
                    Severity::Error,
                    &format!("{} failed: {:#}", Effect::Snapshot, e),
                ),
            }
        }
    }

    fn log_dispatch(&mut self, report: &DispatchReport) {
        for fired in &report.fired {
            match &fired.snapshot {
                Some(SnapshotOutcome::Saved(path)) => self
                    .logger
                    .log_with(Severity::Info, &format!("Snapshot saved: {}", path.display())),
                Some(SnapshotOutcome::Queued(path)) => self
                    .logger
                    .log_with(Severity::Info, &format!("Snapshot queued: {}", path.display())),
                None => tracing::debug!("Fired {}", fired.effect),
            }
        }
        for failure in &report.failures {
            self.logger.log_with(
                Severity::Error,
                &format!("{} failed: {:#}", failure.effect, failure.error),
            );
        }
    }
}
