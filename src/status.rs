use std::fmt;

/// One-line, human-readable detector status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Loading,
    Ready,
    MotionDetected { regions: usize },
    MotionActive,
    Idle,
    Stopped,
    Error(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Loading => write!(f, "Loading..."),
            Status::Ready => write!(f, "Ready - watching for motion"),
            Status::MotionDetected { regions } => {
                write!(f, "Motion detected ({} region(s))", regions)
            }
            Status::MotionActive => write!(f, "Motion active"),
            Status::Idle => write!(f, "Idle - no motion"),
            Status::Stopped => write!(f, "Stopped"),
            Status::Error(message) => write!(f, "Error: {}", message),
        }
    }
}

/// Receives status lines for whatever presentation layer exists
pub trait StatusReporter: Send + Sync {
    fn report(&self, status: &Status);
}

/// Console reporter: status lines go out through tracing
pub struct TracingStatusReporter;

impl StatusReporter for TracingStatusReporter {
    fn report(&self, status: &Status) {
        match status {
            Status::Error(_) => tracing::error!(target: "status", "{}", status),
            _ => tracing::info!(target: "status", "{}", status),
        }
    }
}

/// Forwards a status only when it differs from the last one sent
pub fn report_if_changed(reporter: &dyn StatusReporter, last: &mut Option<Status>, status: Status) {
    if last.as_ref() == Some(&status) {
        return;
    }
    reporter.report(&status);
    *last = Some(status);
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingReporter;
    use super::*;

    #[test]
    fn repeated_status_is_reported_once() {
        let reporter = RecordingReporter::default();
        let mut last = None;

        report_if_changed(&reporter, &mut last, Status::Idle);
        report_if_changed(&reporter, &mut last, Status::Idle);
        report_if_changed(&reporter, &mut last, Status::MotionActive);
        report_if_changed(&reporter, &mut last, Status::Idle);

        assert_eq!(
            reporter.statuses(),
            vec![Status::Idle, Status::MotionActive, Status::Idle]
        );
    }

    #[test]
    fn status_lines_are_readable() {
        assert_eq!(
            Status::MotionDetected { regions: 2 }.to_string(),
            "Motion detected (2 region(s))"
        );
        assert_eq!(Status::Error("disk full".into()).to_string(), "Error: disk full");
    }
}
