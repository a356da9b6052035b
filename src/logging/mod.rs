mod sink;

pub use sink::{FileSink, LogSink, TracingSink};

use crate::config::LoggingSettings;
use crate::effects::Cooldown;
use crate::status::{Status, StatusReporter};
use chrono::{DateTime, Local};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Severity of an activity-log record, highest last
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Alert,
    Error,
    Critical,
}

impl Severity {
    /// Prefix written in front of the message in the log line
    pub fn prefix(self) -> &'static str {
        match self {
            Severity::Info => "",
            Severity::Warning => "WARNING: ",
            Severity::Alert => "ALERT: ",
            Severity::Error => "ERROR: ",
            Severity::Critical => "CRITICAL ERROR: ",
        }
    }

    /// Anything above informational is always mirrored to the fallback sink
    pub fn is_notable(self) -> bool {
        self != Severity::Info
    }

    /// Split a conventionally prefixed message (`"ERROR: disk full"`) into its
    /// severity and the remaining text
    pub fn from_message(message: &str) -> (Severity, &str) {
        const PREFIXES: [(&str, Severity); 4] = [
            ("CRITICAL ERROR", Severity::Critical),
            ("ERROR", Severity::Error),
            ("WARNING", Severity::Warning),
            ("ALERT", Severity::Alert),
        ];

        for (prefix, severity) in PREFIXES {
            let Some(rest) = message.strip_prefix(prefix) else {
                continue;
            };
            // "ERRORS found" is not an ERROR record
            if rest.is_empty() || rest.starts_with(':') || rest.starts_with(char::is_whitespace) {
                return (severity, rest.trim_start_matches(':').trim_start());
            }
        }
        (Severity::Info, message)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().trim_end_matches([':', ' ']))
    }
}

/// `<YYYY-MM-DD HH:MM:SS.mmm> - <PREFIX: >message`
pub fn format_line(stamp: DateTime<Local>, severity: Severity, message: &str) -> String {
    format!(
        "{} - {}{}",
        stamp.format("%Y-%m-%d %H:%M:%S%.3f"),
        severity.prefix(),
        message
    )
}

/// Activity log with one-way escalation from a primary to a fallback sink.
///
/// Every record is tried against the primary sink until it has failed
/// `escalation_threshold` times in a row; after that the primary is never
/// touched again and everything goes to the fallback. Notable records reach
/// the fallback regardless, as does any record the primary failed to take.
/// Failures of the fallback itself are swallowed.
pub struct ResilientLogger {
    primary: Box<dyn LogSink>,
    fallback: Box<dyn LogSink>,
    escalation_threshold: u32,
    consecutive_failures: u32,
    primary_failed: bool,
    user_notice: Cooldown,
    notifier: Option<Arc<dyn StatusReporter>>,
}

impl ResilientLogger {
    pub fn new(
        primary: Box<dyn LogSink>,
        fallback: Box<dyn LogSink>,
        settings: &LoggingSettings,
    ) -> Self {
        Self {
            primary,
            fallback,
            escalation_threshold: settings.escalation_threshold.max(1),
            consecutive_failures: 0,
            primary_failed: false,
            user_notice: Cooldown::new(settings.notice_cooldown),
            notifier: None,
        }
    }

    /// Log file from the settings, tracing as fallback
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        Self::new(
            Box::new(FileSink::new(&settings.file)),
            Box::new(TracingSink),
            settings,
        )
    }

    /// Where rate-limited "log file unavailable" notices go
    pub fn with_notifier(mut self, notifier: Arc<dyn StatusReporter>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn is_primary_failed(&self) -> bool {
        self.primary_failed
    }

    #[cfg(test)]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Log a message whose severity is carried by its prefix
    pub fn log(&mut self, message: &str) {
        let (severity, body) = Severity::from_message(message);
        self.log_with(severity, body);
    }

    pub fn log_with(&mut self, severity: Severity, message: &str) {
        self.record(severity, message, Instant::now(), Local::now());
    }

    fn record(&mut self, severity: Severity, message: &str, now: Instant, stamp: DateTime<Local>) {
        let line = format_line(stamp, severity, message);

        let mirrored = severity.is_notable() || self.primary_failed;
        if mirrored {
            self.emit_fallback(severity, &line);
        }
        if self.primary_failed {
            return;
        }

        let error = match self.primary.append(severity, &line) {
            Ok(()) => {
                self.consecutive_failures = 0;
                return;
            }
            Err(error) => error,
        };

        self.consecutive_failures += 1;
        if !mirrored {
            self.emit_fallback(severity, &line);
        }

        if self.consecutive_failures >= self.escalation_threshold {
            self.primary_failed = true;
            let notice = format_line(
                stamp,
                Severity::Critical,
                &format!(
                    "Primary log sink failed {} times in a row ({:#}); further records go to the fallback log only",
                    self.consecutive_failures, error
                ),
            );
            self.emit_fallback(Severity::Critical, &notice);
        }

        self.notify_user(now, &error);
    }

    fn emit_fallback(&mut self, severity: Severity, line: &str) {
        let _ = self.fallback.append(severity, line);
    }

    fn notify_user(&mut self, now: Instant, error: &anyhow::Error) {
        let Some(notifier) = self.notifier.as_ref() else {
            return;
        };
        if !self.user_notice.try_fire(now) {
            return;
        }

        let message = if self.primary_failed {
            format!("Log file disabled after repeated failures: {:#}", error)
        } else {
            format!("Log file unavailable: {:#}", error)
        };
        notifier.report(&Status::Error(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::testing::RecordingReporter;
    use anyhow::Result;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct StubSink {
        lines: Arc<Mutex<Vec<(Severity, String)>>>,
        calls: Arc<AtomicUsize>,
        failing: Arc<AtomicBool>,
    }

    impl StubSink {
        fn failing() -> Self {
            let sink = Self::default();
            sink.failing.store(true, Ordering::SeqCst);
            sink
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn lines(&self) -> Vec<(Severity, String)> {
            self.lines.lock().unwrap().clone()
        }
    }

    impl LogSink for StubSink {
        fn append(&mut self, severity: Severity, line: &str) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("disk unplugged");
            }
            self.lines.lock().unwrap().push((severity, line.to_string()));
            Ok(())
        }
    }

    fn logger(primary: &StubSink, fallback: &StubSink) -> ResilientLogger {
        ResilientLogger::new(
            Box::new(primary.clone()),
            Box::new(fallback.clone()),
            &LoggingSettings::default(),
        )
    }

    #[test]
    fn severity_comes_from_prefix() {
        assert_eq!(
            Severity::from_message("CRITICAL ERROR: out of memory"),
            (Severity::Critical, "out of memory")
        );
        assert_eq!(Severity::from_message("ERROR: disk full"), (Severity::Error, "disk full"));
        assert_eq!(Severity::from_message("WARNING slow"), (Severity::Warning, "slow"));
        assert_eq!(Severity::from_message("ALERT: motion"), (Severity::Alert, "motion"));
        assert_eq!(Severity::from_message("Session started"), (Severity::Info, "Session started"));
        assert_eq!(Severity::from_message("ERROR"), (Severity::Error, ""));
    }

    #[test]
    fn prefix_must_be_a_whole_word() {
        assert_eq!(
            Severity::from_message("ERRORS were corrected"),
            (Severity::Info, "ERRORS were corrected")
        );
        assert_eq!(
            Severity::from_message("WARNINGLY quiet"),
            (Severity::Info, "WARNINGLY quiet")
        );
        assert_eq!(
            Severity::from_message("CRITICAL ERRORS: none"),
            (Severity::Info, "CRITICAL ERRORS: none")
        );
        assert_eq!(Severity::from_message("ALERT\tdoor"), (Severity::Alert, "door"));
    }

    #[test]
    fn line_format_keeps_prefix_and_milliseconds() {
        use chrono::TimeZone;
        let stamp = Local.with_ymd_and_hms(2026, 10, 16, 9, 5, 7).unwrap()
            + chrono::Duration::milliseconds(8);
        assert_eq!(
            format_line(stamp, Severity::Error, "disk full"),
            "2026-10-16 09:05:07.008 - ERROR: disk full"
        );
        assert_eq!(
            format_line(stamp, Severity::Info, "ready"),
            "2026-10-16 09:05:07.008 - ready"
        );
    }

    #[test]
    fn healthy_primary_gets_everything_fallback_only_notable() {
        let primary = StubSink::default();
        let fallback = StubSink::default();
        let mut log = logger(&primary, &fallback);

        log.log("Session started");
        log.log("ALERT: Motion detected");
        log.log_with(Severity::Error, "snapshot failed");

        assert_eq!(primary.lines().len(), 3);
        let mirrored: Vec<Severity> = fallback.lines().into_iter().map(|(s, _)| s).collect();
        assert_eq!(mirrored, vec![Severity::Alert, Severity::Error]);
        assert!(primary.lines()[1].1.ends_with(" - ALERT: Motion detected"));
    }

    #[test]
    fn five_failures_escalate_once_and_stop_primary_attempts() {
        let primary = StubSink::failing();
        let fallback = StubSink::default();
        let mut log = logger(&primary, &fallback);

        for i in 0..4 {
            log.log(&format!("record {}", i));
            assert!(!log.is_primary_failed());
        }
        log.log("record 4");
        assert!(log.is_primary_failed());
        assert_eq!(primary.calls(), 5);

        for i in 5..10 {
            log.log(&format!("record {}", i));
        }
        assert_eq!(primary.calls(), 5, "no primary attempts after escalation");

        let lines = fallback.lines();
        let notices = lines
            .iter()
            .filter(|(_, l)| l.contains("Primary log sink failed"))
            .count();
        assert_eq!(notices, 1);
        for i in 0..10 {
            let wanted = format!("record {}", i);
            assert!(lines.iter().any(|(_, l)| l.ends_with(&wanted)), "{} missing", wanted);
        }
    }

    #[test]
    fn success_resets_failure_count() {
        let primary = StubSink::failing();
        let fallback = StubSink::default();
        let mut log = logger(&primary, &fallback);

        for _ in 0..4 {
            log.log("x");
        }
        assert_eq!(log.consecutive_failures(), 4);

        primary.failing.store(false, Ordering::SeqCst);
        log.log("recovered");
        assert_eq!(log.consecutive_failures(), 0);

        primary.failing.store(true, Ordering::SeqCst);
        for _ in 0..4 {
            log.log("y");
        }
        assert!(!log.is_primary_failed());
    }

    #[test]
    fn failing_fallback_is_ignored() {
        let primary = StubSink::failing();
        let fallback = StubSink::failing();
        let mut log = logger(&primary, &fallback);

        for _ in 0..8 {
            log.log("ERROR: everything is broken");
        }
        assert!(log.is_primary_failed());
        assert_eq!(primary.calls(), 5);
    }

    #[test]
    fn user_notice_is_rate_limited() {
        let primary = StubSink::failing();
        let fallback = StubSink::default();
        let reporter = Arc::new(RecordingReporter::default());
        let mut log = logger(&primary, &fallback).with_notifier(reporter.clone());

        let start = Instant::now();
        let stamp = Local::now();
        log.record(Severity::Info, "a", start, stamp);
        log.record(Severity::Info, "b", start + Duration::from_secs(60), stamp);
        log.record(Severity::Info, "c", start + Duration::from_secs(301), stamp);

        let statuses = reporter.statuses();
        assert_eq!(statuses.len(), 2);
        assert!(matches!(&statuses[0], Status::Error(m) if m.contains("disk unplugged")));
    }
}
