use super::Severity;
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only destination for formatted log lines
pub trait LogSink: Send {
    fn append(&mut self, severity: Severity, line: &str) -> Result<()>;
}

/// Appends lines to a text file, creating parent directories as needed.
///
/// The file is reopened for every line so that a transient failure (unmounted
/// volume, permissions fixed later) can recover on the next record.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl LogSink for FileSink {
    fn append(&mut self, _severity: Severity, line: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open log file {}", self.path.display()))?;

        writeln!(file, "{}", line)
            .with_context(|| format!("Failed to append to log file {}", self.path.display()))
    }
}

/// The process-wide tracing channel, used as the always-available fallback
pub struct TracingSink;

impl LogSink for TracingSink {
    fn append(&mut self, severity: Severity, line: &str) -> Result<()> {
        match severity {
            Severity::Critical | Severity::Error => tracing::error!(target: "motion_log", "{}", line),
            Severity::Warning | Severity::Alert => tracing::warn!(target: "motion_log", "{}", line),
            Severity::Info => tracing::info!(target: "motion_log", "{}", line),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sink_creates_parents_and_appends() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("logs").join("motion.log");
        let mut sink = FileSink::new(&path);

        sink.append(Severity::Info, "first").unwrap();
        sink.append(Severity::Error, "second").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn file_sink_fails_when_parent_is_a_file() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let mut sink = FileSink::new(blocker.join("motion.log"));
        assert!(sink.append(Severity::Info, "line").is_err());
    }
}
