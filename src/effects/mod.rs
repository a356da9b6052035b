mod alert;
pub mod cooldown;
mod snapshot;
mod speech;

pub use alert::{CommandTone, TerminalBell};
pub use cooldown::Cooldown;
pub use snapshot::{JpegSnapshotStore, QueuedSnapshotStore};
pub use speech::{CommandAnnouncer, NoSpeech};

use crate::config::{EffectSettings, EffectToggle};
use anyhow::Result;
use chrono::{DateTime, Local};
use image::RgbImage;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::time::Instant;

/// Fire-and-forget short tone
pub trait AlertPlayer: Send {
    fn play(&mut self) -> Result<()>;
}

/// Fire-and-forget spoken message
pub trait SpeechAnnouncer: Send {
    /// An unavailable announcer is skipped without error
    fn is_available(&self) -> bool;

    fn announce(&mut self, message: &str) -> Result<()>;
}

/// Where a snapshot went once `save` returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Written to disk
    Saved(PathBuf),
    /// Handed to a background writer; the result arrives via `completed`
    Queued(PathBuf),
}

/// Persists a frame as an image
pub trait SnapshotStore: Send {
    fn save(&mut self, frame: &RgbImage, taken_at: DateTime<Local>) -> Result<SnapshotOutcome>;

    /// Results of background writes finished since the last call. With
    /// `wait` set, blocks until every queued write has finished.
    fn completed(&mut self, _wait: bool) -> Vec<Result<PathBuf>> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Audible,
    Spoken,
    Snapshot,
}

impl Effect {
    pub const ALL: [Effect; 3] = [Effect::Audible, Effect::Spoken, Effect::Snapshot];
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Effect::Audible => "audible alert",
            Effect::Spoken => "spoken alert",
            Effect::Snapshot => "snapshot",
        };
        f.write_str(name)
    }
}

/// The external side-effect implementations
pub struct Collaborators {
    pub alert: Box<dyn AlertPlayer>,
    pub speech: Box<dyn SpeechAnnouncer>,
    pub snapshots: Box<dyn SnapshotStore>,
}

impl Collaborators {
    /// Build the default collaborators described by the settings
    pub fn from_settings(settings: &EffectSettings) -> Result<Self> {
        let alert: Box<dyn AlertPlayer> = match &settings.alert_command {
            Some(command) => Box::new(CommandTone::new(CommandLine::parse(command)?)),
            None => Box::new(TerminalBell),
        };

        let speech: Box<dyn SpeechAnnouncer> = if settings.speech_command.trim().is_empty() {
            Box::new(NoSpeech)
        } else {
            Box::new(CommandAnnouncer::new(CommandLine::parse(
                &settings.speech_command,
            )?))
        };

        let store = JpegSnapshotStore::new(&settings.snapshot_dir);
        let snapshots: Box<dyn SnapshotStore> = if settings.queue_snapshots {
            Box::new(QueuedSnapshotStore::spawn(store, settings.snapshot_queue)?)
        } else {
            Box::new(store)
        };

        Ok(Self {
            alert,
            speech,
            snapshots,
        })
    }
}

/// Per-session cooldown timers, one per effect
#[derive(Debug, Clone)]
pub struct EffectCooldowns {
    audible: Cooldown,
    spoken: Cooldown,
    snapshot: Cooldown,
}

impl EffectCooldowns {
    pub fn new(settings: &EffectSettings) -> Self {
        Self {
            audible: Cooldown::new(settings.audible.cooldown),
            spoken: Cooldown::new(settings.spoken.cooldown),
            snapshot: Cooldown::new(settings.snapshot.cooldown),
        }
    }

    #[cfg(test)]
    pub fn get(&self, effect: Effect) -> &Cooldown {
        match effect {
            Effect::Audible => &self.audible,
            Effect::Spoken => &self.spoken,
            Effect::Snapshot => &self.snapshot,
        }
    }

    fn get_mut(&mut self, effect: Effect) -> &mut Cooldown {
        match effect {
            Effect::Audible => &mut self.audible,
            Effect::Spoken => &mut self.spoken,
            Effect::Snapshot => &mut self.snapshot,
        }
    }
}

#[derive(Debug)]
pub struct Fired {
    pub effect: Effect,
    pub snapshot: Option<SnapshotOutcome>,
}

#[derive(Debug)]
pub struct EffectFailure {
    pub effect: Effect,
    pub error: anyhow::Error,
}

/// What one dispatch round did
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub fired: Vec<Fired>,
    pub failures: Vec<EffectFailure>,
}

impl DispatchReport {
    pub fn fired_effects(&self) -> Vec<Effect> {
        self.fired.iter().map(|f| f.effect).collect()
    }
}

/// Evaluates each effect independently against its toggle and cooldown.
/// A failing collaborator is recorded in the report and never stops the
/// remaining effects from being evaluated.
pub struct EffectDispatcher {
    collaborators: Collaborators,
    audible: EffectToggle,
    spoken: EffectToggle,
    snapshot: EffectToggle,
    speech_message: String,
}

impl EffectDispatcher {
    pub fn new(settings: &EffectSettings, collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            audible: settings.audible,
            spoken: settings.spoken,
            snapshot: settings.snapshot,
            speech_message: settings.speech_message.clone(),
        }
    }

    fn toggle(&self, effect: Effect) -> &EffectToggle {
        match effect {
            Effect::Audible => &self.audible,
            Effect::Spoken => &self.spoken,
            Effect::Snapshot => &self.snapshot,
        }
    }

    pub fn dispatch(
        &mut self,
        cooldowns: &mut EffectCooldowns,
        frame: &RgbImage,
        now: Instant,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        for effect in Effect::ALL {
            if !self.toggle(effect).enabled {
                continue;
            }
            if effect == Effect::Spoken && !self.collaborators.speech.is_available() {
                continue;
            }
            if !cooldowns.get_mut(effect).try_fire(now) {
                continue;
            }

            match self.fire(effect, frame) {
                Ok(snapshot) => report.fired.push(Fired { effect, snapshot }),
                Err(error) => report.failures.push(EffectFailure { effect, error }),
            }
        }

        report
    }

    /// Drain finished background snapshot writes
    pub fn completed_snapshots(&mut self, wait: bool) -> Vec<Result<PathBuf>> {
        self.collaborators.snapshots.completed(wait)
    }

    fn fire(&mut self, effect: Effect, frame: &RgbImage) -> Result<Option<SnapshotOutcome>> {
        match effect {
            Effect::Audible => self.collaborators.alert.play().map(|_| None),
            Effect::Spoken => self
                .collaborators
                .speech
                .announce(&self.speech_message)
                .map(|_| None),
            Effect::Snapshot => self
                .collaborators
                .snapshots
                .save(frame, Local::now())
                .map(Some),
        }
    }
}

/// A configured external program plus fixed leading arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    /// Split on whitespace: `"espeak -s 150"` -> `espeak` with `["-s", "150"]`
    pub fn parse(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("empty command line"))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Start the program without waiting for it. A reaper thread collects the
    /// exit status so finished children do not linger.
    pub fn spawn_detached(&self, extra_arg: Option<&str>) -> io::Result<()> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(arg) = extra_arg {
            command.arg(arg);
        }

        let mut child = command.spawn()?;
        let program = self.program.clone();
        std::thread::spawn(move || {
            if let Some(problem) = exit_problem(&program, child.wait()) {
                tracing::debug!("{}", problem);
            }
        });
        Ok(())
    }
}

/// Describe a helper program run that did not end cleanly
fn exit_problem(program: &str, waited: io::Result<ExitStatus>) -> Option<String> {
    match waited {
        Ok(status) if status.success() => None,
        Ok(status) => Some(format!("'{}' exited with {}", program, status)),
        Err(e) => Some(format!("Failed to wait for '{}': {}", program, e)),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Shared invocation counter handed to stub collaborators
    #[derive(Clone, Default)]
    pub struct Calls(Arc<AtomicUsize>);

    impl Calls {
        pub fn bump(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        pub fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    pub struct StubAlert {
        pub calls: Calls,
        pub fail: bool,
    }

    impl AlertPlayer for StubAlert {
        fn play(&mut self) -> Result<()> {
            self.calls.bump();
            if self.fail {
                anyhow::bail!("no audio device");
            }
            Ok(())
        }
    }

    pub struct StubSpeech {
        pub calls: Calls,
        pub available: bool,
    }

    impl SpeechAnnouncer for StubSpeech {
        fn is_available(&self) -> bool {
            self.available
        }

        fn announce(&mut self, _message: &str) -> Result<()> {
            self.calls.bump();
            Ok(())
        }
    }

    pub struct StubStore {
        pub calls: Calls,
        pub fail: bool,
    }

    impl SnapshotStore for StubStore {
        fn save(&mut self, _frame: &RgbImage, taken_at: DateTime<Local>) -> Result<SnapshotOutcome> {
            self.calls.bump();
            if self.fail {
                anyhow::bail!("disk full");
            }
            Ok(SnapshotOutcome::Saved(PathBuf::from(
                JpegSnapshotStore::file_name(taken_at),
            )))
        }
    }

    /// Counters for (alert, speech, snapshot)
    pub struct StubCounters {
        pub alert: Calls,
        pub speech: Calls,
        pub snapshots: Calls,
    }

    pub fn stub_collaborators(alert_fails: bool, store_fails: bool) -> (Collaborators, StubCounters) {
        let counters = StubCounters {
            alert: Calls::default(),
            speech: Calls::default(),
            snapshots: Calls::default(),
        };
        let collaborators = Collaborators {
            alert: Box::new(StubAlert {
                calls: counters.alert.clone(),
                fail: alert_fails,
            }),
            speech: Box::new(StubSpeech {
                calls: counters.speech.clone(),
                available: true,
            }),
            snapshots: Box::new(StubStore {
                calls: counters.snapshots.clone(),
                fail: store_fails,
            }),
        };
        (collaborators, counters)
    }
}
