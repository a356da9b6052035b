use crate::analysis::{Connectivity, Rect, SizeEnvelope};
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_THRESHOLD: u8 = 15;
const DEFAULT_GRACE_MS: u64 = 1_000;
// 8K UHD
const DEFAULT_MAX_FRAME_PIXELS: usize = 7680 * 4320;
const DEFAULT_AUDIBLE_COOLDOWN_MS: u64 = 5_000;
const DEFAULT_SPOKEN_COOLDOWN_MS: u64 = 4_000;
const DEFAULT_SNAPSHOT_COOLDOWN_MS: u64 = 3_000;
const DEFAULT_SNAPSHOT_DIR: &str = "snapshots";
const DEFAULT_SNAPSHOT_QUEUE: usize = 4;
const DEFAULT_SPEECH_COMMAND: &str = "espeak";
const DEFAULT_SPEECH_MESSAGE: &str = "Motion detected";
const DEFAULT_LOG_FILE: &str = "logs/motion.log";
const DEFAULT_ESCALATION_THRESHOLD: u32 = 5;
const DEFAULT_NOTICE_COOLDOWN_SECS: u64 = 5 * 60;

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    detection: Option<DetectionFile>,
    effects: Option<EffectsFile>,
    logging: Option<LoggingFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionFile {
    threshold: Option<u8>,
    min_width: Option<u32>,
    min_height: Option<u32>,
    max_width: Option<u32>,
    max_height: Option<u32>,
    roi: Option<RoiFile>,
    grace_ms: Option<u64>,
    connectivity: Option<u8>,
    max_frame_pixels: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RoiFile {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize, Default)]
struct EffectsFile {
    audible: Option<ToggleFile>,
    spoken: Option<ToggleFile>,
    snapshot: Option<ToggleFile>,
    snapshot_dir: Option<PathBuf>,
    queue_snapshots: Option<bool>,
    snapshot_queue: Option<usize>,
    speech_command: Option<String>,
    speech_message: Option<String>,
    alert_command: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ToggleFile {
    enabled: Option<bool>,
    cooldown_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct LoggingFile {
    file: Option<PathBuf>,
    escalation_threshold: Option<u32>,
    notice_cooldown_secs: Option<u64>,
}

/// Frame analysis and motion-state parameters
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSettings {
    pub threshold: u8,
    pub envelope: SizeEnvelope,
    /// `None` = whole frame
    pub roi: Option<Rect>,
    pub grace: Duration,
    pub connectivity: Connectivity,
    /// Larger frames are refused as resource exhaustion
    pub max_frame_pixels: usize,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            envelope: SizeEnvelope::default(),
            roi: None,
            grace: Duration::from_millis(DEFAULT_GRACE_MS),
            connectivity: Connectivity::default(),
            max_frame_pixels: DEFAULT_MAX_FRAME_PIXELS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectToggle {
    pub enabled: bool,
    pub cooldown: Duration,
}

impl EffectToggle {
    fn enabled_every(millis: u64) -> Self {
        Self {
            enabled: true,
            cooldown: Duration::from_millis(millis),
        }
    }

    fn merge(self, file: Option<ToggleFile>) -> Self {
        let Some(file) = file else {
            return self;
        };
        Self {
            enabled: file.enabled.unwrap_or(self.enabled),
            cooldown: file
                .cooldown_ms
                .map(Duration::from_millis)
                .unwrap_or(self.cooldown),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectSettings {
    pub audible: EffectToggle,
    pub spoken: EffectToggle,
    pub snapshot: EffectToggle,
    pub snapshot_dir: PathBuf,
    /// Write snapshots from a background thread
    pub queue_snapshots: bool,
    pub snapshot_queue: usize,
    /// Empty disables speech
    pub speech_command: String,
    pub speech_message: String,
    /// `None` rings the terminal bell
    pub alert_command: Option<String>,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            audible: EffectToggle::enabled_every(DEFAULT_AUDIBLE_COOLDOWN_MS),
            spoken: EffectToggle::enabled_every(DEFAULT_SPOKEN_COOLDOWN_MS),
            snapshot: EffectToggle::enabled_every(DEFAULT_SNAPSHOT_COOLDOWN_MS),
            snapshot_dir: PathBuf::from(DEFAULT_SNAPSHOT_DIR),
            queue_snapshots: true,
            snapshot_queue: DEFAULT_SNAPSHOT_QUEUE,
            speech_command: DEFAULT_SPEECH_COMMAND.to_string(),
            speech_message: DEFAULT_SPEECH_MESSAGE.to_string(),
            alert_command: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub file: PathBuf,
    /// Consecutive primary failures before giving up on it
    pub escalation_threshold: u32,
    /// Minimum spacing of user-facing logging failure notices
    pub notice_cooldown: Duration,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file: PathBuf::from(DEFAULT_LOG_FILE),
            escalation_threshold: DEFAULT_ESCALATION_THRESHOLD,
            notice_cooldown: Duration::from_secs(DEFAULT_NOTICE_COOLDOWN_SECS),
        }
    }
}

/// Fully resolved detector configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectorConfig {
    pub detection: DetectionSettings,
    pub effects: EffectSettings,
    pub logging: LoggingSettings,
}

impl DetectorConfig {
    /// Defaults, overlaid with the TOML file at `path` if one is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => read_config_file(path)?,
            None => ConfigFile::default(),
        };
        let cfg = Self::from_file(file)?;
        cfg.validate()?;
        Ok(cfg)
    }

    #[cfg(test)]
    fn from_toml(text: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text).context("Invalid configuration")?;
        Self::from_file(file)
    }

    fn from_file(file: ConfigFile) -> Result<Self> {
        let defaults = Self::default();

        let detection_file = file.detection.unwrap_or_default();
        let envelope = SizeEnvelope {
            min_width: detection_file
                .min_width
                .unwrap_or(defaults.detection.envelope.min_width),
            min_height: detection_file
                .min_height
                .unwrap_or(defaults.detection.envelope.min_height),
            max_width: detection_file
                .max_width
                .unwrap_or(defaults.detection.envelope.max_width),
            max_height: detection_file
                .max_height
                .unwrap_or(defaults.detection.envelope.max_height),
        };
        let connectivity = match detection_file.connectivity {
            Some(value) => Connectivity::try_from(value).map_err(|e| anyhow!(e))?,
            None => defaults.detection.connectivity,
        };
        let detection = DetectionSettings {
            threshold: detection_file
                .threshold
                .unwrap_or(defaults.detection.threshold),
            envelope,
            roi: detection_file
                .roi
                .map(|roi| Rect::new(roi.x, roi.y, roi.width, roi.height)),
            grace: detection_file
                .grace_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.detection.grace),
            connectivity,
            max_frame_pixels: detection_file
                .max_frame_pixels
                .unwrap_or(defaults.detection.max_frame_pixels),
        };

        let effects_file = file.effects.unwrap_or_default();
        let effects = EffectSettings {
            audible: defaults.effects.audible.merge(effects_file.audible),
            spoken: defaults.effects.spoken.merge(effects_file.spoken),
            snapshot: defaults.effects.snapshot.merge(effects_file.snapshot),
            snapshot_dir: effects_file
                .snapshot_dir
                .unwrap_or(defaults.effects.snapshot_dir),
            queue_snapshots: effects_file
                .queue_snapshots
                .unwrap_or(defaults.effects.queue_snapshots),
            snapshot_queue: effects_file
                .snapshot_queue
                .unwrap_or(defaults.effects.snapshot_queue),
            speech_command: effects_file
                .speech_command
                .unwrap_or(defaults.effects.speech_command),
            speech_message: effects_file
                .speech_message
                .unwrap_or(defaults.effects.speech_message),
            alert_command: effects_file.alert_command.or(defaults.effects.alert_command),
        };

        let logging_file = file.logging.unwrap_or_default();
        let logging = LoggingSettings {
            file: logging_file.file.unwrap_or(defaults.logging.file),
            escalation_threshold: logging_file
                .escalation_threshold
                .unwrap_or(defaults.logging.escalation_threshold),
            notice_cooldown: logging_file
                .notice_cooldown_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.logging.notice_cooldown),
        };

        Ok(Self {
            detection,
            effects,
            logging,
        })
    }

    pub fn validate(&self) -> Result<()> {
        let envelope = &self.detection.envelope;
        if envelope.min_width > envelope.max_width {
            bail!(
                "min_width {} exceeds max_width {}",
                envelope.min_width,
                envelope.max_width
            );
        }
        if envelope.min_height > envelope.max_height {
            bail!(
                "min_height {} exceeds max_height {}",
                envelope.min_height,
                envelope.max_height
            );
        }
        if let Some(roi) = self.detection.roi {
            if roi.is_empty() {
                bail!("region of interest {} has zero area", roi);
            }
        }
        if self.detection.threshold == u8::MAX {
            bail!("threshold 255 can never be exceeded");
        }
        if self.detection.max_frame_pixels == 0 {
            bail!("max_frame_pixels must be at least 1");
        }
        if self.logging.escalation_threshold == 0 {
            bail!("logging escalation_threshold must be at least 1");
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Invalid config file {}", path.display()))
}
