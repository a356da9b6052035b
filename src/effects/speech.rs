use super::{CommandLine, SpeechAnnouncer};
use anyhow::{Context, Result};
use std::io::ErrorKind;

/// Speaks through an external TTS program (`espeak`, `spd-say`, ...), passing
/// the message as the last argument.
///
/// If the program turns out not to be installed the announcer switches itself
/// off for the rest of the process; missing speech is not an error.
pub struct CommandAnnouncer {
    command: CommandLine,
    available: bool,
}

impl CommandAnnouncer {
    pub fn new(command: CommandLine) -> Self {
        Self {
            command,
            available: true,
        }
    }
}

impl SpeechAnnouncer for CommandAnnouncer {
    fn is_available(&self) -> bool {
        self.available
    }

    fn announce(&mut self, message: &str) -> Result<()> {
        match self.command.spawn_detached(Some(message)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(
                    "Speech program '{}' not found, spoken alerts disabled",
                    self.command.program()
                );
                self.available = false;
                Ok(())
            }
            Err(e) => Err(e).with_context(|| {
                format!("Failed to start speech command '{}'", self.command.program())
            }),
        }
    }
}

/// Speech that is never available
pub struct NoSpeech;

impl SpeechAnnouncer for NoSpeech {
    fn is_available(&self) -> bool {
        false
    }

    fn announce(&mut self, _message: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_disables_speech_silently() {
        let mut announcer =
            CommandAnnouncer::new(CommandLine::parse("motionwatch-missing-tts -v en").unwrap());
        assert!(announcer.is_available());
        announcer.announce("Motion detected").unwrap();
        assert!(!announcer.is_available());
    }
}
