use super::{AlertPlayer, CommandLine};
use anyhow::{Context, Result};
use std::io::Write;

/// Rings the terminal bell on stdout
pub struct TerminalBell;

impl AlertPlayer for TerminalBell {
    fn play(&mut self) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(b"\x07")
            .and_then(|_| stdout.flush())
            .context("Failed to ring terminal bell")
    }
}

/// Plays a tone through an external program, e.g. `paplay /usr/share/sounds/alert.oga`
pub struct CommandTone {
    command: CommandLine,
}

impl CommandTone {
    pub fn new(command: CommandLine) -> Self {
        Self { command }
    }
}

impl AlertPlayer for CommandTone {
    fn play(&mut self) -> Result<()> {
        self.command
            .spawn_detached(None)
            .with_context(|| format!("Failed to start alert command '{}'", self.command.program()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tone_program_is_an_error() {
        let mut tone = CommandTone::new(CommandLine::parse("motionwatch-missing-player").unwrap());
        let err = tone.play().unwrap_err();
        assert!(err.to_string().contains("motionwatch-missing-player"));
    }
}
