// System clipboard access through the host's clipboard tools

#[cfg(test)]
mod tests;

use anyhow::Result;
use std::io::Write;
use std::process::{Command, Stdio};
use tracing::debug;

use crate::DeckError;

/// A program plus its fixed arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    #[inline]
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|arg| (*arg).to_string()).collect(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

#[derive(Debug, Clone)]
pub struct Clipboard {
    read: ToolCommand,
    write: ToolCommand,
    /// PowerShell terminates `Get-Clipboard` output with a line break
    strip_trailing_newline: bool,
}

impl Clipboard {
    /// The clipboard tools for the current platform
    #[inline]
    pub fn system() -> Result<Self> {
        Self::for_os(std::env::consts::OS)
    }

    #[inline]
    pub fn for_os(os: &str) -> Result<Self> {
        match os {
            "windows" => Ok(Self {
                read: ToolCommand::new("powershell", &["-NoProfile", "-Command", "Get-Clipboard"]),
                write: ToolCommand::new(
                    "powershell",
                    &[
                        "-NoProfile",
                        "-Command",
                        "Set-Clipboard -Value ([Console]::In.ReadToEnd())",
                    ],
                ),
                strip_trailing_newline: true,
            }),
            "macos" => Ok(Self::with_commands(
                ToolCommand::new("pbpaste", &[]),
                ToolCommand::new("pbcopy", &[]),
            )),
            "linux" => Ok(Self::with_commands(
                ToolCommand::new("xclip", &["-selection", "clipboard", "-o"]),
                ToolCommand::new("xclip", &["-selection", "clipboard"]),
            )),
            other => Err(DeckError::Clipboard(format!("Unsupported platform: {}", other)).into()),
        }
    }

    /// Read from and write to arbitrary commands. The write command receives
    /// the text on stdin.
    #[inline]
    pub fn with_commands(read: ToolCommand, write: ToolCommand) -> Self {
        Self {
            read,
            write,
            strip_trailing_newline: false,
        }
    }

    #[inline]
    pub fn get(&self) -> Result<String> {
        debug!("Reading clipboard via {}", self.read.program);

        let output = self.read.command().output().map_err(|e| {
            DeckError::Clipboard(format!("Failed to run {}: {}", self.read.program, e))
        })?;

        if !output.status.success() {
            return Err(DeckError::Clipboard(format!(
                "{} exited with {}: {}",
                self.read.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
            .into());
        }

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        if self.strip_trailing_newline {
            let trimmed = text.trim_end_matches(['\r', '\n']).len();
            text.truncate(trimmed);
        }
        Ok(text)
    }

    #[inline]
    pub fn set(&self, text: &str) -> Result<()> {
        debug!("Writing {} chars to clipboard via {}", text.len(), self.write.program);

        let mut child = self
            .write
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                DeckError::Clipboard(format!("Failed to run {}: {}", self.write.program, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).map_err(|e| {
                DeckError::Clipboard(format!("Failed to write to {}: {}", self.write.program, e))
            })?;
        }

        let output = child.wait_with_output().map_err(|e| {
            DeckError::Clipboard(format!("Failed to wait for {}: {}", self.write.program, e))
        })?;

        if !output.status.success() {
            return Err(DeckError::Clipboard(format!(
                "{} exited with {}: {}",
                self.write.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
            .into());
        }
        Ok(())
    }
}

/// Current clipboard text
#[inline]
pub fn get_clipboard() -> Result<String> {
    Clipboard::system()?.get()
}

/// Replace the clipboard text
#[inline]
pub fn set_clipboard(text: &str) -> Result<()> {
    Clipboard::system()?.set(text)
}
