//! Clipboard delivery through the platform's copy command.
//!
//! No clipboard library is linked. [`SystemClipboard`] finds the first
//! available helper (`pbcopy`, `wl-copy`, `xclip`, `xsel`, `clip.exe`)
//! and pipes the text into its stdin.

use std::env;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::debug;

/// Errors that can occur while copying to the clipboard.
#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("no clipboard command found (tried pbcopy, wl-copy, xclip, xsel, clip.exe)")]
    NoClipboardFound,

    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}")]
    CommandFailed { command: String, status: String },
}

/// Anything that can receive copied text.
pub trait ClipboardSink {
    fn copy(&self, text: &str) -> Result<(), ClipboardError>;
}

/// A copy command and its arguments; text goes to its stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandClipboard {
    program: String,
    args: Vec<String>,
}

impl CommandClipboard {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl ClipboardSink for CommandClipboard {
    fn copy(&self, text: &str) -> Result<(), ClipboardError> {
        let spawn_error = |source| ClipboardError::Spawn {
            command: self.program.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(spawn_error)?;

        // Dropping stdin closes the pipe so the helper sees EOF.
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(err) = stdin.write_all(text.as_bytes()) {
                drop(stdin);
                // The helper must not outlive a failed copy as a zombie.
                let _ = child.kill();
                let _ = child.wait();
                return Err(spawn_error(err));
            }
        }

        let status = child.wait().map_err(spawn_error)?;
        if status.success() {
            Ok(())
        } else {
            Err(ClipboardError::CommandFailed {
                command: self.program.clone(),
                status: status.to_string(),
            })
        }
    }
}

/// The platform clipboard, resolved on each copy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClipboard;

impl SystemClipboard {
    /// The copy command that would be used, if any.
    pub fn detect() -> Option<CommandClipboard> {
        candidates()
            .into_iter()
            .find(|candidate| command_exists(candidate.program()))
    }
}

impl ClipboardSink for SystemClipboard {
    fn copy(&self, text: &str) -> Result<(), ClipboardError> {
        let command = Self::detect().ok_or(ClipboardError::NoClipboardFound)?;
        debug!(command = command.program(), bytes = text.len(), "copying to clipboard");
        command.copy(text)
    }
}

/// Copy commands to try, in order of preference for this platform.
fn candidates() -> Vec<CommandClipboard> {
    let mut out = Vec::new();
    if cfg!(target_os = "macos") {
        out.push(CommandClipboard::new("pbcopy", Vec::<String>::new()));
    } else if cfg!(target_os = "windows") {
        out.push(CommandClipboard::new("clip.exe", Vec::<String>::new()));
    } else {
        if env::var_os("WAYLAND_DISPLAY").is_some() {
            out.push(CommandClipboard::new("wl-copy", Vec::<String>::new()));
        }
        out.push(CommandClipboard::new("xclip", ["-selection", "clipboard", "-in"]));
        out.push(CommandClipboard::new("xsel", ["--clipboard", "--input"]));
        // WSL exposes the Windows clipboard helper on PATH.
        out.push(CommandClipboard::new("clip.exe", Vec::<String>::new()));
    }
    out
}

/// Whether a program is present on `PATH`.
pub fn command_exists(command: &str) -> bool {
    let Some(paths) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&paths).any(|dir| is_executable(&dir.join(command)))
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        path.metadata()
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_exists() {
        assert!(!command_exists("nonexistentcommandxyz"));
    }

    #[test]
    fn test_candidates_not_empty() {
        assert!(!candidates().is_empty());
    }

    #[test]
    fn test_missing_command_is_spawn_error() {
        let sink = CommandClipboard::new("nonexistentcommandxyz", Vec::<String>::new());
        assert!(matches!(sink.copy("x"), Err(ClipboardError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_receives_text() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("clip.txt");
        let script = format!("cat > '{}'", target.display());
        let sink = CommandClipboard::new("sh", ["-c", script.as_str()]);

        sink.copy("tree\n\ncontent").unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "tree\n\ncontent");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_exiting_without_reading() {
        let sink = CommandClipboard::new("sh", ["-c", "exit 0"]);
        let text = "x".repeat(1 << 20);
        assert!(matches!(sink.copy(&text), Err(ClipboardError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_command() {
        let sink = CommandClipboard::new("sh", ["-c", "cat > /dev/null; exit 3"]);
        assert!(matches!(sink.copy("x"), Err(ClipboardError::CommandFailed { .. })));
    }
}
