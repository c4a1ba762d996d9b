//! How a generated script reaches the user.
//!
//! The core never blocks on a GUI: it calls through [`CommandPresenter`] and
//! handles the three outcomes. The TTY implementation prints the script and
//! prompts; tests use [`ScriptedPresenter`] to simulate the remote host.

use async_trait::async_trait;
use gds_core::{GdsError, GdsResult};

use crate::CommandEnvelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Upload,
    Mkdir,
    Move,
    Remove,
    Touch,
    Venv,
    Generic,
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CommandKind::Upload => "upload",
            CommandKind::Mkdir => "mkdir",
            CommandKind::Move => "move",
            CommandKind::Remove => "remove",
            CommandKind::Touch => "touch",
            CommandKind::Venv => "venv",
            CommandKind::Generic => "command",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub enum PresenterOutcome {
    /// The user reports the script completed; poll for the sentinel.
    Executed,
    /// The user pasted the command's output back.
    DirectFeedback(String),
    Cancelled,
}

#[async_trait]
pub trait CommandPresenter: Send + Sync {
    /// Show the script and wait for one of the three outcomes.
    async fn present(
        &self,
        envelope: &CommandEnvelope,
        kind: CommandKind,
        debug_info: Option<&str>,
    ) -> GdsResult<PresenterOutcome>;

    /// Fallback when the sentinel never appears: ask the user for the output
    /// directly. `None` means the user skipped.
    async fn request_feedback(&self, prompt: &str) -> GdsResult<Option<String>>;
}

/// Plain-text prompt on the controlling terminal.
pub struct TtyPresenter;

#[async_trait]
impl CommandPresenter for TtyPresenter {
    async fn present(
        &self,
        envelope: &CommandEnvelope,
        kind: CommandKind,
        debug_info: Option<&str>,
    ) -> GdsResult<PresenterOutcome> {
        let script = envelope.script.clone();
        let kind = kind.to_string();
        let debug_info = debug_info.map(str::to_string);
        tokio::task::spawn_blocking(move || {
            println!("── remote {kind} script ──────────────────────────────");
            println!("{script}");
            println!("──────────────────────────────────────────────────────");
            if let Some(debug) = debug_info {
                if !debug.is_empty() {
                    println!("debug:\n{debug}");
                }
            }
            println!("Run the script on the remote host, then choose:");
            println!("  [Enter] executed, wait for the result file");
            println!("  f       paste the output back (direct feedback)");
            println!("  c       cancel");
            print_flush("> ");

            let mut line = String::new();
            if std::io::stdin().read_line(&mut line).is_err() {
                return Ok(PresenterOutcome::Cancelled);
            }
            match line.trim() {
                "" => Ok(PresenterOutcome::Executed),
                "f" | "F" => {
                    println!("Paste the output, end with an empty line:");
                    Ok(PresenterOutcome::DirectFeedback(read_multiline()))
                }
                _ => Ok(PresenterOutcome::Cancelled),
            }
        })
        .await
        .map_err(|e| GdsError::Other(anyhow::anyhow!("presenter task failed: {e}")))?
    }

    async fn request_feedback(&self, prompt: &str) -> GdsResult<Option<String>> {
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || {
            println!("{prompt}");
            println!("Enter the output (empty line to finish, or immediately to skip):");
            let text = read_multiline();
            if text.trim().is_empty() {
                Ok(None)
            } else {
                Ok(Some(text))
            }
        })
        .await
        .map_err(|e| GdsError::Other(anyhow::anyhow!("presenter task failed: {e}")))?
    }
}

fn print_flush(text: &str) {
    use std::io::Write;
    print!("{text}");
    let _ = std::io::stdout().flush();
}

fn read_multiline() -> String {
    use std::io::BufRead;
    let stdin = std::io::stdin();
    let mut lines = Vec::new();
    for line in stdin.lock().lines() {
        match line {
            Ok(line) if line.is_empty() => break,
            Ok(line) => lines.push(line),
            Err(_) => break,
        }
    }
    lines.join("\n")
}

type PresentHook =
    Box<dyn Fn(&CommandEnvelope) -> PresenterOutcome + Send + Sync>;

/// Presenter driven by a closure; integration tests use it to play the role
/// of the remote host (perform the effects, then answer "executed").
pub struct ScriptedPresenter {
    hook: PresentHook,
    feedback: Option<String>,
}

impl ScriptedPresenter {
    pub fn new(hook: impl Fn(&CommandEnvelope) -> PresenterOutcome + Send + Sync + 'static) -> Self {
        ScriptedPresenter {
            hook: Box::new(hook),
            feedback: None,
        }
    }

    /// Always answers `Executed` without side effects.
    pub fn always_executed() -> Self {
        Self::new(|_| PresenterOutcome::Executed)
    }

    pub fn with_timeout_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }
}

#[async_trait]
impl CommandPresenter for ScriptedPresenter {
    async fn present(
        &self,
        envelope: &CommandEnvelope,
        _kind: CommandKind,
        _debug_info: Option<&str>,
    ) -> GdsResult<PresenterOutcome> {
        Ok((self.hook)(envelope))
    }

    async fn request_feedback(&self, _prompt: &str) -> GdsResult<Option<String>> {
        Ok(self.feedback.clone())
    }
}
