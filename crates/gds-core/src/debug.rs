//! Per-invocation debug capture.
//!
//! The source of record for diagnostics while an operation runs. Owned by the
//! invocation and drained into its result; nothing here is process-global.

#[derive(Debug, Default)]
pub struct DebugBuffer {
    lines: Vec<String>,
    capturing: bool,
}

impl DebugBuffer {
    pub fn new(capturing: bool) -> Self {
        DebugBuffer {
            lines: Vec::new(),
            capturing,
        }
    }

    pub fn start(&mut self) {
        self.capturing = true;
    }

    pub fn stop(&mut self) {
        self.capturing = false;
    }

    /// Record a line if capture is on; always forwarded to tracing at debug.
    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!("{message}");
        if self.capturing {
            self.lines.push(message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Take the captured lines, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }

    /// Render the capture as one block, numbered like the interactive dump.
    pub fn render(&self) -> String {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, line)| format!("  {}. {line}", i + 1))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
