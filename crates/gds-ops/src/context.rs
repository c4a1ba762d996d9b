use std::sync::Mutex;

use gds_core::GdsConfig;
use gds_gateway::DriveGateway;
use gds_mirror::MirrorLayout;
use gds_path::{ListingEngine, PathResolver, ShellPos};
use gds_remote::{CommandPresenter, RemoteExecutor};
use gds_shells::ShellRecord;

/// Everything an operation needs, wired once per invocation. Mutable state
/// (shell registry, download cache) is passed to the operations that need it
/// instead of living here.
pub struct GdsContext<'a> {
    pub gateway: &'a dyn DriveGateway,
    pub presenter: &'a dyn CommandPresenter,
    pub config: &'a GdsConfig,
    pub mirror: MirrorLayout,
    pub progress: &'a dyn ProgressSink,
}

impl<'a> GdsContext<'a> {
    pub fn resolver(&self) -> PathResolver<'a> {
        PathResolver::new(self.gateway, self.config)
    }

    pub fn listing(&self) -> ListingEngine<'a> {
        ListingEngine::new(self.gateway, self.config)
    }

    pub fn executor(&self) -> RemoteExecutor<'a> {
        RemoteExecutor::new(self.gateway, self.presenter, self.config)
    }

    /// Position of a shell record, as the resolver wants it.
    pub fn pos(shell: &ShellRecord) -> ShellPos {
        ShellPos {
            folder_id: shell.current_folder_id.clone(),
            display_path: shell.current_path.clone(),
        }
    }
}

/// Where per-file progress marks (`⏳`, `√`, `.`, `✗`) go. The CLI prints
/// them; tests collect them.
pub trait ProgressSink: Send + Sync {
    /// Emit without a newline (progress marks).
    fn emit(&self, text: &str);
    /// Emit a full line.
    fn line(&self, text: &str);
}

pub struct StdoutSink;

impl ProgressSink for StdoutSink {
    fn emit(&self, text: &str) {
        use std::io::Write;
        print!("{text}");
        let _ = std::io::stdout().flush();
    }

    fn line(&self, text: &str) {
        println!("{text}");
    }
}

pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _text: &str) {}
    fn line(&self, _text: &str) {}
}

/// Collects output for assertions.
#[derive(Default)]
pub struct MemorySink {
    buffer: Mutex<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.buffer.lock().unwrap().clone()
    }
}

impl ProgressSink for MemorySink {
    fn emit(&self, text: &str) {
        self.buffer.lock().unwrap().push_str(text);
    }

    fn line(&self, text: &str) {
        let mut buffer = self.buffer.lock().unwrap();
        buffer.push_str(text);
        buffer.push('\n');
    }
}
