use std::time::Duration;

use gds_core::{GdsConfig, GdsError, GdsResult};
use gds_gateway::DriveGateway;

use crate::{
    parse_direct_feedback, parse_sentinel, validate_bash_syntax, CommandEnvelope, CommandKind,
    CommandPresenter, PresenterOutcome, SentinelResult,
};

/// Composes envelope generation, the syntax pre-check, the presenter, and the
/// sentinel poll into one call.
pub struct RemoteExecutor<'a> {
    gateway: &'a dyn DriveGateway,
    presenter: &'a dyn CommandPresenter,
    config: &'a GdsConfig,
}

impl<'a> RemoteExecutor<'a> {
    pub fn new(
        gateway: &'a dyn DriveGateway,
        presenter: &'a dyn CommandPresenter,
        config: &'a GdsConfig,
    ) -> Self {
        RemoteExecutor {
            gateway,
            presenter,
            config,
        }
    }

    /// Run `cmd args...` on the remote host via the user. A malformed script
    /// aborts before the dialog ever opens; a cancel is surfaced verbatim.
    pub async fn execute(
        &self,
        cmd: &str,
        args: &[String],
        remote_working_dir: &str,
        kind: CommandKind,
        debug_info: Option<&str>,
    ) -> GdsResult<SentinelResult> {
        let envelope = CommandEnvelope::new(
            cmd,
            args,
            remote_working_dir,
            &self.config.remote.root_path,
            chrono::Utc::now().timestamp(),
        );

        validate_bash_syntax(
            &envelope.script,
            Duration::from_millis(self.config.timeouts.syntax_check_ms),
        )
        .await?;

        match self.presenter.present(&envelope, kind, debug_info).await? {
            PresenterOutcome::Executed => self.wait_and_read_result(&envelope).await,
            PresenterOutcome::DirectFeedback(text) => Ok(parse_direct_feedback(&text)),
            PresenterOutcome::Cancelled => Err(GdsError::UserCancel),
        }
    }

    /// Poll `~/tmp` for the sentinel, tolerate eventual-consistency delay,
    /// then read, parse, and delete it.
    async fn wait_and_read_result(&self, envelope: &CommandEnvelope) -> GdsResult<SentinelResult> {
        let attempts = self.config.timeouts.result_poll_secs.max(1);
        let interval = Duration::from_millis(self.config.timeouts.poll_interval_ms);

        for attempt in 0..attempts {
            if let Some(file) = self.find_result_file(&envelope.result_filename).await {
                let content = self.gateway.get_media(&file.id).await?;
                let text = String::from_utf8_lossy(&content);
                let result = parse_sentinel(&text);
                if self.config.debug {
                    self.capture_sentinel(&envelope.result_filename, &content);
                }
                if let Err(e) = self.gateway.delete(&file.id).await {
                    tracing::warn!(file = %envelope.result_filename, "cannot delete result file: {e}");
                }
                tracing::debug!(
                    file = %envelope.result_filename,
                    exit_code = result.exit_code,
                    attempt,
                    "sentinel result read"
                );
                return Ok(result);
            }
            tokio::time::sleep(interval).await;
        }

        // The command may still be running (a server, a long job). Fall back
        // to asking the user what happened.
        let prompt = format!(
            "Timed out waiting for the result file ~/tmp/{} ({}s).",
            envelope.result_filename, attempts
        );
        match self.presenter.request_feedback(&prompt).await? {
            Some(text) => Ok(parse_direct_feedback(&text)),
            None => Err(GdsError::RemoteExec(format!(
                "timed out waiting for result file: ~/tmp/{}",
                envelope.result_filename
            ))),
        }
    }

    /// Keep a transient local copy of the sentinel when debug capture is on.
    fn capture_sentinel(&self, result_filename: &str, content: &[u8]) {
        let dir = self.config.data_dir.join("remote_files");
        let write = std::fs::create_dir_all(&dir)
            .and_then(|_| std::fs::write(dir.join(result_filename), content));
        if let Err(e) = write {
            tracing::debug!("cannot capture sentinel copy: {e}");
        }
    }

    async fn find_result_file(&self, result_filename: &str) -> Option<gds_gateway::DriveFile> {
        let root = &self.config.remote.root_folder_id;
        let page = self.config.listing.page_size;
        let children = match self.gateway.list_children(root, Some(page)).await {
            Ok(children) => children,
            Err(e) => {
                tracing::debug!("root listing failed during result poll: {e}");
                return None;
            }
        };
        let tmp = children.iter().find(|f| f.name == "tmp" && f.is_folder())?;
        let tmp_children = match self.gateway.list_children(&tmp.id, None).await {
            Ok(children) => children,
            Err(e) => {
                tracing::debug!("tmp listing failed during result poll: {e}");
                return None;
            }
        };
        tmp_children
            .into_iter()
            .find(|f| f.name == result_filename && !f.is_folder())
    }
}
