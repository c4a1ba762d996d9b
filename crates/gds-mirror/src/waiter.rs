//! Wait for staged files to show up on the drive side.
//!
//! The waiter is a pure observer: it never mutates, and callers decide
//! whether to retry or abort on timeout.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use gds_gateway::DriveGateway;
use tokio::time::Instant;

/// Something that can tell whether a name has propagated.
#[async_trait]
pub trait Observer: Send + Sync {
    async fn observed(&self, name: &str) -> bool;
}

/// Watches a local directory (typically `DRIVE_EQUIVALENT`).
pub struct DirObserver {
    dir: PathBuf,
}

impl DirObserver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirObserver { dir: dir.into() }
    }
}

#[async_trait]
impl Observer for DirObserver {
    async fn observed(&self, name: &str) -> bool {
        tokio::fs::try_exists(self.dir.join(name))
            .await
            .unwrap_or(false)
    }
}

/// Watches a cloud folder through the gateway (used for manual large-file
/// uploads, which land directly at the target).
pub struct GatewayObserver<'a> {
    gateway: &'a dyn DriveGateway,
    folder_id: String,
}

impl<'a> GatewayObserver<'a> {
    pub fn new(gateway: &'a dyn DriveGateway, folder_id: impl Into<String>) -> Self {
        GatewayObserver {
            gateway,
            folder_id: folder_id.into(),
        }
    }
}

#[async_trait]
impl Observer for GatewayObserver<'_> {
    async fn observed(&self, name: &str) -> bool {
        match self.gateway.list_children(&self.folder_id, None).await {
            Ok(children) => children.iter().any(|f| f.name == name),
            Err(e) => {
                tracing::debug!("gateway observation failed: {e}");
                false
            }
        }
    }
}

#[derive(Debug)]
pub struct SyncReport {
    pub success: bool,
    pub elapsed: Duration,
    /// Names that were never observed within the budget.
    pub missing: Vec<String>,
}

pub struct SyncWaiter<'a> {
    observer: &'a dyn Observer,
    poll_interval: Duration,
}

impl<'a> SyncWaiter<'a> {
    pub fn new(observer: &'a dyn Observer, poll_interval: Duration) -> Self {
        SyncWaiter {
            observer,
            poll_interval,
        }
    }

    /// Poll until every name is observed or the budget runs out.
    pub async fn wait_for_sync(&self, names: &[String], budget: Duration) -> SyncReport {
        let started = Instant::now();
        let mut pending: Vec<String> = names.to_vec();

        loop {
            let mut still_pending = Vec::new();
            for name in pending {
                if self.observer.observed(&name).await {
                    tracing::debug!(file = %name, "sync observed");
                } else {
                    still_pending.push(name);
                }
            }
            pending = still_pending;

            if pending.is_empty() {
                return SyncReport {
                    success: true,
                    elapsed: started.elapsed(),
                    missing: Vec::new(),
                };
            }
            if started.elapsed() >= budget {
                return SyncReport {
                    success: false,
                    elapsed: started.elapsed(),
                    missing: pending,
                };
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
