use std::path::{Path, PathBuf};

use gds_core::GdsResult;

/// Reserved locations under the vendor-synced base directory.
#[derive(Debug, Clone)]
pub struct MirrorLayout {
    base: PathBuf,
}

impl MirrorLayout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        MirrorLayout { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Staging area for outbound writes.
    pub fn local_equivalent(&self) -> PathBuf {
        self.base.join("LOCAL_EQUIVALENT")
    }

    /// Landing zone observed for inbound propagation.
    pub fn drive_equivalent(&self) -> PathBuf {
        self.base.join("DRIVE_EQUIVALENT")
    }

    /// The user-facing virtual root (maps to `~`).
    pub fn remote_root(&self) -> PathBuf {
        self.base.join("REMOTE_ROOT")
    }

    /// Sentinel result files live here.
    pub fn remote_tmp(&self) -> PathBuf {
        self.remote_root().join("tmp")
    }

    /// Environment state and per-env directories.
    pub fn remote_env(&self) -> PathBuf {
        self.base.join("REMOTE_ENV")
    }

    pub fn venv_dir(&self) -> PathBuf {
        self.remote_env().join("venv")
    }

    /// Create the subtrees this side writes into. The drive-side folders are
    /// the agent's to populate, but creating them locally is harmless.
    pub fn ensure_dirs(&self) -> GdsResult<()> {
        for dir in [self.local_equivalent(), self.drive_equivalent()] {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}
