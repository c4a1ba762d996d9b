use std::path::{Path, PathBuf};

use gds_core::{GdsError, GdsResult};
use tokio::fs;

use crate::MirrorLayout;

/// A file placed into `LOCAL_EQUIVALENT`, possibly under a collision-avoiding
/// name. Removed again by cleanup after successful verification.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub origin_path: PathBuf,
    /// Name the file carries inside the mirror (may differ from the original)
    pub mirror_name: String,
    pub original_name: String,
    pub renamed: bool,
    pub size: u64,
}

/// Copy `source` into the staging area. A name collision with a
/// concurrently-staging file gets a content-hash prefix so both can travel
/// through the mirror at once; the remote move restores the original name.
pub async fn stage(layout: &MirrorLayout, source: &Path) -> GdsResult<StagedFile> {
    let meta = fs::metadata(source)
        .await
        .map_err(|e| GdsError::Staging(format!("cannot stat {}: {e}", source.display())))?;
    if meta.is_dir() {
        return Err(GdsError::Staging(format!(
            "{} is a directory",
            source.display()
        )));
    }

    let original_name = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| GdsError::Staging(format!("invalid file name: {}", source.display())))?
        .to_string();

    let staging = layout.local_equivalent();
    fs::create_dir_all(&staging)
        .await
        .map_err(|e| GdsError::Staging(format!("cannot create staging dir: {e}")))?;

    let mut mirror_name = original_name.clone();
    let mut renamed = false;
    if fs::try_exists(staging.join(&mirror_name))
        .await
        .unwrap_or(false)
    {
        let content = fs::read(source)
            .await
            .map_err(|e| GdsError::Staging(format!("cannot read {}: {e}", source.display())))?;
        let prefix = &blake3::hash(&content).to_hex()[..8];
        mirror_name = format!("{prefix}_{original_name}");
        renamed = true;
        tracing::debug!(original = %original_name, mirror = %mirror_name, "staging rename");
    }

    let dest = staging.join(&mirror_name);
    fs::copy(source, &dest)
        .await
        .map_err(|e| GdsError::Staging(format!("cannot stage {}: {e}", source.display())))?;

    Ok(StagedFile {
        origin_path: source.to_path_buf(),
        mirror_name,
        original_name,
        renamed,
        size: meta.len(),
    })
}

/// Remove staged files after verification. Missing files are fine: the agent
/// may already have relocated them.
pub async fn cleanup_staged(layout: &MirrorLayout, staged: &[StagedFile]) -> Vec<String> {
    let staging = layout.local_equivalent();
    let mut removed = Vec::new();
    for file in staged {
        let path = staging.join(&file.mirror_name);
        match fs::remove_file(&path).await {
            Ok(()) => removed.push(file.mirror_name.clone()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(file = %file.mirror_name, "staging cleanup failed: {e}");
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stage_copies_into_local_equivalent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = MirrorLayout::new(dir.path().join("mirror"));
        let source = dir.path().join("x.py");
        std::fs::write(&source, b"print('hi')").unwrap();

        let staged = stage(&layout, &source).await.unwrap();
        assert_eq!(staged.original_name, "x.py");
        assert_eq!(staged.mirror_name, "x.py");
        assert!(!staged.renamed);
        assert_eq!(staged.size, 11);
        assert!(layout.local_equivalent().join("x.py").is_file());
        // source is untouched
        assert!(source.is_file());
    }

    #[tokio::test]
    async fn collision_gets_hash_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let layout = MirrorLayout::new(dir.path().join("mirror"));

        let first = dir.path().join("one").join("a.txt");
        std::fs::create_dir_all(first.parent().unwrap()).unwrap();
        std::fs::write(&first, b"first").unwrap();
        let second = dir.path().join("two").join("a.txt");
        std::fs::create_dir_all(second.parent().unwrap()).unwrap();
        std::fs::write(&second, b"second").unwrap();

        let staged_a = stage(&layout, &first).await.unwrap();
        let staged_b = stage(&layout, &second).await.unwrap();

        assert!(!staged_a.renamed);
        assert!(staged_b.renamed);
        assert_ne!(staged_a.mirror_name, staged_b.mirror_name);
        assert!(staged_b.mirror_name.ends_with("_a.txt"));
        assert_eq!(staged_b.original_name, "a.txt");
        assert!(layout
            .local_equivalent()
            .join(&staged_b.mirror_name)
            .is_file());
    }

    #[tokio::test]
    async fn staging_a_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let layout = MirrorLayout::new(dir.path().join("mirror"));
        let sub = dir.path().join("folder");
        std::fs::create_dir(&sub).unwrap();

        let err = stage(&layout, &sub).await.unwrap_err();
        assert!(matches!(err, GdsError::Staging(_)));
    }

    #[tokio::test]
    async fn cleanup_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let layout = MirrorLayout::new(dir.path().join("mirror"));
        let source = dir.path().join("gone.txt");
        std::fs::write(&source, b"x").unwrap();

        let staged = stage(&layout, &source).await.unwrap();
        // the agent "took" the file already
        std::fs::remove_file(layout.local_equivalent().join(&staged.mirror_name)).unwrap();

        let removed = cleanup_staged(&layout, &[staged]).await;
        assert!(removed.is_empty());
    }
}
