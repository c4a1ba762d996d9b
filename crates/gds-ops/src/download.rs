//! Download through the content-addressed cache.

use std::path::{Path, PathBuf};

use gds_cache::DownloadCache;
use gds_core::{GdsError, GdsResult};
use gds_path::ShellPos;

use crate::GdsContext;

#[derive(Debug)]
pub struct DownloadOutcome {
    /// Canonical remote absolute path (the cache key)
    pub remote_path: String,
    /// Blob location inside the cache
    pub cache_path: PathBuf,
    /// Copy written for the user, when a local path was requested
    pub local_path: Option<PathBuf>,
    pub from_cache: bool,
    pub bytes: u64,
}

/// Fetch a file's content, consulting the cache first unless `force`.
/// Returns (bytes, remote absolute path, blob path).
pub async fn fetch_file_content(
    ctx: &GdsContext<'_>,
    cache: &mut DownloadCache,
    shell: &ShellPos,
    file_input: &str,
    force: bool,
) -> GdsResult<(Vec<u8>, String, PathBuf)> {
    let resolver = ctx.resolver();
    let (file, _parent_id, display) = resolver.resolve_file(file_input, shell).await?;
    let remote_path = resolver.remote_path(&display);

    if !force && cache.is_up_to_date(&remote_path, file.modified_time.as_deref()) {
        if let Some(bytes) = cache.get(&remote_path)? {
            let blob = cache
                .blob_path(&remote_path)
                .expect("entry just served from cache");
            tracing::debug!(%remote_path, "cache hit");
            return Ok((bytes, remote_path, blob));
        }
    }

    let bytes = ctx.gateway.get_media(&file.id).await?;
    let blob = cache.put(&remote_path, &bytes, file.modified_time.as_deref())?;
    tracing::debug!(%remote_path, bytes = bytes.len(), "fetched from provider");
    Ok((bytes, remote_path, blob))
}

/// `download [--force] <file> [local-path]`.
pub async fn download(
    ctx: &GdsContext<'_>,
    cache: &mut DownloadCache,
    shell: &ShellPos,
    file_input: &str,
    local_path: Option<&Path>,
    force: bool,
) -> GdsResult<DownloadOutcome> {
    let had_fresh = {
        let resolver = ctx.resolver();
        let (file, _, display) = resolver.resolve_file(file_input, shell).await?;
        let remote_path = resolver.remote_path(&display);
        cache.is_up_to_date(&remote_path, file.modified_time.as_deref())
    };

    let (bytes, remote_path, cache_path) =
        fetch_file_content(ctx, cache, shell, file_input, force).await?;

    let local = match local_path {
        Some(path) => {
            let dest = if path.is_dir() {
                let name = remote_path
                    .rsplit('/')
                    .next()
                    .ok_or_else(|| GdsError::InvalidInput("empty file name".into()))?;
                path.join(name)
            } else {
                path.to_path_buf()
            };
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&dest, &bytes)?;
            Some(dest)
        }
        None => None,
    };

    Ok(DownloadOutcome {
        remote_path,
        cache_path,
        local_path: local,
        from_cache: had_fresh && !force,
        bytes: bytes.len() as u64,
    })
}
