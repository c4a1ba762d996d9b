//! Folder upload: zip locally, relay the archive through the normal upload
//! path, extract remotely.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use gds_cache::DownloadCache;
use gds_core::{GdsError, GdsResult};
use gds_path::ShellPos;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

use crate::upload::{upload, FolderUploadInfo, UploadOptions, UploadReport};
use crate::GdsContext;

/// Zip `folder` into `<parent>/<name>.zip`, entries rooted at the folder
/// name so extraction recreates the folder at the target. Deterministic
/// entry order.
pub fn zip_folder(folder: &Path) -> GdsResult<PathBuf> {
    if !folder.is_dir() {
        return Err(GdsError::InvalidInput(format!(
            "'{}' is not a directory",
            folder.display()
        )));
    }
    let name = folder
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| GdsError::InvalidInput(format!("invalid folder name: {}", folder.display())))?;
    let zip_path = folder
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{name}.zip"));

    let file = std::fs::File::create(&zip_path)?;
    let mut writer = zip::ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut entries: Vec<PathBuf> = WalkDir::new(folder)
        .into_iter()
        .filter_map(Result::ok)
        .map(|e| e.path().to_path_buf())
        .collect();
    entries.sort();

    let base = folder.parent().unwrap_or_else(|| Path::new(""));
    let mut buffer = Vec::new();
    for path in entries {
        let rel = path
            .strip_prefix(base)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        if path.is_dir() {
            writer
                .add_directory(format!("{rel}/"), options)
                .map_err(|e| GdsError::Staging(format!("zip error: {e}")))?;
        } else {
            writer
                .start_file(rel.as_str(), options)
                .map_err(|e| GdsError::Staging(format!("zip error: {e}")))?;
            buffer.clear();
            std::fs::File::open(&path)?.read_to_end(&mut buffer)?;
            writer.write_all(&buffer)?;
        }
    }
    writer
        .finish()
        .map_err(|e| GdsError::Staging(format!("zip error: {e}")))?;

    Ok(zip_path)
}

/// Upload a whole folder: zip, push the archive through the mirror, and let
/// the emitted script `unzip -o` at the target. Verification of extracted
/// names is skipped; the script's success signal is trusted.
pub async fn upload_folder(
    ctx: &GdsContext<'_>,
    cache: &mut DownloadCache,
    shell: &ShellPos,
    folder: &Path,
    target: &str,
    keep_zip: bool,
    force: bool,
) -> GdsResult<UploadReport> {
    let zip_path = zip_folder(folder)?;
    let zip_filename = zip_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let opts = UploadOptions {
        force,
        remove_local: false,
        folder_upload: Some(FolderUploadInfo {
            zip_filename,
            keep_zip,
        }),
    };
    let result = upload(ctx, cache, shell, &[zip_path.clone()], target, &opts).await;

    if !keep_zip {
        if let Err(e) = std::fs::remove_file(&zip_path) {
            tracing::warn!(zip = %zip_path.display(), "cannot remove local zip: {e}");
        }
    }
    result
}
