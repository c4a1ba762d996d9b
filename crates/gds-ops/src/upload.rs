//! The upload state machine.
//!
//! Stage into `LOCAL_EQUIVALENT` → wait for the vendor agent to propagate →
//! emit a server-side relocation script → execute through the presenter →
//! verify by listing → clean the staging area. Files above 1 GiB take the
//! manual path; everything else flows through the mirror.

use std::path::PathBuf;
use std::time::Duration;

use gds_cache::DownloadCache;
use gds_core::{DebugBuffer, GdsError, GdsResult};
use gds_mirror::{cleanup_staged, network_live, stage, DirObserver, GatewayObserver, StagedFile, SyncWaiter};
use gds_path::ShellPos;
use gds_remote::script::dquote;
use gds_remote::CommandKind;

use crate::verify::{display_names, verify_upload};
use crate::GdsContext;

/// Files strictly larger than this go through the manual upload path.
pub const LARGE_FILE_THRESHOLD: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub force: bool,
    /// Unlink origin files after successful verification
    pub remove_local: bool,
    pub folder_upload: Option<FolderUploadInfo>,
}

#[derive(Debug, Clone)]
pub struct FolderUploadInfo {
    pub zip_filename: String,
    pub keep_zip: bool,
}

#[derive(Debug)]
pub struct UploadReport {
    pub success: bool,
    pub uploaded_files: Vec<String>,
    pub failed_files: Vec<String>,
    pub target_path: String,
    pub total_attempted: usize,
    pub total_succeeded: usize,
    pub sync_time: Duration,
    pub large_files_handled: bool,
    pub removed_local_files: Vec<PathBuf>,
    pub message: String,
}

struct LargeFile {
    path: PathBuf,
    name: String,
    size: u64,
}

/// Split inputs at the manual-path threshold. Unreadable paths stay in the
/// normal list so staging reports them properly.
fn check_large_files(sources: &[PathBuf]) -> (Vec<PathBuf>, Vec<LargeFile>) {
    let mut normal = Vec::new();
    let mut large = Vec::new();
    for path in sources {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() && meta.len() > LARGE_FILE_THRESHOLD => {
                large.push(LargeFile {
                    name: path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    size: meta.len(),
                    path: path.clone(),
                });
            }
            _ => normal.push(path.clone()),
        }
    }
    (normal, large)
}

pub async fn upload(
    ctx: &GdsContext<'_>,
    cache: &mut DownloadCache,
    shell: &ShellPos,
    sources: &[PathBuf],
    target: &str,
    opts: &UploadOptions,
) -> GdsResult<UploadReport> {
    if sources.is_empty() {
        return Err(GdsError::InvalidInput(
            "please specify files to upload".into(),
        ));
    }

    let mut debug = DebugBuffer::new(ctx.config.debug);
    debug.push(format!(
        "upload: {} source(s), target '{target}', force={}",
        sources.len(),
        opts.force
    ));

    let resolver = ctx.resolver();
    let (normal, large) = check_large_files(sources);

    if !large.is_empty() {
        ctx.progress
            .line(&format!("Detected {} large files (>1GB):", large.len()));
        for file in &large {
            let gib = file.size as f64 / LARGE_FILE_THRESHOLD as f64;
            ctx.progress
                .line(&format!("  - {} ({:.1} GB)", file.name, gib));
        }
        ctx.progress
            .line("Large files must be uploaded manually through the provider's web UI;");
        ctx.progress
            .line("the upload will be detected once the files appear in the target.");
    }

    // Only large files: watch for their names at the target, then stop.
    if normal.is_empty() {
        if large.is_empty() {
            return Err(GdsError::InvalidInput("cannot find valid files".into()));
        }
        return wait_for_manual_upload(ctx, shell, target, &large).await;
    }

    // Target may legitimately not exist yet; the emitted script creates it.
    let target_display = match resolver.resolve_folder(target, shell).await {
        Ok((_, display)) => display,
        Err(_) => resolver.absolute_display(target, shell),
    };

    // Conflict check against the remote listing.
    if !opts.force {
        check_remote_conflicts(ctx, shell, &normal, target).await?;
    } else if let Ok((folder_id, display)) = resolver.resolve_folder(target, shell).await {
        if let Ok(listing) = ctx.listing().list(&folder_id, &display, false).await {
            for source in &normal {
                if let Some(name) = source.file_name().and_then(|n| n.to_str()) {
                    if listing.contains_name(name) {
                        ctx.progress
                            .line(&format!("Warning: Overriding remote file {name}"));
                    }
                }
            }
        }
    }

    // Directories need the folder path.
    for source in &normal {
        if source.is_dir() {
            return Err(GdsError::InvalidInput(format!(
                "'{}' is a directory. To upload folders, use: upload-folder {}",
                source.display(),
                source.display()
            )));
        }
    }

    // Stage into LOCAL_EQUIVALENT.
    let mut staged: Vec<StagedFile> = Vec::new();
    let mut failed_moves: Vec<String> = Vec::new();
    for source in &normal {
        match stage(&ctx.mirror, source).await {
            Ok(file) => {
                if file.renamed {
                    debug.push(format!(
                        "staged under collision-avoiding name: {} -> {}",
                        file.original_name, file.mirror_name
                    ));
                }
                staged.push(file);
            }
            Err(e) => {
                ctx.progress.line(&format!("✗ {e}"));
                failed_moves.push(source.display().to_string());
            }
        }
    }
    if staged.is_empty() {
        return Err(GdsError::Staging("all file moves failed".into()));
    }

    // Network probe is advisory only.
    if !ctx.config.mirror.probe_addr.is_empty() {
        if let Some((host, port)) = split_probe_addr(&ctx.config.mirror.probe_addr) {
            if !network_live(&host, port, Duration::from_secs(3)).await {
                ctx.progress
                    .line("Warning: network check failed; continuing, but verify connectivity");
            }
        }
    }

    // Wait for the vendor agent to propagate the staged names.
    let mirror_names: Vec<String> = staged.iter().map(|f| f.mirror_name.clone()).collect();
    let total_bytes: u64 = staged.iter().map(|f| f.size).sum();
    let budget = Duration::from_secs(ctx.config.sync_budget_secs(staged.len(), total_bytes));
    let observer = DirObserver::new(ctx.mirror.drive_equivalent());
    let waiter = SyncWaiter::new(
        &observer,
        Duration::from_millis(ctx.config.timeouts.poll_interval_ms),
    );
    let sync_report = waiter.wait_for_sync(&mirror_names, budget).await;
    if !sync_report.success {
        return Err(GdsError::SyncTimeout(format!(
            "not propagated within {}s: {}",
            budget.as_secs(),
            sync_report.missing.join(", ")
        )));
    }

    debug.push(format!(
        "sync observed after {:.1}s for {}",
        sync_report.elapsed.as_secs_f64(),
        mirror_names.join(", ")
    ));

    // Server-side relocation script, then the executor.
    let script = build_relocation_script(ctx, &staged, &target_display, opts.folder_upload.as_ref());
    let remote_cwd = resolver.remote_path(&shell.display_path);
    let debug_text = if debug.is_empty() {
        None
    } else {
        Some(debug.render())
    };
    let exec_result = ctx
        .executor()
        .execute(
            "bash",
            &["-c".to_string(), script],
            &remote_cwd,
            CommandKind::Upload,
            debug_text.as_deref(),
        )
        .await?;
    tracing::debug!(exit_code = exec_result.exit_code, "relocation script finished");
    // Diagnostics surface only when the sentinel was bypassed by hand.
    if exec_result.source == "direct_feedback" {
        if let Some(text) = &debug_text {
            ctx.progress.line(text);
        }
    }

    // Folder uploads trust the script: post-extraction names are not
    // predictable from the inputs.
    let verify_report = if opts.folder_upload.is_some() {
        crate::verify::VerifyReport::skipped(staged.len(), &target_display)
    } else {
        let expected: Vec<String> = staged.iter().map(|f| f.original_name.clone()).collect();
        verify_upload(ctx, shell, &expected, target).await
    };

    let mut removed_local = Vec::new();
    if verify_report.success {
        cleanup_staged(&ctx.mirror, &staged).await;
        // Deletion records reclaim rename slots and invalidate stale cache
        // entries for both the original and the mirror name.
        for file in &staged {
            cache.add_deletion_record(&file.original_name);
            if file.renamed {
                cache.add_deletion_record(&file.mirror_name);
            }
        }
        if opts.remove_local {
            for source in &normal {
                match std::fs::remove_file(source) {
                    Ok(()) => removed_local.push(source.clone()),
                    Err(e) => {
                        ctx.progress
                            .line(&format!("Warning: cannot remove {}: {e}", source.display()));
                    }
                }
            }
        }
    }

    let total_attempted = staged.len() + failed_moves.len();
    let mut failed_files = verify_report.missing.clone();
    failed_files.extend(failed_moves);
    let message = if verify_report.success {
        format!(
            "Upload completed: {}/{} files",
            verify_report.total_found,
            staged.len()
        )
    } else {
        format!(
            "Partially uploaded: {}/{} files",
            verify_report.total_found,
            staged.len()
        )
    };

    Ok(UploadReport {
        success: verify_report.success,
        uploaded_files: verify_report.found,
        total_attempted,
        total_succeeded: verify_report.total_found,
        failed_files,
        target_path: target_display,
        sync_time: sync_report.elapsed,
        large_files_handled: !large.is_empty(),
        removed_local_files: removed_local,
        message,
    })
}

async fn wait_for_manual_upload(
    ctx: &GdsContext<'_>,
    shell: &ShellPos,
    target: &str,
    large: &[LargeFile],
) -> GdsResult<UploadReport> {
    let resolver = ctx.resolver();
    let (folder_id, display) = resolver.resolve_folder(target, shell).await?;
    let names: Vec<String> = large.iter().map(|f| f.name.clone()).collect();
    let total_bytes: u64 = large.iter().map(|f| f.size).sum();

    ctx.progress.line(&format!(
        "⏳ Waiting for manual upload of {} ...",
        display_names(&names)
    ));
    let observer = GatewayObserver::new(ctx.gateway, folder_id);
    let waiter = SyncWaiter::new(
        &observer,
        Duration::from_millis(ctx.config.timeouts.poll_interval_ms),
    );
    let budget = Duration::from_secs(ctx.config.sync_budget_secs(large.len(), total_bytes));
    let report = waiter.wait_for_sync(&names, budget).await;

    if !report.success {
        return Err(GdsError::SyncTimeout(format!(
            "manual upload not observed: {}",
            report.missing.join(", ")
        )));
    }
    Ok(UploadReport {
        success: true,
        uploaded_files: names.clone(),
        failed_files: Vec::new(),
        target_path: display,
        total_attempted: names.len(),
        total_succeeded: names.len(),
        sync_time: report.elapsed,
        large_files_handled: true,
        removed_local_files: Vec::new(),
        message: format!("Large files manual upload completed: {} files", names.len()),
    })
}

async fn check_remote_conflicts(
    ctx: &GdsContext<'_>,
    shell: &ShellPos,
    sources: &[PathBuf],
    target: &str,
) -> GdsResult<()> {
    let resolver = ctx.resolver();
    // An unresolvable target cannot conflict; the script will create it.
    let (folder_id, display) = match resolver.resolve_folder(target, shell).await {
        Ok(hit) => hit,
        Err(_) => return Ok(()),
    };
    let listing = match ctx.listing().list(&folder_id, &display, false).await {
        Ok(listing) => listing,
        Err(_) => return Ok(()),
    };

    let conflicts: Vec<String> = sources
        .iter()
        .filter(|s| s.exists())
        .filter_map(|s| s.file_name().and_then(|n| n.to_str()))
        .filter(|name| listing.contains_name(name))
        .map(str::to_string)
        .collect();

    if conflicts.is_empty() {
        Ok(())
    } else {
        Err(GdsError::NameCollision(format!(
            "File exists: {}. Use --force to override.",
            conflicts.join(", ")
        )))
    }
}

fn split_probe_addr(addr: &str) -> Option<(String, u16)> {
    let (host, port) = addr.rsplit_once(':')?;
    Some((host.to_string(), port.parse().ok()?))
}

/// The server-side relocation script: create every distinct target directory,
/// then move each staged file from the drive-side mirror into place under its
/// ORIGINAL name, retrying per second and printing one mark per attempt.
fn build_relocation_script(
    ctx: &GdsContext<'_>,
    staged: &[StagedFile],
    target_display: &str,
    folder_upload: Option<&FolderUploadInfo>,
) -> String {
    let resolver = ctx.resolver();
    let drive_side = ctx.config.remote.drive_equivalent_path();
    let target_dir = resolver.remote_path(target_display);
    let attempts = 60;

    let mut script = String::new();
    script.push_str("# relocate synced files into the target directory\n");
    script.push_str(&format!("total_files={}\n\n", staged.len()));
    script.push_str(&format!("mkdir -p {}\n\n", dquote(&target_dir)));

    let names: Vec<String> = staged.iter().map(|f| f.original_name.clone()).collect();
    script.push_str(&format!(
        "echo -n \"⏳ Uploading {}: \"\n",
        display_names(&names)
    ));

    for (i, file) in staged.iter().enumerate() {
        let source = format!("{drive_side}/{}", file.mirror_name);
        let dest = format!("{target_dir}/{}", file.original_name);
        script.push_str(&format!(
            "\n# file {}/{}: {}\nfor attempt in {{1..{attempts}}}; do\n",
            i + 1,
            staged.len(),
            file.original_name
        ));
        script.push_str(&format!(
            "    if mv {} {} 2>/dev/null; then\n",
            dquote(&source),
            dquote(&dest)
        ));
        script.push_str("        echo -n \"√\"\n        break\n    else\n");
        script.push_str(&format!(
            "        if [ $attempt -eq {attempts} ]; then\n            echo -n \"✗\"\n            break\n        else\n            echo -n \".\"\n            sleep 1\n        fi\n"
        ));
        script.push_str("    fi\ndone\n");
    }

    script.push_str("\nsuccess_count=0\nfail_count=0\n");
    for file in staged {
        let dest = format!("{target_dir}/{}", file.original_name);
        script.push_str(&format!(
            "if [ -f {} ]; then\n    success_count=$((success_count+1))\nelse\n    fail_count=$((fail_count+1))\nfi\n",
            dquote(&dest)
        ));
    }
    script.push_str(
        "\nif [ $fail_count -eq 0 ]; then\n    echo \" ✅\"\nelse\n    echo \" ❌ Partially completed: $success_count/$total_files succeeded\"\nfi\n",
    );

    if let Some(info) = folder_upload {
        let zip = &info.zip_filename;
        script.push_str("\n# extract the uploaded archive in place\n");
        let rm_part = if info.keep_zip {
            String::new()
        } else {
            format!(" && rm {}", dquote(zip))
        };
        script.push_str(&format!(
            "(cd {} && unzip -o {}{rm_part} && ls -la) && echo \"Folder extracted\" || echo \"Extraction failed\"\n",
            dquote(&target_dir),
            dquote(zip),
        ));
    }

    script
}
