//! Remote filesystem commands: mkdir, rm, mv, touch, find.
//!
//! All of these emit a script through the executor. mkdir and mv verify by
//! listing afterwards; rm and touch trust the executor's exit code (an
//! asymmetry kept from the original behavior).

use gds_cache::DownloadCache;
use gds_core::{vpath, GdsError, GdsResult};
use gds_path::ShellPos;
use gds_remote::script::{dquote, quote};
use gds_remote::CommandKind;

use crate::verify::verify_upload;
use crate::GdsContext;

/// `mkdir [-p] <path>`: emit `mkdir -p`, then confirm the new directory is
/// listable. Running it twice succeeds and creates no duplicates.
pub async fn mkdir(ctx: &GdsContext<'_>, shell: &ShellPos, path: &str) -> GdsResult<String> {
    let resolver = ctx.resolver();
    let display = resolver.absolute_display(path, shell);
    if display == vpath::HOME {
        return Err(GdsError::InvalidInput("cannot mkdir the root".into()));
    }
    let remote_path = resolver.remote_path(&display);

    let command = format!("mkdir -p {}", dquote(&remote_path));
    let result = ctx
        .executor()
        .execute(
            "bash",
            &["-c".to_string(), command],
            &resolver.remote_path(&shell.display_path),
            CommandKind::Mkdir,
            None,
        )
        .await?;
    if result.exit_code != 0 {
        return Err(GdsError::RemoteExec(format!(
            "mkdir failed (exit {}): {}",
            result.exit_code, result.stderr
        )));
    }

    let (parent, name) = vpath::split(&display);
    let name = name.ok_or_else(|| GdsError::InvalidInput(format!("invalid path: {path}")))?;
    let report = verify_upload(ctx, shell, &[name], &parent).await;
    if report.success {
        Ok(display)
    } else {
        Err(GdsError::VerifyMiss(format!(
            "directory did not appear: {display}"
        )))
    }
}

/// `rm [-r] [-f] <path>`: emit remote `rm` and trust its exit code; removal
/// is not re-verified by listing.
pub async fn rm(
    ctx: &GdsContext<'_>,
    cache: &mut DownloadCache,
    shell: &ShellPos,
    path: &str,
    recursive: bool,
    force: bool,
) -> GdsResult<()> {
    let resolver = ctx.resolver();
    let display = resolver.absolute_display(path, shell);
    if display == vpath::HOME {
        return Err(GdsError::InvalidInput("refusing to rm the root".into()));
    }
    let remote_path = resolver.remote_path(&display);

    let mut flags = String::new();
    if recursive {
        flags.push_str("-r ");
    }
    if force {
        flags.push_str("-f ");
    }
    let command = format!("rm {flags}{}", dquote(&remote_path));
    let result = ctx
        .executor()
        .execute(
            "bash",
            &["-c".to_string(), command],
            &resolver.remote_path(&shell.display_path),
            CommandKind::Remove,
            None,
        )
        .await?;
    if result.exit_code != 0 {
        return Err(GdsError::RemoteExec(format!(
            "rm failed (exit {}): {}",
            result.exit_code, result.stderr
        )));
    }

    if let Some(name) = display.rsplit('/').next() {
        cache.add_deletion_record(name);
    }
    Ok(())
}

/// `mv <src> <dst>`: remote move with a per-second retry loop, then verify
/// the destination by listing.
pub async fn mv(
    ctx: &GdsContext<'_>,
    shell: &ShellPos,
    source: &str,
    destination: &str,
) -> GdsResult<()> {
    let resolver = ctx.resolver();
    let src_display = resolver.absolute_display(source, shell);
    let src_remote = resolver.remote_path(&src_display);
    let src_name = src_display
        .rsplit('/')
        .next()
        .unwrap_or(source)
        .to_string();

    // Destination may be an existing directory (keep the source name) or a
    // new path (rename).
    let (dest_dir_input, dest_name) = match resolver.resolve_folder(destination, shell).await {
        Ok((_, display)) => (display, src_name.clone()),
        Err(_) => {
            let display = resolver.absolute_display(destination, shell);
            let (dir, name) = vpath::split(&display);
            let name =
                name.ok_or_else(|| GdsError::InvalidInput(format!("invalid destination: {destination}")))?;
            (dir, name)
        }
    };
    let dest_remote = format!(
        "{}/{}",
        resolver.remote_path(&dest_dir_input).trim_end_matches('/'),
        dest_name
    );

    let attempts = 60;
    let script = format!(
        "echo -n \"⏳ Moving {src} -> {dst}: \"\n\
         for attempt in {{1..{attempts}}}; do\n\
         \x20   if mv {src_q} {dst_q} 2>/dev/null; then\n\
         \x20       echo \"✅\"\n\
         \x20       break\n\
         \x20   else\n\
         \x20       if [ $attempt -eq {attempts} ]; then\n\
         \x20           echo \"❌\"\n\
         \x20       else\n\
         \x20           echo -n \".\"\n\
         \x20           sleep 1\n\
         \x20       fi\n\
         \x20   fi\n\
         done",
        src = src_name,
        dst = dest_name,
        src_q = dquote(&src_remote),
        dst_q = dquote(&dest_remote),
    );
    let result = ctx
        .executor()
        .execute(
            "bash",
            &["-c".to_string(), script],
            &resolver.remote_path(&shell.display_path),
            CommandKind::Move,
            None,
        )
        .await?;
    if result.exit_code != 0 {
        return Err(GdsError::RemoteExec(format!(
            "mv failed (exit {}): {}",
            result.exit_code, result.stderr
        )));
    }

    let report = verify_upload(ctx, shell, &[dest_name.clone()], &dest_dir_input).await;
    if report.success {
        Ok(())
    } else {
        Err(GdsError::VerifyMiss(format!(
            "moved file did not appear at {dest_dir_input}/{dest_name}"
        )))
    }
}

/// `touch <file>`: create an empty remote file, trusting the exit code.
pub async fn touch(ctx: &GdsContext<'_>, shell: &ShellPos, filename: &str) -> GdsResult<String> {
    let resolver = ctx.resolver();
    let display = resolver.absolute_display(filename, shell);
    let remote_path = resolver.remote_path(&display);

    let command = format!("touch {}", dquote(&remote_path));
    let result = ctx
        .executor()
        .execute(
            "bash",
            &["-c".to_string(), command],
            &resolver.remote_path(&shell.display_path),
            CommandKind::Touch,
            None,
        )
        .await?;
    if result.exit_code != 0 {
        return Err(GdsError::RemoteExec(format!(
            "touch failed (exit {}): {}",
            result.exit_code, result.stderr
        )));
    }
    Ok(display)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindType {
    File,
    Dir,
}

#[derive(Debug, Clone, Default)]
pub struct FindArgs {
    /// Search root, relative to the shell (default `.`)
    pub path: Option<String>,
    pub name: Option<String>,
    /// Case-insensitive match (`-iname`)
    pub iname: bool,
    pub file_type: Option<FindType>,
}

/// `find [path] -name|-iname|-type`: run remote `find` and map the output
/// lines back into virtual paths.
pub async fn find(ctx: &GdsContext<'_>, shell: &ShellPos, args: &FindArgs) -> GdsResult<Vec<String>> {
    let resolver = ctx.resolver();
    let base_input = args.path.as_deref().unwrap_or(".");
    let base_display = resolver.absolute_display(base_input, shell);
    let base_remote = resolver.remote_path(&base_display);

    let mut command = format!("cd {} && find .", dquote(&base_remote));
    if let Some(t) = args.file_type {
        command.push_str(match t {
            FindType::File => " -type f",
            FindType::Dir => " -type d",
        });
    }
    if let Some(pattern) = &args.name {
        let flag = if args.iname { "-iname" } else { "-name" };
        command.push_str(&format!(" {flag} {}", quote(pattern)));
    }

    let result = ctx
        .executor()
        .execute(
            "bash",
            &["-c".to_string(), command],
            &resolver.remote_path(&shell.display_path),
            CommandKind::Generic,
            None,
        )
        .await?;
    if result.exit_code != 0 {
        return Err(GdsError::RemoteExec(format!(
            "find failed (exit {}): {}",
            result.exit_code, result.stderr
        )));
    }

    let mut matches: Vec<String> = result
        .stdout
        .lines()
        .filter(|line| !line.is_empty() && *line != ".")
        .map(|line| {
            let rel = line.strip_prefix("./").unwrap_or(line);
            if base_display == vpath::HOME {
                format!("~/{rel}")
            } else {
                format!("{base_display}/{rel}")
            }
        })
        .collect();
    matches.sort();
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NullSink;
    use gds_core::GdsConfig;
    use gds_gateway::{DriveGateway, MemoryDrive};
    use gds_mirror::MirrorLayout;
    use gds_remote::{PresenterOutcome, ScriptedPresenter};
    use std::sync::{Arc, Mutex};

    struct Remote {
        drive: Arc<MemoryDrive>,
        config: GdsConfig,
        scripts: Arc<Mutex<Vec<String>>>,
    }

    impl Remote {
        /// A presenter that records scripts, applies `effect` to the drive,
        /// and writes a successful sentinel.
        fn new(effect: impl Fn(&MemoryDrive) + Send + Sync + 'static) -> (Self, ScriptedPresenter) {
            let drive = Arc::new(MemoryDrive::new("root"));
            let tmp = drive.mkdir("root", "tmp");
            let mut config = GdsConfig::default();
            config.remote.root_folder_id = "root".into();
            config.timeouts.result_poll_secs = 3;
            config.timeouts.verify_attempts = 3;
            config.timeouts.poll_interval_ms = 5;
            config.timeouts.syntax_check_ms = 5000;

            let scripts = Arc::new(Mutex::new(Vec::new()));
            let presenter = {
                let drive = Arc::clone(&drive);
                let scripts = Arc::clone(&scripts);
                ScriptedPresenter::new(move |envelope| {
                    scripts.lock().unwrap().push(envelope.script.clone());
                    effect(&drive);
                    drive.put_file(
                        &tmp,
                        &envelope.result_filename,
                        br#"{"exit_code": 0, "stdout": "", "stderr": ""}"#,
                    );
                    PresenterOutcome::Executed
                })
            };
            (
                Remote {
                    drive,
                    config,
                    scripts,
                },
                presenter,
            )
        }
    }

    #[tokio::test]
    async fn mkdir_verifies_by_listing() {
        let (remote, presenter) = Remote::new(|drive| {
            drive.mkdir("root", "newdir");
        });
        let ctx = GdsContext {
            gateway: remote.drive.as_ref(),
            presenter: &presenter,
            config: &remote.config,
            mirror: MirrorLayout::new("/nonexistent"),
            progress: &NullSink,
        };
        let shell = ShellPos::root(&remote.config);

        let display = mkdir(&ctx, &shell, "newdir").await.unwrap();
        assert_eq!(display, "~/newdir");
        let script = remote.scripts.lock().unwrap().join("\n");
        assert!(script.contains("mkdir -p \\\"/content/drive/MyDrive/REMOTE_ROOT/newdir\\\""));
    }

    #[tokio::test]
    async fn mkdir_twice_succeeds_without_duplicates() {
        let (remote, presenter) = Remote::new(|drive| {
            // remote `mkdir -p` semantics: create only when absent
            if drive.find_child("root", "repeat").is_none() {
                drive.mkdir("root", "repeat");
            }
        });
        let ctx = GdsContext {
            gateway: remote.drive.as_ref(),
            presenter: &presenter,
            config: &remote.config,
            mirror: MirrorLayout::new("/nonexistent"),
            progress: &NullSink,
        };
        let shell = ShellPos::root(&remote.config);

        mkdir(&ctx, &shell, "repeat").await.unwrap();
        mkdir(&ctx, &shell, "repeat").await.unwrap();

        let children = remote
            .drive
            .list_children("root", None)
            .await
            .unwrap()
            .into_iter()
            .filter(|f| f.name == "repeat")
            .count();
        assert_eq!(children, 1);
    }

    #[tokio::test]
    async fn mkdir_that_never_appears_is_a_verify_miss() {
        let (remote, presenter) = Remote::new(|_| {});
        let ctx = GdsContext {
            gateway: remote.drive.as_ref(),
            presenter: &presenter,
            config: &remote.config,
            mirror: MirrorLayout::new("/nonexistent"),
            progress: &NullSink,
        };
        let shell = ShellPos::root(&remote.config);

        let err = mkdir(&ctx, &shell, "ghostdir").await.unwrap_err();
        assert!(matches!(err, GdsError::VerifyMiss(_)));
    }

    #[tokio::test]
    async fn rm_trusts_the_exit_code() {
        let (remote, presenter) = Remote::new(|_| {});
        remote.drive.put_file("root", "doomed.txt", b"x");
        let cache_dir = tempfile::tempdir().unwrap();
        let mut cache = gds_cache::DownloadCache::open(cache_dir.path()).unwrap();
        let ctx = GdsContext {
            gateway: remote.drive.as_ref(),
            presenter: &presenter,
            config: &remote.config,
            mirror: MirrorLayout::new("/nonexistent"),
            progress: &NullSink,
        };
        let shell = ShellPos::root(&remote.config);

        // no listing verification: success even though nothing was removed
        rm(&ctx, &mut cache, &shell, "doomed.txt", false, true)
            .await
            .unwrap();
        assert_eq!(cache.deletion_count("doomed.txt"), 1);
        let script = remote.scripts.lock().unwrap().join("\n");
        assert!(script.contains("rm -f"));
    }

    #[tokio::test]
    async fn mv_into_existing_dir_keeps_name_and_verifies() {
        let (remote, presenter) = Remote::new(|drive| {
            // simulate the remote mv: place the file into dest
            if let Some(dest) = drive.find_child("root", "dest") {
                if let Some(file) = drive.find_child("root", "a.txt") {
                    drive.move_node(&file.id, &dest.id, None);
                }
            }
        });
        remote.drive.put_file("root", "a.txt", b"x");
        remote.drive.mkdir("root", "dest");
        let ctx = GdsContext {
            gateway: remote.drive.as_ref(),
            presenter: &presenter,
            config: &remote.config,
            mirror: MirrorLayout::new("/nonexistent"),
            progress: &NullSink,
        };
        let shell = ShellPos::root(&remote.config);

        mv(&ctx, &shell, "a.txt", "dest").await.unwrap();
        let script = remote.scripts.lock().unwrap().join("\n");
        assert!(script.contains("REMOTE_ROOT/a.txt"));
        assert!(script.contains("REMOTE_ROOT/dest/a.txt"));
        assert!(script.contains("for attempt in {1..60}"));
    }

    #[tokio::test]
    async fn find_maps_output_lines_to_virtual_paths() {
        let drive = Arc::new(MemoryDrive::new("root"));
        let tmp = drive.mkdir("root", "tmp");
        drive.mkdir("root", "proj");
        let mut config = GdsConfig::default();
        config.remote.root_folder_id = "root".into();
        config.timeouts.result_poll_secs = 3;
        config.timeouts.poll_interval_ms = 5;
        config.timeouts.syntax_check_ms = 5000;

        let presenter = {
            let drive = Arc::clone(&drive);
            ScriptedPresenter::new(move |envelope| {
                let sentinel = serde_json::json!({
                    "exit_code": 0,
                    "stdout": ".\n./a.py\n./sub\n./sub/b.py",
                    "stderr": ""
                });
                drive.put_file(&tmp, &envelope.result_filename, sentinel.to_string().as_bytes());
                PresenterOutcome::Executed
            })
        };
        let ctx = GdsContext {
            gateway: drive.as_ref(),
            presenter: &presenter,
            config: &config,
            mirror: MirrorLayout::new("/nonexistent"),
            progress: &NullSink,
        };
        let shell = ShellPos::root(&config);

        let args = FindArgs {
            path: Some("proj".into()),
            name: Some("*.py".into()),
            iname: false,
            file_type: Some(FindType::File),
        };
        let matches = find(&ctx, &shell, &args).await.unwrap();
        assert_eq!(
            matches,
            vec![
                "~/proj/a.py".to_string(),
                "~/proj/sub".to_string(),
                "~/proj/sub/b.py".to_string()
            ]
        );
    }
}
