//! Text-oriented commands: cat, read, grep, and echo-to-file.

use std::collections::BTreeMap;
use std::path::PathBuf;

use base64::Engine as _;
use gds_cache::DownloadCache;
use gds_core::{GdsError, GdsResult};
use gds_path::{Resolved, ShellPos};
use gds_remote::script::dquote;
use gds_remote::CommandKind;

use crate::GdsContext;

/// `cat <file>`: download via the gateway and decode with replacement.
pub async fn cat(ctx: &GdsContext<'_>, shell: &ShellPos, filename: &str) -> GdsResult<String> {
    let resolver = ctx.resolver();
    match resolver.resolve(filename, shell).await? {
        Resolved::Folder { .. } => Err(GdsError::InvalidInput(format!(
            "cat: {filename}: Is a directory"
        ))),
        Resolved::File { file, .. } => {
            let bytes = ctx.gateway.get_media(&file.id).await?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}

/// `read <file> [ranges]`: slice by 0-based inclusive ranges and number the
/// lines. Freshness goes through the download cache.
pub async fn read_file(
    ctx: &GdsContext<'_>,
    cache: &mut DownloadCache,
    shell: &ShellPos,
    filename: &str,
    ranges: &[(usize, usize)],
) -> GdsResult<String> {
    let (bytes, _, _) = crate::fetch_file_content(ctx, cache, shell, filename, false).await?;
    let content = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = content.lines().collect();

    let mut selected: Vec<(usize, &str)> = Vec::new();
    if ranges.is_empty() {
        selected.extend(lines.iter().copied().enumerate());
    } else {
        for &(start, end) in ranges {
            if lines.is_empty() || start >= lines.len() {
                continue;
            }
            let end = end.min(lines.len() - 1);
            for (i, line) in lines.iter().enumerate().take(end + 1).skip(start) {
                selected.push((i, *line));
            }
        }
    }

    if selected.is_empty() {
        return Ok(String::new());
    }
    let mut out = vec!["line_num: line_content".to_string()];
    for (line_num, line) in selected {
        out.push(format!("{line_num:4}: {line}"));
    }
    Ok(out.join("\n"))
}

/// Parse `'[[s1,e1],[s2,e2]]'` or a bare `start end` pair into ranges.
pub fn parse_read_ranges(args: &[String]) -> GdsResult<Vec<(usize, usize)>> {
    match args {
        [] => Ok(Vec::new()),
        [spec] if spec.trim_start().starts_with('[') => {
            let parsed: Vec<(usize, usize)> = serde_json::from_str(spec).map_err(|e| {
                GdsError::InvalidInput(format!("invalid range specification: {e}"))
            })?;
            Ok(parsed)
        }
        [start, end] => {
            let start = start
                .parse()
                .map_err(|_| GdsError::InvalidInput(format!("invalid start line: {start}")))?;
            let end = end
                .parse()
                .map_err(|_| GdsError::InvalidInput(format!("invalid end line: {end}")))?;
            Ok(vec![(start, end)])
        }
        _ => Err(GdsError::InvalidInput(
            "usage: read <file> [start end] or read <file> '[[s1,e1],...]'".into(),
        )),
    }
}

#[derive(Debug, Clone)]
pub struct GrepFileResult {
    /// Cache blob backing the match, when the file could be fetched
    pub local_file: Option<PathBuf>,
    /// 1-based line number → byte columns of each match in that line
    pub occurrences: BTreeMap<usize, Vec<usize>>,
    pub error: Option<String>,
}

/// `grep <pattern> <files...>`.
pub async fn grep(
    ctx: &GdsContext<'_>,
    cache: &mut DownloadCache,
    shell: &ShellPos,
    pattern: &str,
    filenames: &[String],
) -> GdsResult<BTreeMap<String, GrepFileResult>> {
    if filenames.is_empty() {
        return Err(GdsError::InvalidInput("please specify files to search".into()));
    }
    let regex = regex::Regex::new(pattern)
        .map_err(|e| GdsError::InvalidInput(format!("invalid regular expression: {e}")))?;

    let mut results = BTreeMap::new();
    for filename in filenames {
        match crate::fetch_file_content(ctx, cache, shell, filename, false).await {
            Ok((bytes, _, blob)) => {
                let content = String::from_utf8_lossy(&bytes);
                let mut occurrences = BTreeMap::new();
                for (line_num, line) in content.split('\n').enumerate() {
                    let cols: Vec<usize> = regex.find_iter(line).map(|m| m.start()).collect();
                    if !cols.is_empty() {
                        occurrences.insert(line_num + 1, cols);
                    }
                }
                results.insert(
                    filename.clone(),
                    GrepFileResult {
                        local_file: Some(blob),
                        occurrences,
                        error: None,
                    },
                );
            }
            Err(e) => {
                results.insert(
                    filename.clone(),
                    GrepFileResult {
                        local_file: None,
                        occurrences: BTreeMap::new(),
                        error: Some(e.to_string()),
                    },
                );
            }
        }
    }
    Ok(results)
}

/// `echo <text> > <file>`: create the remote file from base64-decoded
/// content, sidestepping quoting hazards entirely.
pub async fn echo_to_file(
    ctx: &GdsContext<'_>,
    shell: &ShellPos,
    text: &str,
    target: &str,
) -> GdsResult<()> {
    let resolver = ctx.resolver();
    let display = resolver.absolute_display(target, shell);
    let remote_path = resolver.remote_path(&display);
    let encoded = base64::engine::general_purpose::STANDARD.encode(text.as_bytes());

    let command = format!(
        "echo {encoded} | base64 -d > {}",
        dquote(&remote_path)
    );
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

    if result.exit_code == 0 {
        Ok(())
    } else {
        Err(GdsError::RemoteExec(format!(
            "echo failed (exit {}): {}",
            result.exit_code, result.stderr
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NullSink;
    use gds_core::GdsConfig;
    use gds_gateway::MemoryDrive;
    use gds_mirror::MirrorLayout;
    use gds_remote::ScriptedPresenter;

    fn fixture() -> (MemoryDrive, GdsConfig, ScriptedPresenter) {
        let drive = MemoryDrive::new("root");
        let mut config = GdsConfig::default();
        config.remote.root_folder_id = "root".into();
        (drive, config, ScriptedPresenter::always_executed())
    }

    #[tokio::test]
    async fn cat_returns_content_and_rejects_dirs() {
        let (drive, config, presenter) = fixture();
        drive.put_file("root", "hello.txt", b"hello world\n");
        drive.mkdir("root", "sub");
        let ctx = GdsContext {
            gateway: &drive,
            presenter: &presenter,
            config: &config,
            mirror: MirrorLayout::new("/nonexistent"),
            progress: &NullSink,
        };
        let shell = ShellPos::root(&config);

        let output = cat(&ctx, &shell, "hello.txt").await.unwrap();
        assert_eq!(output, "hello world\n");

        let err = cat(&ctx, &shell, "sub").await.unwrap_err();
        assert!(err.to_string().contains("Is a directory"));
    }

    #[tokio::test]
    async fn read_numbers_lines_and_clamps_ranges() {
        let (drive, config, presenter) = fixture();
        drive.put_file("root", "f.txt", b"zero\none\ntwo\nthree\n");
        let cache_dir = tempfile::tempdir().unwrap();
        let mut cache = DownloadCache::open(cache_dir.path()).unwrap();
        let ctx = GdsContext {
            gateway: &drive,
            presenter: &presenter,
            config: &config,
            mirror: MirrorLayout::new("/nonexistent"),
            progress: &NullSink,
        };
        let shell = ShellPos::root(&config);

        let out = read_file(&ctx, &mut cache, &shell, "f.txt", &[(1, 2)])
            .await
            .unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "line_num: line_content");
        // exactly min(len, b+1) - max(0, a) content rows
        assert_eq!(lines.len() - 1, 2);
        assert_eq!(lines[1], "   1: one");
        assert_eq!(lines[2], "   2: two");

        // end past EOF clamps
        let out = read_file(&ctx, &mut cache, &shell, "f.txt", &[(2, 99)])
            .await
            .unwrap();
        assert_eq!(out.lines().count() - 1, 2);

        // start past EOF yields nothing
        let out = read_file(&ctx, &mut cache, &shell, "f.txt", &[(10, 20)])
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn range_argument_forms() {
        assert_eq!(parse_read_ranges(&[]).unwrap(), vec![]);
        assert_eq!(
            parse_read_ranges(&["3".into(), "7".into()]).unwrap(),
            vec![(3, 7)]
        );
        assert_eq!(
            parse_read_ranges(&["[[0,2],[5,5]]".into()]).unwrap(),
            vec![(0, 2), (5, 5)]
        );
        assert!(parse_read_ranges(&["x".into(), "y".into()]).is_err());
    }

    #[tokio::test]
    async fn grep_reports_lines_and_columns() {
        let (drive, config, presenter) = fixture();
        drive.put_file("root", "code.py", b"import os\nprint(os.path)\nos = None\n");
        let cache_dir = tempfile::tempdir().unwrap();
        let mut cache = DownloadCache::open(cache_dir.path()).unwrap();
        let ctx = GdsContext {
            gateway: &drive,
            presenter: &presenter,
            config: &config,
            mirror: MirrorLayout::new("/nonexistent"),
            progress: &NullSink,
        };
        let shell = ShellPos::root(&config);

        let results = grep(&ctx, &mut cache, &shell, r"\bos\b", &["code.py".into()])
            .await
            .unwrap();
        let file_result = &results["code.py"];
        assert!(file_result.error.is_none());
        assert_eq!(file_result.occurrences[&1], vec![7]);
        assert_eq!(file_result.occurrences[&2], vec![6]);
        assert_eq!(file_result.occurrences[&3], vec![0]);

        // missing file is reported per-file, not fatal
        let results = grep(&ctx, &mut cache, &shell, "x", &["ghost.txt".into()])
            .await
            .unwrap();
        assert!(results["ghost.txt"].error.is_some());
    }

    #[tokio::test]
    async fn echo_emits_base64_decode_pipeline() {
        use gds_remote::PresenterOutcome;
        use std::sync::{Arc, Mutex};

        let (drive, mut config, _) = fixture();
        config.timeouts.result_poll_secs = 2;
        config.timeouts.poll_interval_ms = 5;
        config.timeouts.syntax_check_ms = 5000;
        let tmp = drive.mkdir("root", "tmp");

        let seen_script = Arc::new(Mutex::new(String::new()));
        let drive = Arc::new(drive);
        let presenter = {
            let seen = Arc::clone(&seen_script);
            let drive = Arc::clone(&drive);
            let tmp = tmp.clone();
            ScriptedPresenter::new(move |envelope| {
                *seen.lock().unwrap() = envelope.script.clone();
                drive.put_file(
                    &tmp,
                    &envelope.result_filename,
                    br#"{"exit_code": 0, "stdout": "", "stderr": ""}"#,
                );
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

        echo_to_file(&ctx, &shell, "hello", "a.txt").await.unwrap();
        let script = seen_script.lock().unwrap().clone();
        let b64 = base64::engine::general_purpose::STANDARD.encode(b"hello");
        assert!(script.contains(&format!("echo {b64} | base64 -d")));
        assert!(script.contains("REMOTE_ROOT/a.txt"));
    }
}
