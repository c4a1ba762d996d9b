//! End-to-end edit scenarios: download, transform, re-upload, backup.

mod common;

use common::Harness;
use gds_cache::DownloadCache;
use gds_gateway::DriveGateway;
use gds_ops::{cat, edit, EditOptions};
use gds_path::ShellPos;
use gds_remote::ScriptedPresenter;

fn cache_for(harness: &Harness) -> DownloadCache {
    DownloadCache::open(&harness.work_dir.path().join("cache")).unwrap()
}

#[tokio::test]
async fn line_range_edit_roundtrips_through_upload() {
    let harness = Harness::new();
    harness.drive.put_file("root", "f.py", b"L0\nL1\nL2\n");
    let shell = ShellPos::root(&harness.config);

    let agent = harness.spawn_sync_agent();
    let presenter = harness.remote_host_presenter();
    let ctx = harness.ctx_quiet(&presenter);
    let mut cache = cache_for(&harness);

    let outcome = edit(
        &ctx,
        &mut cache,
        &shell,
        "f.py",
        r#"[[[1, 1], "X"]]"#,
        EditOptions {
            preview: false,
            backup: false,
        },
        None,
    )
    .await
    .unwrap();
    agent.abort();

    assert!(outcome.uploaded);
    assert_eq!(outcome.replacements_applied, 1);
    assert_eq!(outcome.original_lines, 3);
    assert_eq!(outcome.modified_lines, 3);
    assert!(outcome.diff.contains("-L1"));
    assert!(outcome.diff.contains("+X"));

    // cat sees the edited content
    let content = cat(&ctx, &shell, "f.py").await.unwrap();
    assert_eq!(content, "L0\nX\nL2\n");
}

#[tokio::test]
async fn backup_carries_the_pre_edit_bytes() {
    let harness = Harness::new();
    let original = b"alpha\nbeta\n";
    harness.drive.put_file("root", "doc.txt", original);
    let shell = ShellPos::root(&harness.config);

    let agent = harness.spawn_sync_agent();
    let presenter = harness.remote_host_presenter();
    let ctx = harness.ctx_quiet(&presenter);
    let mut cache = cache_for(&harness);

    let outcome = edit(
        &ctx,
        &mut cache,
        &shell,
        "doc.txt",
        r#"[["beta", "gamma"]]"#,
        EditOptions {
            preview: false,
            backup: true,
        },
        None,
    )
    .await
    .unwrap();
    agent.abort();

    let backup_name = outcome.backup_filename.expect("backup was requested");
    assert!(backup_name.starts_with("doc.txt.backup."));

    // the backup exists remotely with byte-for-byte pre-edit content
    let backup = harness
        .drive
        .find_child("root", &backup_name)
        .expect("backup uploaded");
    assert_eq!(harness.drive.content(&backup.id).unwrap(), original);

    // and the file itself was modified
    let file = harness.drive.find_child("root", "doc.txt").unwrap();
    assert_eq!(harness.drive.content(&file.id).unwrap(), b"alpha\ngamma\n");
}

#[tokio::test]
async fn preview_changes_nothing() {
    let harness = Harness::new();
    let file_id = harness.drive.put_file("root", "p.txt", b"one\ntwo\n");
    let shell = ShellPos::root(&harness.config);

    // neither dialog nor agent may be needed in preview mode
    let presenter = ScriptedPresenter::new(|_| panic!("preview must not open a dialog"));
    let ctx = harness.ctx_quiet(&presenter);
    let mut cache = cache_for(&harness);

    let outcome = edit(
        &ctx,
        &mut cache,
        &shell,
        "p.txt",
        r#"[[[0, 0], "ONE"]]"#,
        EditOptions {
            preview: true,
            backup: false,
        },
        None,
    )
    .await
    .unwrap();

    assert!(outcome.preview);
    assert!(!outcome.uploaded);
    assert!(outcome.diff.contains("+ONE"));

    // remote bytes untouched, no extra listing entries, cache untouched
    assert_eq!(harness.drive.content(&file_id).unwrap(), b"one\ntwo\n");
    assert_eq!(harness.cloud_names("root").await.len(), 2); // tmp + p.txt
    assert!(!cache.is_cached(
        "/content/drive/MyDrive/REMOTE_ROOT/p.txt"
    ));
}

#[tokio::test]
async fn invalid_spec_fails_before_any_upload() {
    let harness = Harness::new();
    harness.drive.put_file("root", "v.txt", b"only line\n");
    let shell = ShellPos::root(&harness.config);

    let presenter = ScriptedPresenter::new(|_| panic!("no dialog for an invalid spec"));
    let ctx = harness.ctx_quiet(&presenter);
    let mut cache = cache_for(&harness);

    let err = edit(
        &ctx,
        &mut cache,
        &shell,
        "v.txt",
        r#"[[[7, 9], "out of range"]]"#,
        EditOptions::default(),
        None,
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("line number range error"));

    // file untouched
    let file = harness.drive.find_child("root", "v.txt").unwrap();
    assert_eq!(harness.drive.content(&file.id).unwrap(), b"only line\n");
}

#[tokio::test]
async fn linter_findings_attach_without_failing() {
    use gds_ops::{LintReport, Linter};

    struct PickyLinter;
    impl Linter for PickyLinter {
        fn lint(&self, _filename: &str, content: &str) -> Option<LintReport> {
            Some(LintReport {
                has_issues: content.contains("TAB"),
                formatted_output: "W001: suspicious content".into(),
            })
        }
    }

    let harness = Harness::new();
    harness.drive.put_file("root", "lint.py", b"x = 1\n");
    let shell = ShellPos::root(&harness.config);

    let agent = harness.spawn_sync_agent();
    let presenter = harness.remote_host_presenter();
    let ctx = harness.ctx_quiet(&presenter);
    let mut cache = cache_for(&harness);

    let outcome = edit(
        &ctx,
        &mut cache,
        &shell,
        "lint.py",
        r#"[["x = 1", "x = TAB"]]"#,
        EditOptions::default(),
        Some(&PickyLinter),
    )
    .await
    .unwrap();
    agent.abort();

    assert!(outcome.uploaded);
    let lint = outcome.lint.expect("linter consulted");
    assert!(lint.has_issues);
    assert!(lint.formatted_output.contains("W001"));
}
