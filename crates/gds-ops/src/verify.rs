//! Post-upload verification.
//!
//! A script may complete and still not have placed files (propagation race),
//! so the verifier is authoritative: it re-resolves the target and re-lists
//! it per attempt, emitting one progress mark per observation.

use std::time::Duration;

use gds_path::ShellPos;

use crate::GdsContext;

#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub success: bool,
    pub found: Vec<String>,
    pub missing: Vec<String>,
    pub total_found: usize,
    pub total_expected: usize,
    pub search_path: String,
}

impl VerifyReport {
    pub fn skipped(expected: usize, search_path: &str) -> Self {
        VerifyReport {
            success: true,
            found: Vec::new(),
            missing: Vec::new(),
            total_found: 0,
            total_expected: expected,
            search_path: search_path.to_string(),
        }
    }
}

/// Shorten a long file list for display: `a, b, c, … (7 files)`.
pub(crate) fn display_names(names: &[String]) -> String {
    if names.len() <= 3 {
        names.join(", ")
    } else {
        format!("{}, … ({} files)", names[..3].join(", "), names.len())
    }
}

/// Confirm each expected name is present in the target directory, retrying
/// per file up to the configured attempt budget.
pub async fn verify_upload(
    ctx: &GdsContext<'_>,
    shell: &ShellPos,
    expected: &[String],
    target_input: &str,
) -> VerifyReport {
    let attempts = ctx.config.timeouts.verify_attempts.max(1);
    let interval = Duration::from_millis(ctx.config.timeouts.poll_interval_ms);
    let resolver = ctx.resolver();
    let listing = ctx.listing();

    ctx.progress
        .emit(&format!("⏳ Validating {} ...", display_names(expected)));

    let mut found = Vec::new();
    let mut missing = Vec::new();

    for name in expected {
        let mut hit = false;
        for attempt in 1..=attempts {
            // Resolve fresh each attempt: the target directory itself may
            // only appear once the script's mkdir propagates.
            let present = match resolver.resolve_folder(target_input, shell).await {
                Ok((folder_id, display)) => listing
                    .list(&folder_id, &display, false)
                    .await
                    .map(|l| l.contains_name(name))
                    .unwrap_or(false),
                Err(_) => false,
            };

            if present {
                ctx.progress.emit("√");
                hit = true;
                break;
            }
            if attempt == attempts {
                ctx.progress.emit("✗");
            } else {
                ctx.progress.emit(".");
                tokio::time::sleep(interval).await;
            }
        }
        if hit {
            found.push(name.clone());
        } else {
            missing.push(name.clone());
        }
    }
    ctx.progress.emit("\n");

    let search_path = resolver.absolute_display(target_input, shell);
    VerifyReport {
        success: missing.is_empty(),
        total_found: found.len(),
        total_expected: expected.len(),
        found,
        missing,
        search_path,
    }
}
