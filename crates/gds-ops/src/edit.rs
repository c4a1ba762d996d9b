//! The edit pipeline: declarative multi-segment replacement applied to a
//! freshly downloaded copy, previewed as a unified diff, optionally backed
//! up, and re-uploaded through the normal upload path.
//!
//! Replacement spec elements:
//!   `[[start, end], "content"]`  line-range replacement, 0-based inclusive
//!   `[[line, null], "content"]`  insertion at `line` (0 = before the first
//!                                line, len = append)
//!   `["old", "new"]`             global text substitution
//!
//! Insertions apply first (descending), then ranges (descending), then text
//! substitutions in declared order. Indices are validated against the
//! original file.

use std::path::PathBuf;

use chrono::Local;
use gds_cache::DownloadCache;
use gds_core::{GdsError, GdsResult};
use gds_path::ShellPos;
use similar::TextDiff;

use crate::upload::{upload, UploadOptions};
use crate::GdsContext;

#[derive(Debug, Clone, PartialEq)]
pub enum ReplaceOp {
    Insert { line: usize, content: String },
    Range { start: usize, end: usize, content: String },
    Text { old: String, new: String },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EditOptions {
    pub preview: bool,
    pub backup: bool,
}

#[derive(Debug, Clone)]
pub struct LintReport {
    pub has_issues: bool,
    pub formatted_output: String,
}

/// Collaborator seam; findings are attached to the result, never fatal.
pub trait Linter: Send + Sync {
    fn lint(&self, filename: &str, content: &str) -> Option<LintReport>;
}

#[derive(Debug)]
pub struct EditOutcome {
    pub filename: String,
    pub preview: bool,
    pub original_lines: usize,
    pub modified_lines: usize,
    pub replacements_applied: usize,
    pub diff: String,
    pub backup_filename: Option<String>,
    pub uploaded: bool,
    pub lint: Option<LintReport>,
}

/// Split text into lines that keep their trailing newline, like the slices
/// the replacement indices refer to.
pub fn split_keepends(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, b) in text.bytes().enumerate() {
        if b == b'\n' {
            lines.push(text[start..=i].to_string());
            start = i + 1;
        }
    }
    if start < text.len() {
        lines.push(text[start..].to_string());
    }
    lines
}

/// Expand the escape `\n` and the whitespace placeholders.
fn expand_placeholders(content: &str) -> String {
    content
        .replace("\\n", "\n")
        .replace("_SPACE_", " ")
        .replace("_SP_", " ")
        .replace("_4SP_", "    ")
        .replace("_TAB_", "\t")
}

const SPEC_FORMAT_HELP: &str = "Correct format examples:\n  \
    Text replacement: '[[\"old\", \"new\"]]'\n  \
    Line replacement: '[[[1, 3], \"new content\"]]'\n  \
    Insertion:        '[[[2, null], \"inserted\"]]'\n  \
    Mixed:            '[[[1, 2], \"line\"], [\"old\", \"new\"]]'";

/// Parse and validate a replacement spec against the original lines.
pub fn parse_replacement_spec(spec: &str, original: &[String]) -> GdsResult<Vec<ReplaceOp>> {
    let value: serde_json::Value = serde_json::from_str(spec).map_err(|e| {
        GdsError::InvalidInput(format!(
            "JSON parsing failed: {e}\n\nCommon issues:\n\
             1. Missing quotes around strings\n\
             2. Unescaped quotes inside strings (use \\\" instead of \")\n\
             3. Missing commas between array elements\n\
             4. Shell quote conflicts. Try single quotes around the JSON\n\n{SPEC_FORMAT_HELP}"
        ))
    })?;

    let items = value.as_array().ok_or_else(|| {
        GdsError::InvalidInput(format!(
            "replacement specification must be an array\n{SPEC_FORMAT_HELP}"
        ))
    })?;

    let len = original.len();
    let joined: String = original.concat();
    let mut ops = Vec::new();

    for (i, item) in items.iter().enumerate() {
        let pair = item.as_array().filter(|p| p.len() == 2).ok_or_else(|| {
            GdsError::InvalidInput(format!(
                "replacement item {} must be a [source, target] pair",
                i + 1
            ))
        })?;
        let target = pair[1].as_str().ok_or_else(|| {
            GdsError::InvalidInput(format!("replacement item {}: target must be a string", i + 1))
        })?;

        match &pair[0] {
            serde_json::Value::Array(source) if source.len() == 2 => {
                let start = source[0].as_i64().ok_or_else(|| {
                    GdsError::InvalidInput(format!(
                        "replacement item {}: line numbers must be integers",
                        i + 1
                    ))
                })?;
                let end_is_null = source[1].is_null()
                    || source[1].as_str().is_some_and(|s| s.is_empty() || s == "null");

                if end_is_null {
                    if start < 0 || start as usize > len {
                        return Err(GdsError::InvalidInput(format!(
                            "insert line number out of range: {start} (valid range: 0-{len}, 0-based)"
                        )));
                    }
                    ops.push(ReplaceOp::Insert {
                        line: start as usize,
                        content: target.to_string(),
                    });
                } else {
                    let end = source[1].as_i64().ok_or_else(|| {
                        GdsError::InvalidInput(format!(
                            "invalid line specification: [{}, {}]; use [start, end] or [line, null]",
                            source[0], source[1]
                        ))
                    })?;
                    if start < 0 || end < 0 || start > end || end as usize >= len {
                        return Err(GdsError::InvalidInput(format!(
                            "line number range error: [{start}, {end}] in file with {len} lines (0-based)"
                        )));
                    }
                    ops.push(ReplaceOp::Range {
                        start: start as usize,
                        end: end as usize,
                        content: target.to_string(),
                    });
                }
            }
            serde_json::Value::String(old) => {
                if !joined.contains(old.as_str()) {
                    let preview: String = old.chars().take(50).collect();
                    return Err(GdsError::InvalidInput(format!(
                        "text not found to replace: {preview}..."
                    )));
                }
                ops.push(ReplaceOp::Text {
                    old: old.clone(),
                    new: target.to_string(),
                });
            }
            other => {
                return Err(GdsError::InvalidInput(format!(
                    "replacement item {}: unsupported source {other}; use [start, end] or a text string",
                    i + 1
                )));
            }
        }
    }
    Ok(ops)
}

/// Render content into keepends lines. `terminal_newline` controls whether
/// the last rendered line carries one.
fn content_to_lines(content: &str, terminal_newline: bool) -> Vec<String> {
    let expanded = expand_placeholders(content);
    let parts: Vec<&str> = expanded.split('\n').collect();
    let count = parts.len();
    parts
        .into_iter()
        .enumerate()
        .map(|(i, part)| {
            if i + 1 < count || terminal_newline {
                format!("{part}\n")
            } else {
                part.to_string()
            }
        })
        .collect()
}

/// Apply the ops: insertions (descending line), range replacements
/// (descending start), then text substitutions in declared order.
pub fn apply_replacements(original: &[String], ops: &[ReplaceOp]) -> Vec<String> {
    let mut lines: Vec<String> = original.to_vec();
    let original_had_final_newline = original.last().map_or(true, |l| l.ends_with('\n'));
    let last_index = original.len().saturating_sub(1);

    let mut inserts: Vec<(usize, &String)> = ops
        .iter()
        .filter_map(|op| match op {
            ReplaceOp::Insert { line, content } => Some((*line, content)),
            _ => None,
        })
        .collect();
    inserts.sort_by(|a, b| b.0.cmp(&a.0));
    for (line, content) in inserts {
        if content.is_empty() {
            continue;
        }
        let at = line.min(lines.len());
        let new_lines = content_to_lines(content, true);
        lines.splice(at..at, new_lines);
    }

    let mut ranges: Vec<(usize, usize, &String)> = ops
        .iter()
        .filter_map(|op| match op {
            ReplaceOp::Range { start, end, content } => Some((*start, *end, content)),
            _ => None,
        })
        .collect();
    ranges.sort_by(|a, b| b.0.cmp(&a.0));
    for (start, end, content) in ranges {
        let start = start.min(lines.len());
        let end_excl = (end + 1).min(lines.len());
        if content.is_empty() {
            lines.splice(start..end_excl, std::iter::empty::<String>());
            continue;
        }
        // Replacing through the original last line keeps its newline state.
        let terminal_newline = !(end == last_index && !original_had_final_newline);
        let new_lines = content_to_lines(content, terminal_newline);
        lines.splice(start..end_excl, new_lines);
    }

    let has_text_ops = ops.iter().any(|op| matches!(op, ReplaceOp::Text { .. }));
    if has_text_ops {
        let mut content: String = lines.concat();
        for op in ops {
            if let ReplaceOp::Text { old, new } = op {
                content = content.replace(old.as_str(), new);
            }
        }
        lines = split_keepends(&content);
    }

    lines
}

/// Unified diff of the affected regions only.
fn render_diff(filename: &str, original: &str, modified: &str) -> String {
    TextDiff::from_lines(original, modified)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{filename}"), &format!("b/{filename}"))
        .to_string()
}

fn backup_timestamp() -> String {
    let now = Local::now();
    format!(
        "{}_{:04}",
        now.format("%Y%m%d_%H%M%S"),
        now.timestamp_millis().rem_euclid(10000)
    )
}

pub async fn edit(
    ctx: &GdsContext<'_>,
    cache: &mut DownloadCache,
    shell: &ShellPos,
    filename: &str,
    spec: &str,
    opts: EditOptions,
    linter: Option<&dyn Linter>,
) -> GdsResult<EditOutcome> {
    let resolver = ctx.resolver();

    // Preview must leave the cache untouched, so it reads the provider
    // directly; a real edit force-refreshes the cache first.
    let (original_bytes, remote_path) = if opts.preview {
        let (file, _, display) = resolver.resolve_file(filename, shell).await?;
        let bytes = ctx.gateway.get_media(&file.id).await?;
        (bytes, resolver.remote_path(&display))
    } else {
        let (bytes, remote_path, _) =
            crate::fetch_file_content(ctx, cache, shell, filename, true).await?;
        (bytes, remote_path)
    };

    let original_text = String::from_utf8(original_bytes.clone()).map_err(|_| {
        GdsError::InvalidInput(format!(
            "{filename}: unsupported file encoding; only UTF-8 text can be edited"
        ))
    })?;
    let original_lines = split_keepends(&original_text);

    let ops = parse_replacement_spec(spec, &original_lines)?;
    let modified_lines = apply_replacements(&original_lines, &ops);
    let modified_text: String = modified_lines.concat();
    let diff = render_diff(filename, &original_text, &modified_text);

    if opts.preview {
        return Ok(EditOutcome {
            filename: filename.to_string(),
            preview: true,
            original_lines: original_lines.len(),
            modified_lines: modified_lines.len(),
            replacements_applied: ops.len(),
            diff,
            backup_filename: None,
            uploaded: false,
            lint: None,
        });
    }

    let display = resolver.absolute_display(filename, shell);
    let (target_dir, basename) = gds_core::vpath::split(&display);
    let basename = basename
        .ok_or_else(|| GdsError::InvalidInput(format!("invalid file path: {filename}")))?;

    // Scratch dir for the batch; removed on the way out.
    let scratch = std::env::temp_dir().join(format!(
        "gds-edit-{}",
        &blake3::hash(format!("{remote_path}-{}", backup_timestamp()).as_bytes()).to_hex()[..12]
    ));
    std::fs::create_dir_all(&scratch)?;

    let result = async {
        let mut batch: Vec<PathBuf> = Vec::new();
        let mut backup_filename = None;

        if opts.backup {
            let name = format!("{basename}.backup.{}", backup_timestamp());
            let path = scratch.join(&name);
            std::fs::write(&path, &original_bytes)?;
            batch.push(path);
            backup_filename = Some(name);
        }

        let modified_path = scratch.join(&basename);
        std::fs::write(&modified_path, modified_text.as_bytes())?;
        batch.push(modified_path);

        let upload_opts = UploadOptions {
            force: true,
            ..Default::default()
        };
        let report = upload(ctx, cache, shell, &batch, &target_dir, &upload_opts).await?;
        if !report.success {
            return Err(GdsError::VerifyMiss(format!(
                "edited file did not verify: {}",
                report.failed_files.join(", ")
            )));
        }

        // The remote copy just changed; keep the cache pointing at what we
        // wrote, with unknown modifiedTime so the next read re-validates.
        cache.put(&remote_path, modified_text.as_bytes(), None)?;

        let lint = linter.and_then(|l| l.lint(filename, &modified_text));
        Ok(EditOutcome {
            filename: filename.to_string(),
            preview: false,
            original_lines: original_lines.len(),
            modified_lines: modified_lines.len(),
            replacements_applied: ops.len(),
            diff,
            backup_filename,
            uploaded: true,
            lint,
        })
    }
    .await;

    if let Err(e) = std::fs::remove_dir_all(&scratch) {
        tracing::warn!(dir = %scratch.display(), "scratch cleanup failed: {e}");
    }
    result
}
