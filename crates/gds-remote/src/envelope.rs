//! The result-capturing bash envelope around one user command.
//!
//! Deterministic per (cmd, args, timestamp): the same inputs produce the same
//! script and the same `cmd_<ts>_<hash>.json` result filename, so re-running
//! an envelope is idempotent on the remote side.

use serde::Serialize;

use crate::script::{dquote, escape_for_display, quote_invocation, Script};

#[derive(Debug, Clone, Serialize)]
pub struct CommandEnvelope {
    pub cmd: String,
    pub args: Vec<String>,
    pub timestamp: i64,
    /// 8 hex chars over cmd + args + timestamp
    pub cmd_hash: String,
    /// `cmd_<ts>_<hash>.json`, written under `REMOTE_ROOT/tmp`
    pub result_filename: String,
    /// Resolved remote working directory the script `cd`s into
    pub working_dir: String,
    pub script: String,
}

impl CommandEnvelope {
    pub fn new(
        cmd: &str,
        args: &[String],
        working_dir: &str,
        remote_root: &str,
        timestamp: i64,
    ) -> Self {
        let cmd_hash = hash8(cmd, args, timestamp);
        let result_filename = format!("cmd_{timestamp}_{cmd_hash}.json");
        let script = build_script(
            cmd,
            args,
            working_dir,
            remote_root,
            timestamp,
            &cmd_hash,
            &result_filename,
        );
        CommandEnvelope {
            cmd: cmd.to_string(),
            args: args.to_vec(),
            timestamp,
            cmd_hash,
            result_filename,
            working_dir: working_dir.to_string(),
            script,
        }
    }
}

fn hash8(cmd: &str, args: &[String], timestamp: i64) -> String {
    let material = format!("{cmd}_{}_{timestamp}", args.join(" "));
    blake3::hash(material.as_bytes()).to_hex()[..8].to_string()
}

fn build_script(
    cmd: &str,
    args: &[String],
    working_dir: &str,
    remote_root: &str,
    timestamp: i64,
    cmd_hash: &str,
    result_filename: &str,
) -> String {
    let invocation = quote_invocation(cmd, args);
    let display = escape_for_display(&invocation);
    let tmp_dir = format!("{remote_root}/tmp");
    let stdout_file = format!("{tmp_dir}/cmd_stdout_{timestamp}_{cmd_hash}");
    let stderr_file = format!("{tmp_dir}/cmd_stderr_{timestamp}_{cmd_hash}");
    let exitcode_file = format!("{tmp_dir}/cmd_exitcode_{timestamp}_{cmd_hash}");
    let result_path = format!("{tmp_dir}/{result_filename}");
    let args_json = serde_json::to_string(args).unwrap_or_else(|_| "[]".into());
    let cmd_json = serde_json::to_string(cmd).unwrap_or_else(|_| "\"\"".into());

    let mut script = Script::new();
    script
        .raw(format!("cd {} && {{", dquote(working_dir)))
        .raw(format!("    mkdir -p {}", dquote(&tmp_dir)))
        .raw(format!("    echo \"Running: {display}\""))
        .blank()
        .raw(format!("    OUTPUT_FILE={}", dquote(&stdout_file)))
        .raw(format!("    ERROR_FILE={}", dquote(&stderr_file)))
        .raw(format!("    EXITCODE_FILE={}", dquote(&exitcode_file)))
        .blank()
        .comment("run the command, tolerate failure, record its exit code")
        .raw("    set +e")
        .raw(format!(
            "    {invocation} > \"$OUTPUT_FILE\" 2> \"$ERROR_FILE\""
        ))
        .raw("    EXIT_CODE=$?")
        .raw("    echo \"$EXIT_CODE\" > \"$EXITCODE_FILE\"")
        .raw("    set -e")
        .blank()
        .raw("    if [ -s \"$OUTPUT_FILE\" ]; then")
        .raw("        cat \"$OUTPUT_FILE\"")
        .raw("    fi")
        .raw("    if [ -s \"$ERROR_FILE\" ]; then")
        .raw("        cat \"$ERROR_FILE\" >&2")
        .raw("    fi")
        .blank()
        .comment("synthesise the sentinel JSON from the side files")
        .heredoc(
            "    python3",
            "GDS_RESULT_EOF",
            result_python(
                &cmd_json,
                &args_json,
                &stdout_file,
                &stderr_file,
                &exitcode_file,
            ),
            Some(result_path),
        )
        .blank()
        .raw("    rm -f \"$OUTPUT_FILE\" \"$ERROR_FILE\" \"$EXITCODE_FILE\"")
        .raw("}");
    script.render()
}

/// Body of the python3 here-doc that writes the sentinel JSON. Field defaults
/// match what the tolerant reader assumes: exit_code -1, empty streams.
fn result_python(
    cmd_json: &str,
    args_json: &str,
    stdout_file: &str,
    stderr_file: &str,
    exitcode_file: &str,
) -> String {
    format!(
        r#"import json
import os
from datetime import datetime

def read_file(path):
    if not os.path.exists(path):
        return ""
    try:
        with open(path, "r", encoding="utf-8", errors="ignore") as f:
            return f.read()
    except Exception as e:
        return "ERROR: unreadable: %s" % e

raw_stdout = read_file({stdout_file:?})
raw_stderr = read_file({stderr_file:?})

exit_code = -1
try:
    exit_code = int(read_file({exitcode_file:?}).strip())
except Exception:
    pass

result = {{
    "cmd": {cmd_json},
    "args": {args_json},
    "working_dir": os.getcwd(),
    "timestamp": datetime.now().isoformat(),
    "exit_code": exit_code,
    "stdout": raw_stdout.strip(),
    "stderr": raw_stderr.strip(),
    "raw_output": raw_stdout,
    "raw_error": raw_stderr,
    "debug_info": {{
        "stdout_file_exists": os.path.exists({stdout_file:?}),
        "stderr_file_exists": os.path.exists({stderr_file:?}),
    }},
}}

print(json.dumps(result, indent=2, ensure_ascii=False))"#
    )
}
