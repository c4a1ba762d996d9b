//! Sentinel result parsing.
//!
//! The remote script writes JSON, but propagation can truncate or mangle it;
//! the reader is parse-tolerant: missing fields get defaults, unbraced
//! content is wrapped, and unparseable content degrades to a raw capture
//! instead of an error.

use serde::{Deserialize, Serialize};

fn default_exit_code() -> i32 {
    -1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelResult {
    #[serde(default)]
    pub cmd: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default = "default_exit_code")]
    pub exit_code: i32,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<serde_json::Value>,
    /// Where the result came from: "sentinel" or "direct_feedback"
    #[serde(default)]
    pub source: String,
}

impl SentinelResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Repair common formatting damage before JSON parsing.
pub fn preprocess_json_content(content: &str) -> String {
    let content = content.trim();
    if content.is_empty() {
        return r#"{"exit_code": -1, "stdout": "", "stderr": "empty content"}"#.to_string();
    }
    let mut repaired = content.to_string();
    if !repaired.starts_with('{') {
        repaired = format!("{{{repaired}");
    }
    if !repaired.ends_with('}') {
        repaired = format!("{repaired}}}");
    }
    repaired
}

/// Parse sentinel content, degrading to a raw capture on bad JSON.
pub fn parse_sentinel(content: &str) -> SentinelResult {
    let cleaned = preprocess_json_content(content);
    match serde_json::from_str::<SentinelResult>(&cleaned) {
        Ok(mut result) => {
            result.source = "sentinel".into();
            result
        }
        Err(e) => SentinelResult {
            cmd: String::new(),
            args: Vec::new(),
            working_dir: String::new(),
            timestamp: String::new(),
            exit_code: -1,
            stdout: content.to_string(),
            stderr: format!("JSON parse failed: {e}"),
            raw_output: Some(content.to_string()),
            raw_error: None,
            debug_info: None,
            source: "sentinel".into(),
        },
    }
}

const ERROR_KEYWORDS: &[&str] = &[
    "error",
    "Error",
    "ERROR",
    "Traceback",
    "command not found",
    "No such file",
    "Permission denied",
    "SyntaxError",
];

/// Interpret output the user pasted back in lieu of the sentinel file. The
/// exit code is inferred from error keywords; crude, but it is a fallback.
pub fn parse_direct_feedback(text: &str) -> SentinelResult {
    let failed = ERROR_KEYWORDS.iter().any(|kw| text.contains(kw));
    SentinelResult {
        cmd: String::new(),
        args: Vec::new(),
        working_dir: String::new(),
        timestamp: String::new(),
        exit_code: if failed { 1 } else { 0 },
        stdout: text.to_string(),
        stderr: String::new(),
        raw_output: None,
        raw_error: None,
        debug_info: None,
        source: "direct_feedback".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_sentinel_parses() {
        let content = r#"{
            "cmd": "ls",
            "args": ["-la"],
            "working_dir": "/remote/proj",
            "timestamp": "2026-03-01T10:00:00",
            "exit_code": 0,
            "stdout": "a.txt\nb.txt",
            "stderr": ""
        }"#;
        let result = parse_sentinel(content);
        assert!(result.success());
        assert_eq!(result.cmd, "ls");
        assert_eq!(result.stdout, "a.txt\nb.txt");
        assert_eq!(result.source, "sentinel");
    }

    #[test]
    fn missing_fields_get_defaults() {
        let result = parse_sentinel(r#"{"stdout": "partial"}"#);
        assert_eq!(result.exit_code, -1);
        assert_eq!(result.stdout, "partial");
        assert_eq!(result.stderr, "");
    }

    #[test]
    fn unbraced_content_is_wrapped() {
        let result = parse_sentinel(r#""exit_code": 0, "stdout": "ok""#);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "ok");
    }

    #[test]
    fn empty_content_is_a_default_failure() {
        let result = parse_sentinel("   ");
        assert_eq!(result.exit_code, -1);
        assert_eq!(result.stderr, "empty content");
    }

    #[test]
    fn garbage_degrades_to_raw_capture() {
        let result = parse_sentinel("{{{not json");
        assert_eq!(result.exit_code, -1);
        assert!(result.stderr.contains("JSON parse failed"));
        assert_eq!(result.raw_output.as_deref(), Some("{{{not json"));
    }

    #[test]
    fn direct_feedback_infers_exit_code() {
        let ok = parse_direct_feedback("all files copied\ndone");
        assert_eq!(ok.exit_code, 0);
        assert_eq!(ok.source, "direct_feedback");

        let bad = parse_direct_feedback("bash: foo: command not found");
        assert_eq!(bad.exit_code, 1);

        let traceback = parse_direct_feedback("Traceback (most recent call last):\n  ...");
        assert_eq!(traceback.exit_code, 1);
    }
}
