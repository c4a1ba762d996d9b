//! Non-executing syntax pre-check for generated scripts.
//!
//! Every envelope is run through `bash -n` before the user ever sees it; a
//! failure here aborts the invocation with no remote side effect.

use std::io::Write;
use std::time::Duration;

use gds_core::{GdsError, GdsResult};

pub async fn validate_bash_syntax(script: &str, budget: Duration) -> GdsResult<()> {
    let mut file = tempfile::Builder::new()
        .suffix(".sh")
        .tempfile()
        .map_err(|e| GdsError::Syntax(format!("cannot create check file: {e}")))?;
    file.write_all(b"#!/bin/bash\n")
        .and_then(|_| file.write_all(script.as_bytes()))
        .map_err(|e| GdsError::Syntax(format!("cannot write check file: {e}")))?;
    file.flush()
        .map_err(|e| GdsError::Syntax(format!("cannot flush check file: {e}")))?;

    let check = tokio::process::Command::new("bash")
        .arg("-n")
        .arg(file.path())
        .output();

    let output = match tokio::time::timeout(budget, check).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(GdsError::Syntax(format!("cannot run bash -n: {e}"))),
        Err(_) => return Err(GdsError::Syntax("syntax check timed out".into())),
    };

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(GdsError::Syntax(stderr.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn valid_script_passes() {
        let script = "cd \"/tmp\" && {\n    echo ok\n}";
        validate_bash_syntax(script, Duration::from_secs(5))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unbalanced_brace_fails() {
        let script = "cd \"/tmp\" && {\n    echo ok\n";
        let err = validate_bash_syntax(script, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, GdsError::Syntax(_)));
    }

    #[tokio::test]
    async fn stray_quote_fails() {
        let err = validate_bash_syntax("echo \"unterminated", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, GdsError::Syntax(_)));
    }
}
