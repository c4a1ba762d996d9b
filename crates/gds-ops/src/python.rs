//! Remote python and pip invocations.

use base64::Engine as _;
use gds_core::{GdsError, GdsResult};
use gds_path::ShellPos;
use gds_remote::{CommandKind, SentinelResult};

use crate::GdsContext;

/// `python -c <code>`: the program travels base64-encoded and is decoded
/// and exec'd on the far side, which removes every quoting hazard.
pub async fn python_code(
    ctx: &GdsContext<'_>,
    shell: &ShellPos,
    code: &str,
) -> GdsResult<SentinelResult> {
    let encoded = base64::engine::general_purpose::STANDARD.encode(code.as_bytes());
    let wrapper =
        format!("import base64; exec(base64.b64decode('{encoded}').decode('utf-8'))");
    ctx.executor()
        .execute(
            "python3",
            &["-c".to_string(), wrapper],
            &ctx.resolver().remote_path(&shell.display_path),
            CommandKind::Generic,
            None,
        )
        .await
}

/// `python <file> [args...]`: the file is a Drive path; it runs from the
/// shell's working directory.
pub async fn python_file(
    ctx: &GdsContext<'_>,
    shell: &ShellPos,
    file: &str,
    args: &[String],
) -> GdsResult<SentinelResult> {
    let resolver = ctx.resolver();
    // confirm the file exists before sending the user a script
    let (_, _, display) = resolver.resolve_file(file, shell).await?;
    let remote_file = resolver.remote_path(&display);

    let mut full_args = vec![remote_file];
    full_args.extend(args.iter().cloned());
    ctx.executor()
        .execute(
            "python3",
            &full_args,
            &resolver.remote_path(&shell.display_path),
            CommandKind::Generic,
            None,
        )
        .await
}

/// `pip install|list|show ...`, run remotely as-is.
pub async fn pip(
    ctx: &GdsContext<'_>,
    shell: &ShellPos,
    args: &[String],
) -> GdsResult<SentinelResult> {
    if args.is_empty() {
        return Err(GdsError::InvalidInput("pip: missing arguments".into()));
    }
    ctx.executor()
        .execute(
            "pip",
            args,
            &ctx.resolver().remote_path(&shell.display_path),
            CommandKind::Generic,
            None,
        )
        .await
}

/// `pip --show-deps <pkg>`: dependency listing via importlib.metadata on the
/// remote interpreter, keeping the orchestrator single-threaded.
pub async fn pip_show_deps(
    ctx: &GdsContext<'_>,
    shell: &ShellPos,
    package: &str,
) -> GdsResult<Vec<String>> {
    let code = format!(
        r#"import importlib.metadata as md
try:
    reqs = md.requires({package:?}) or []
    print("\n".join(reqs))
except md.PackageNotFoundError:
    print("package not found: {package}")"#
    );
    let result = python_code(ctx, shell, &code).await?;
    if result.exit_code != 0 {
        return Err(GdsError::RemoteExec(format!(
            "dependency query failed (exit {}): {}",
            result.exit_code, result.stderr
        )));
    }
    Ok(result
        .stdout
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}
