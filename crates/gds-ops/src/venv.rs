//! Virtual environment state management.
//!
//! The single JSON document under `REMOTE_ENV/venv/venv_states.json` is
//! authoritative on the mirror. Every mutation is performed by a remote
//! python3 one-liner that rewrites the file under atomic rename; this side
//! then re-reads it through the gateway to confirm. `venv --current` reads
//! through the gateway alone and never opens a dialog.

use std::time::Duration;

use chrono::Local;
use gds_core::{GdsError, GdsResult};
use gds_path::ShellPos;
use gds_remote::CommandKind;
use gds_shells::{ShellRegistry, VenvStates, VENV_STATES_FILENAME};

use crate::GdsContext;

fn states_remote_path(ctx: &GdsContext<'_>) -> String {
    format!(
        "{}/venv/{VENV_STATES_FILENAME}",
        ctx.config.remote.remote_env_path()
    )
}

/// Locate and parse the venv states document through the gateway. A missing
/// document reads as empty.
pub async fn read_venv_states(ctx: &GdsContext<'_>) -> GdsResult<VenvStates> {
    let root = &ctx.config.remote.root_folder_id;
    let parents = ctx.gateway.parents(root).await?;
    let base = match parents.first() {
        Some(base) => base.clone(),
        None => return Ok(VenvStates::default()),
    };

    let mut folder = base;
    for component in ["REMOTE_ENV", "venv"] {
        let children = ctx.gateway.list_children(&folder, None).await?;
        match children.iter().find(|f| f.name == component && f.is_folder()) {
            Some(hit) => folder = hit.id.clone(),
            None => return Ok(VenvStates::default()),
        }
    }

    let children = ctx.gateway.list_children(&folder, None).await?;
    match children
        .iter()
        .find(|f| f.name == VENV_STATES_FILENAME && !f.is_folder())
    {
        Some(file) => {
            let bytes = ctx.gateway.get_media(&file.id).await?;
            VenvStates::parse(&bytes)
        }
        None => Ok(VenvStates::default()),
    }
}

/// `venv --current`: gateway read only.
pub async fn venv_current(ctx: &GdsContext<'_>, shell_id: &str) -> GdsResult<Option<String>> {
    let states = read_venv_states(ctx).await?;
    Ok(states.active_for(shell_id).map(str::to_string))
}

/// `venv --list`.
pub async fn venv_list(ctx: &GdsContext<'_>) -> GdsResult<Vec<String>> {
    let states = read_venv_states(ctx).await?;
    Ok(states
        .environment_names()
        .into_iter()
        .map(str::to_string)
        .collect())
}

/// Emit the remote mutation script and wait until re-reading the document
/// through the gateway satisfies `confirmed`.
async fn mutate_and_confirm(
    ctx: &GdsContext<'_>,
    shell: &ShellPos,
    mutation: &str,
    confirmed: impl Fn(&VenvStates) -> bool,
) -> GdsResult<()> {
    let path = states_remote_path(ctx);
    let code = format!(
        r#"import json, os
path = {path:?}
os.makedirs(os.path.dirname(path), exist_ok=True)
try:
    with open(path) as f:
        data = json.load(f)
except Exception:
    data = {{}}
{mutation}
tmp = path + ".tmp"
with open(tmp, "w") as f:
    json.dump(data, f, indent=2)
os.replace(tmp, path)
print("ok")"#
    );

    let result = ctx
        .executor()
        .execute(
            "python3",
            &["-c".to_string(), code],
            &ctx.resolver().remote_path(&shell.display_path),
            CommandKind::Venv,
            None,
        )
        .await?;
    if result.exit_code != 0 {
        return Err(GdsError::RemoteExec(format!(
            "venv state update failed (exit {}): {}",
            result.exit_code, result.stderr
        )));
    }

    let attempts = ctx.config.timeouts.verify_attempts.max(1);
    let interval = Duration::from_millis(ctx.config.timeouts.poll_interval_ms);
    for _ in 0..attempts {
        if let Ok(states) = read_venv_states(ctx).await {
            if confirmed(&states) {
                return Ok(());
            }
        }
        tokio::time::sleep(interval).await;
    }
    Err(GdsError::VerifyMiss(
        "venv state change did not propagate".into(),
    ))
}

fn now_string() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// `venv --create <name>`.
pub async fn venv_create(ctx: &GdsContext<'_>, shell: &ShellPos, name: &str) -> GdsResult<()> {
    validate_env_name(name)?;
    let existing = read_venv_states(ctx).await?;
    if existing.has_environment(name) {
        return Err(GdsError::NameCollision(format!(
            "environment already exists: {name}"
        )));
    }
    let env_dir = format!("{}/venv/{name}", ctx.config.remote.remote_env_path());
    let ts = now_string();
    let mutation = format!(
        "os.makedirs({env_dir:?}, exist_ok=True)\n\
         data.setdefault(\"environments\", {{}})[{name:?}] = {{\"created_at\": {ts:?}, \"last_updated\": {ts:?}, \"packages\": {{}}}}"
    );
    mutate_and_confirm(ctx, shell, &mutation, |states| states.has_environment(name)).await
}

/// `venv --delete <name>`: removes the environment and any activation
/// pointing at it.
pub async fn venv_delete(ctx: &GdsContext<'_>, shell: &ShellPos, name: &str) -> GdsResult<()> {
    let existing = read_venv_states(ctx).await?;
    if !existing.has_environment(name) {
        return Err(GdsError::PathNotFound(format!("no such environment: {name}")));
    }
    let mutation = format!(
        "data.get(\"environments\", {{}}).pop({name:?}, None)\n\
         for key in [k for k, v in data.items() if isinstance(v, dict) and v.get(\"active_env\") == {name:?}]:\n\
         \x20   data.pop(key)"
    );
    mutate_and_confirm(ctx, shell, &mutation, |states| !states.has_environment(name)).await
}

/// `venv --activate <name>`: stores the activation under the shell id and
/// mirrors it into the local shell registry.
pub async fn venv_activate(
    ctx: &GdsContext<'_>,
    registry: &mut ShellRegistry,
    shell: &ShellPos,
    shell_id: &str,
    name: &str,
) -> GdsResult<()> {
    let existing = read_venv_states(ctx).await?;
    if !existing.has_environment(name) {
        return Err(GdsError::PathNotFound(format!(
            "no such environment: {name} (create it with venv --create)"
        )));
    }
    let env_path = format!("{}/venv/{name}", ctx.config.remote.remote_env_path());
    let ts = now_string();
    let mutation = format!(
        "data[{shell_id:?}] = {{\"active_env\": {name:?}, \"env_path\": {env_path:?}, \"activated_at\": {ts:?}}}"
    );
    mutate_and_confirm(ctx, shell, &mutation, |states| {
        states.active_for(shell_id) == Some(name)
    })
    .await?;
    registry.set_venv(shell_id, Some(name.to_string()))
}

/// `venv --deactivate`.
pub async fn venv_deactivate(
    ctx: &GdsContext<'_>,
    registry: &mut ShellRegistry,
    shell: &ShellPos,
    shell_id: &str,
) -> GdsResult<()> {
    let mutation = format!("data.pop({shell_id:?}, None)");
    mutate_and_confirm(ctx, shell, &mutation, |states| {
        states.active_for(shell_id).is_none()
    })
    .await?;
    registry.set_venv(shell_id, None)
}

fn validate_env_name(name: &str) -> GdsResult<()> {
    let valid = !name.is_empty()
        && name != "environments"
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(GdsError::InvalidInput(format!(
            "invalid environment name: {name}"
        )))
    }
}
