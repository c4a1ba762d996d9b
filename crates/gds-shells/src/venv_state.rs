//! The venv state document held under the mirror at
//! `REMOTE_ENV/venv/venv_states.json`.
//!
//! The mirror copy is authoritative; this side only parses, renders, and
//! queries it. Mutations happen remotely (a generated script rewrites the
//! file under atomic rename) and are verified by re-reading through the
//! gateway. Shell activations sit at the top level keyed by shell id, next
//! to the `environments` table.

use std::collections::BTreeMap;

use gds_core::{GdsError, GdsResult};
use serde::{Deserialize, Serialize};

pub const VENV_STATES_FILENAME: &str = "venv_states.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShellActivation {
    #[serde(default)]
    pub active_env: Option<String>,
    #[serde(default)]
    pub env_path: Option<String>,
    #[serde(default)]
    pub activated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub packages: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VenvStates {
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentInfo>,
    #[serde(flatten)]
    pub shells: BTreeMap<String, ShellActivation>,
}

impl VenvStates {
    pub fn parse(bytes: &[u8]) -> GdsResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| GdsError::InvalidInput(format!("venv state parse error: {e}")))
    }

    pub fn render(&self) -> GdsResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| GdsError::InvalidInput(format!("venv state render error: {e}")))
    }

    /// Name of the environment the given shell has active, if any.
    pub fn active_for(&self, shell_id: &str) -> Option<&str> {
        self.shells
            .get(shell_id)
            .and_then(|s| s.active_env.as_deref())
    }

    pub fn environment_names(&self) -> Vec<&str> {
        self.environments.keys().map(String::as_str).collect()
    }

    pub fn has_environment(&self, name: &str) -> bool {
        self.environments.contains_key(name)
    }
}
