//! Shell registry: named session records persisted to `shells.json`.
//!
//! Loaded into memory on open, mutated in place, flushed with an atomic
//! write-then-rename. Every mutation path maintains the invariants: at most
//! one active shell, `current_path`/`current_folder_id` updated together,
//! `last_accessed` monotonically non-decreasing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Local;
use gds_core::{vpath, GdsError, GdsResult};
use serde::{Deserialize, Serialize};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VenvState {
    #[serde(default)]
    pub active_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellRecord {
    pub id: String,
    pub name: String,
    pub current_path: String,
    pub current_folder_id: String,
    pub created_time: String,
    pub last_accessed: String,
    #[serde(default)]
    pub venv_state: VenvState,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ShellsFile {
    #[serde(default)]
    shells: BTreeMap<String, ShellRecord>,
    #[serde(default)]
    active_shell: Option<String>,
}

pub struct ShellRegistry {
    path: PathBuf,
    data: ShellsFile,
    dirty: bool,
}

impl ShellRegistry {
    /// Load the registry, starting empty if the file does not exist.
    pub fn open(path: &Path) -> GdsResult<Self> {
        let data = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content).map_err(|e| {
                GdsError::InvalidInput(format!("shells file parse error ({}): {e}", path.display()))
            })?
        } else {
            ShellsFile::default()
        };
        Ok(ShellRegistry {
            path: path.to_path_buf(),
            data,
            dirty: false,
        })
    }

    /// Create a new shell at the virtual root. The first shell created
    /// becomes the active one.
    pub fn create(&mut self, name: Option<&str>, root_folder_id: &str) -> GdsResult<ShellRecord> {
        let id = generate_shell_id();
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("shell_{}", &id[..8]));
        let now = now_string();
        let record = ShellRecord {
            id: id.clone(),
            name,
            current_path: vpath::HOME.to_string(),
            current_folder_id: root_folder_id.to_string(),
            created_time: now.clone(),
            last_accessed: now,
            venv_state: VenvState::default(),
        };
        self.data.shells.insert(id.clone(), record.clone());
        if self.data.active_shell.is_none() {
            self.data.active_shell = Some(id);
        }
        self.dirty = true;
        self.flush()?;
        Ok(record)
    }

    pub fn list(&self) -> Vec<&ShellRecord> {
        self.data.shells.values().collect()
    }

    pub fn active_id(&self) -> Option<&str> {
        self.data.active_shell.as_deref()
    }

    /// The currently active shell, if any.
    pub fn active(&self) -> Option<&ShellRecord> {
        self.data
            .active_shell
            .as_ref()
            .and_then(|id| self.data.shells.get(id))
    }

    fn find_id(&self, id_or_prefix: &str) -> GdsResult<String> {
        if self.data.shells.contains_key(id_or_prefix) {
            return Ok(id_or_prefix.to_string());
        }
        let matches: Vec<&String> = self
            .data
            .shells
            .keys()
            .filter(|k| k.starts_with(id_or_prefix))
            .collect();
        match matches.as_slice() {
            [only] => Ok((*only).clone()),
            [] => Err(GdsError::InvalidInput(format!(
                "no shell matches: {id_or_prefix}"
            ))),
            _ => Err(GdsError::InvalidInput(format!(
                "ambiguous shell id: {id_or_prefix}"
            ))),
        }
    }

    /// Switch the active shell.
    pub fn checkout(&mut self, id_or_prefix: &str) -> GdsResult<ShellRecord> {
        let id = self.find_id(id_or_prefix)?;
        self.touch(&id);
        self.data.active_shell = Some(id.clone());
        self.dirty = true;
        self.flush()?;
        Ok(self.data.shells[&id].clone())
    }

    /// Remove a shell. Terminating the active shell leaves no shell active.
    pub fn terminate(&mut self, id_or_prefix: &str) -> GdsResult<()> {
        let id = self.find_id(id_or_prefix)?;
        self.data.shells.remove(&id);
        if self.data.active_shell.as_deref() == Some(id.as_str()) {
            self.data.active_shell = None;
        }
        self.dirty = true;
        self.flush()
    }

    /// Commit a `cd`: path and folder ID move together, never separately,
    /// and reach disk before the call returns.
    pub fn update_position(&mut self, id: &str, path: &str, folder_id: &str) -> GdsResult<()> {
        let record = self
            .data
            .shells
            .get_mut(id)
            .ok_or_else(|| GdsError::InvalidInput(format!("no shell matches: {id}")))?;
        record.current_path = path.to_string();
        record.current_folder_id = folder_id.to_string();
        record.last_accessed = monotonic_now(&record.last_accessed);
        self.dirty = true;
        self.flush()
    }

    /// Record the shell's active virtual environment.
    pub fn set_venv(&mut self, id: &str, active_env: Option<String>) -> GdsResult<()> {
        let record = self
            .data
            .shells
            .get_mut(id)
            .ok_or_else(|| GdsError::InvalidInput(format!("no shell matches: {id}")))?;
        record.venv_state.active_env = active_env;
        record.last_accessed = monotonic_now(&record.last_accessed);
        self.dirty = true;
        self.flush()
    }

    fn touch(&mut self, id: &str) {
        if let Some(record) = self.data.shells.get_mut(id) {
            record.last_accessed = monotonic_now(&record.last_accessed);
        }
    }

    /// Atomic write-then-rename of the whole file.
    pub fn flush(&mut self) -> GdsResult<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.data)
            .map_err(|e| GdsError::InvalidInput(format!("serializing shells: {e}")))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, &self.path)?;
        self.dirty = false;
        Ok(())
    }
}

impl Drop for ShellRegistry {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = self.flush() {
                tracing::warn!("failed to flush shell registry on drop: {e}");
            }
        }
    }
}

/// 16 hex chars derived from a timestamp and a random UUID.
fn generate_shell_id() -> String {
    let material = format!("{}_{}", Local::now().timestamp_millis(), uuid::Uuid::new_v4());
    blake3::hash(material.as_bytes()).to_hex()[..16].to_string()
}

fn now_string() -> String {
    Local::now().format(TIME_FORMAT).to_string()
}

/// Never let the access timestamp go backwards (clock adjustments happen).
fn monotonic_now(previous: &str) -> String {
    let now = now_string();
    if now.as_str() < previous {
        previous.to_string()
    } else {
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_makes_first_shell_active() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shells.json");
        let mut registry = ShellRegistry::open(&path).unwrap();

        let first = registry.create(None, "root-id").unwrap();
        let second = registry.create(Some("work"), "root-id").unwrap();

        assert_eq!(first.id.len(), 16);
        assert_eq!(first.current_path, "~");
        assert_eq!(first.current_folder_id, "root-id");
        assert!(first.name.starts_with("shell_"));
        assert_eq!(second.name, "work");
        assert_eq!(registry.active().unwrap().id, first.id);
        assert_eq!(registry.list().len(), 2);
    }

    #[test]
    fn checkout_switches_active() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shells.json");
        let mut registry = ShellRegistry::open(&path).unwrap();

        let a = registry.create(None, "root").unwrap();
        let b = registry.create(None, "root").unwrap();
        assert_eq!(registry.active().unwrap().id, a.id);

        registry.checkout(&b.id).unwrap();
        assert_eq!(registry.active().unwrap().id, b.id);

        // prefix checkout works when unambiguous
        let prefix = &a.id[..8];
        if !b.id.starts_with(prefix) {
            registry.checkout(prefix).unwrap();
            assert_eq!(registry.active().unwrap().id, a.id);
        }
    }

    #[test]
    fn terminate_active_leaves_none_active() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shells.json");
        let mut registry = ShellRegistry::open(&path).unwrap();

        let a = registry.create(None, "root").unwrap();
        registry.terminate(&a.id).unwrap();
        assert!(registry.active().is_none());
        assert!(registry.list().is_empty());
    }

    #[test]
    fn position_update_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shells.json");

        let id = {
            let mut registry = ShellRegistry::open(&path).unwrap();
            let shell = registry.create(None, "root").unwrap();
            registry
                .update_position(&shell.id, "~/tmp/test", "folder-7")
                .unwrap();
            shell.id
        };

        let registry = ShellRegistry::open(&path).unwrap();
        let record = registry.active().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.current_path, "~/tmp/test");
        assert_eq!(record.current_folder_id, "folder-7");
    }

    #[test]
    fn venv_state_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shells.json");
        let mut registry = ShellRegistry::open(&path).unwrap();

        let shell = registry.create(None, "root").unwrap();
        registry
            .set_venv(&shell.id, Some("mlenv".to_string()))
            .unwrap();

        let reopened = ShellRegistry::open(&path).unwrap();
        assert_eq!(
            reopened.active().unwrap().venv_state.active_env.as_deref(),
            Some("mlenv")
        );
    }

    #[test]
    fn unknown_and_ambiguous_lookups_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shells.json");
        let mut registry = ShellRegistry::open(&path).unwrap();
        registry.create(None, "root").unwrap();

        assert!(registry.checkout("zzzz-not-a-shell").is_err());
        // empty prefix matches everything only if more than one shell exists
        registry.create(None, "root").unwrap();
        assert!(registry.checkout("").is_err());
    }
}
