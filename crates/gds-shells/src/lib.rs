//! Persistent shell sessions and the venv state document.
//!
//! Both are whole-file JSON with read-modify-write and atomic rename, under
//! the single-writer rule: concurrent processes are not supported.

mod registry;
mod venv_state;

pub use registry::{ShellRecord, ShellRegistry, VenvState};
pub use venv_state::{EnvironmentInfo, ShellActivation, VenvStates, VENV_STATES_FILENAME};
