//! Command orchestration over the lower layers.
//!
//! Everything user-visible funnels through here: the upload state machine,
//! verification, the edit pipeline, text IO, remote filesystem commands, and
//! venv management. The CLI stays thin; these functions return typed results
//! and take their collaborators explicitly.

mod context;
mod download;
mod edit;
mod folder;
mod python;
mod remote_fs;
mod textio;
mod upload;
mod venv;
mod verify;

pub use context::{GdsContext, MemorySink, NullSink, ProgressSink, StdoutSink};
pub use download::{download, fetch_file_content, DownloadOutcome};
pub use edit::{
    apply_replacements, edit, parse_replacement_spec, split_keepends, EditOptions, EditOutcome,
    LintReport, Linter, ReplaceOp,
};
pub use folder::{upload_folder, zip_folder};
pub use python::{pip, pip_show_deps, python_code, python_file};
pub use remote_fs::{find, mkdir, mv, rm, touch, FindArgs, FindType};
pub use textio::{cat, echo_to_file, grep, parse_read_ranges, read_file, GrepFileResult};
pub use upload::{upload, FolderUploadInfo, UploadOptions, UploadReport, LARGE_FILE_THRESHOLD};
pub use venv::{
    read_venv_states, venv_activate, venv_create, venv_current, venv_deactivate, venv_delete,
    venv_list,
};
pub use verify::{verify_upload, VerifyReport};
