//! Remote command execution.
//!
//! The orchestrator never runs anything on the remote host itself. It wraps
//! the user's command in a result-capturing bash envelope, shows it to the
//! user through a [`CommandPresenter`], and then waits for the sentinel JSON
//! the script writes under `REMOTE_ROOT/tmp` to propagate back through the
//! cloud listing.

mod envelope;
mod executor;
mod presenter;
mod result;
pub mod script;
mod syntax;

pub use envelope::CommandEnvelope;
pub use executor::RemoteExecutor;
pub use presenter::{CommandKind, CommandPresenter, PresenterOutcome, ScriptedPresenter, TtyPresenter};
pub use result::{parse_direct_feedback, parse_sentinel, preprocess_json_content, SentinelResult};
pub use syntax::validate_bash_syntax;
