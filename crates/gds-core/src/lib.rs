//! Shared foundation for the gds workspace: error taxonomy, configuration
//! schema, lexical virtual-path math, and the per-invocation debug buffer.

pub mod config;
pub mod debug;
pub mod error;
pub mod vpath;

pub use config::GdsConfig;
pub use debug::DebugBuffer;
pub use error::{ErrorKind, GdsError, GdsResult};
