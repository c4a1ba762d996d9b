//! Cloud provider gateway.
//!
//! The only layer that talks to the provider's object API. Everything above
//! works in terms of [`DriveGateway`], so tests and dry runs can swap in the
//! in-process [`MemoryDrive`] backend.

pub mod memory;
mod model;

pub use memory::MemoryDrive;
pub use model::{folder_url, web_url, DriveFile, FileKind, MIME_FOLDER};

use async_trait::async_trait;
use gds_core::GdsResult;

/// Operations the orchestrator needs from the provider. No exceptions cross
/// this boundary: every call returns a result with a provider-kind error.
#[async_trait]
pub trait DriveGateway: Send + Sync {
    /// Immediate children of a folder. `max` of `None` means unbounded.
    async fn list_children(&self, folder_id: &str, max: Option<usize>)
        -> GdsResult<Vec<DriveFile>>;

    /// Raw media content of a regular file.
    async fn get_media(&self, file_id: &str) -> GdsResult<Vec<u8>>;

    /// Delete a node by ID.
    async fn delete(&self, file_id: &str) -> GdsResult<()>;

    /// Metadata for a single node.
    async fn get(&self, file_id: &str) -> GdsResult<DriveFile>;

    /// Parent folder IDs of a node, provider order.
    async fn parents(&self, file_id: &str) -> GdsResult<Vec<String>>;
}
