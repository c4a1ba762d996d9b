//! The local mirror the vendor agent keeps in sync with the cloud.
//!
//! Two reserved subtrees matter here: `LOCAL_EQUIVALENT` is where outbound
//! writes are staged, `DRIVE_EQUIVALENT` is where inbound propagation is
//! observed. Both directions are indirect and asynchronous; this crate only
//! stages, probes, and waits — it never talks to the provider's write API.

mod layout;
mod net;
mod stage;
mod waiter;

pub use layout::MirrorLayout;
pub use net::network_live;
pub use stage::{cleanup_staged, stage, StagedFile};
pub use waiter::{DirObserver, GatewayObserver, Observer, SyncReport, SyncWaiter};
