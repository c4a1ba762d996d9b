//! Virtual path resolution and directory listings.
//!
//! The resolver is the only place a virtual path becomes a folder ID, a local
//! mirror path, or a remote filesystem path; all three projections share one
//! canonicalisation step. The listing engine builds the de-duplicated view on
//! top of the gateway.

mod listing;
mod resolver;

pub use listing::{
    Entry, Listing, ListingEngine, ListingMode, NestedFolder, NestedListing, PlacedEntry,
    RecursiveListing,
};
pub use resolver::{PathResolver, Resolved, ShellPos};
