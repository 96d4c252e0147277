//! Inputs to reconciliation.
//!
//! - [`SnapshotSource`] - the account's current subscriptions, fetched or cached
//! - [`load_desired`] - the feed URIs the account should have (OPML, JSON or plain text)

mod desired;
mod snapshot;

pub use desired::{load_desired, parse_desired, DesiredFormat, DesiredListError};
pub use snapshot::{LoadedSnapshot, SnapshotError, SnapshotMode, SnapshotOrigin, SnapshotSource};
