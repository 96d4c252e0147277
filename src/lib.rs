//! Reconcile a NewsBlur subscription list against a locally declared list of
//! feed URIs and import the ones the account does not have yet.
//!
//! The pipeline runs in four stages:
//!
//! 1. [`sources`] loads the server-side [`FeedSnapshot`](newsblur::FeedSnapshot)
//!    (fresh or cached) and the desired URI list, concurrently
//! 2. [`sync::match_feeds`] pairs every desired URI with an existing feed id, if any
//! 3. [`sync::Importer`] submits the unmatched URIs with bounded concurrency
//! 4. a [`report::Reporter`] renders counts and per-feed outcomes

pub mod config;
pub mod newsblur;
pub mod report;
pub mod sources;
pub mod sync;
pub mod util;
