//! NewsBlur API surface: the two endpoints reconciliation needs.
//!
//! - [`NewsBlurClient::fetch_feeds`] - `GET /reader/feeds`, the subscription snapshot
//! - [`NewsBlurClient::add_url`] - `POST /reader/add_url`, subscribe to one feed
//!
//! Both authenticate with the `newsblur_sessionid` cookie. The add call signals
//! failure with `code: -1` in the body; [`AddUrlReply`] turns that into a variant.

mod client;
mod types;

pub use client::{ApiError, FeedsResponse, NewsBlurClient, SESSION_COOKIE};
pub use types::{AddUrlReply, FeedId, FeedRecord, FeedSnapshot, SnapshotSummary, REJECTED_CODE};
