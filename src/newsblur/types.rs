use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Application-level failure code NewsBlur embeds in an otherwise HTTP 200 body.
pub const REJECTED_CODE: i64 = -1;

/// Opaque feed identifier.
///
/// NewsBlur keys its feed map by string but encodes the `id` member of each
/// record as an integer. Both forms deserialize into the same textual id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FeedId(String);

impl FeedId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeedId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for FeedId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(n) => FeedId(n.to_string()),
            RawId::Text(s) => FeedId(s),
        })
    }
}

/// One subscription known to the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeedRecord {
    #[serde(default)]
    pub id: Option<FeedId>,
    /// Address of the RSS/Atom document. The only field used for matching.
    #[serde(default)]
    pub feed_address: String,
    #[serde(default)]
    pub feed_title: Option<String>,
}

/// The `/reader/feeds` payload, reduced to what reconciliation needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeedSnapshot {
    #[serde(default)]
    pub authenticated: bool,
    /// Feeds keyed by id. A missing or `null` member is read as an empty map.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub feeds: BTreeMap<FeedId, FeedRecord>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeMap<FeedId, FeedRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

/// Headline numbers for a snapshot, as reported after a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub authenticated: bool,
    pub feed_count: usize,
}

impl FeedSnapshot {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            authenticated: self.authenticated,
            feed_count: self.feeds.len(),
        }
    }
}

/// Parsed reply to an `/reader/add_url` call.
///
/// The service reports failure through `code: -1` in the body rather than
/// through the HTTP status, so a 200 response can still be a rejection.
#[derive(Debug, Clone, PartialEq)]
pub enum AddUrlReply {
    Accepted { body: Value },
    Rejected { body: Value, message: Option<String> },
}

impl AddUrlReply {
    pub fn from_body(body: Value) -> Self {
        // A float `-1.0` is the same number on the wire
        let code = body.get("code").and_then(Value::as_f64);
        if code == Some(REJECTED_CODE as f64) {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string);
            AddUrlReply::Rejected { body, message }
        } else {
            AddUrlReply::Accepted { body }
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, AddUrlReply::Accepted { .. })
    }
}
