use crate::newsblur::{FeedId, FeedSnapshot};
use std::collections::HashMap;

/// A desired URI paired with the id of the subscription that already covers it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub uri: String,
    /// `None` when no subscription has exactly this feed address.
    pub feed_id: Option<FeedId>,
}

impl MatchResult {
    pub fn is_importable(&self) -> bool {
        self.feed_id.is_none()
    }
}

/// Counts handed to the reporter after matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchSummary {
    pub checked: usize,
    pub importable: usize,
}

impl MatchSummary {
    pub fn from_results(results: &[MatchResult]) -> Self {
        Self {
            checked: results.len(),
            importable: results.iter().filter(|r| r.is_importable()).count(),
        }
    }

    pub fn subscribed(&self) -> usize {
        self.checked - self.importable
    }
}

/// Pairs every desired URI with the subscription whose `feed_address` equals it.
///
/// Comparison is exact byte equality. `http://a.com/rss` and `http://a.com/rss/`
/// are different feeds here, so a near-miss ends up importable and the
/// service gets to decide. Returns one result per input, in input order;
/// duplicates in `desired` yield duplicate results.
pub fn match_feeds(snapshot: &FeedSnapshot, desired: &[String]) -> Vec<MatchResult> {
    // First record wins when the service reports the same address twice
    let mut by_address: HashMap<&str, &FeedId> = HashMap::with_capacity(snapshot.feeds.len());
    for (id, record) in &snapshot.feeds {
        by_address.entry(record.feed_address.as_str()).or_insert(id);
    }

    desired
        .iter()
        .map(|uri| MatchResult {
            uri: uri.clone(),
            feed_id: by_address.get(uri.as_str()).map(|id| (*id).clone()),
        })
        .collect()
}

/// The URIs of unmatched results, in their original relative order.
pub fn importable(results: &[MatchResult]) -> Vec<String> {
    results
        .iter()
        .filter(|r| r.is_importable())
        .map(|r| r.uri.clone())
        .collect()
}
