use crate::newsblur::{AddUrlReply, ApiError};
use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;
use std::future::Future;

/// Default number of add-feed requests allowed in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Something that can subscribe the account to a feed.
///
/// Implemented by [`NewsBlurClient`](crate::newsblur::NewsBlurClient); tests
/// substitute in-memory fakes.
pub trait FeedAdder {
    fn add_feed(
        &self,
        feed_url: &str,
        folder: Option<&str>,
    ) -> impl Future<Output = Result<AddUrlReply, ApiError>>;
}

/// How one import attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportStatus {
    /// The service accepted the feed.
    Imported { body: Value },
    /// The service answered with its failure code (bad address, blocked feed, ...).
    Rejected { body: Value, message: Option<String> },
    /// The request never produced a usable reply.
    RequestFailed { error: String },
}

/// Result of importing a single URI. Created once, never updated.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    pub uri: String,
    pub status: ImportStatus,
}

impl ImportOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, ImportStatus::Imported { .. })
    }

    /// The service's reply, when one was received.
    pub fn response_body(&self) -> Option<&Value> {
        match &self.status {
            ImportStatus::Imported { body } | ImportStatus::Rejected { body, .. } => Some(body),
            ImportStatus::RequestFailed { .. } => None,
        }
    }
}

/// Tally of import outcomes by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub attempted: usize,
    pub imported: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl ImportSummary {
    pub fn record(&mut self, outcome: &ImportOutcome) {
        self.attempted += 1;
        match outcome.status {
            ImportStatus::Imported { .. } => self.imported += 1,
            ImportStatus::Rejected { .. } => self.rejected += 1,
            ImportStatus::RequestFailed { .. } => self.failed += 1,
        }
    }

    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a ImportOutcome>) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            summary.record(outcome);
        }
        summary
    }
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Maximum requests in flight. Zero is treated as one.
    pub concurrency_limit: usize,
    /// Folder new subscriptions are filed under; `None` leaves it to the service.
    pub target_folder: Option<String>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY,
            target_folder: None,
        }
    }
}

/// Submits add-feed requests with bounded concurrency.
///
/// Requests are admitted in submission order, at most `concurrency_limit` at
/// a time. Each URI is attempted exactly once and every failure is captured
/// in that URI's [`ImportOutcome`], so one bad feed never affects the others.
pub struct Importer<A> {
    adder: A,
    options: ImportOptions,
}

impl<A: FeedAdder> Importer<A> {
    pub fn new(adder: A, options: ImportOptions) -> Self {
        Self { adder, options }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Streams one outcome per URI as requests complete.
    ///
    /// Outcomes arrive in completion order, not submission order.
    pub fn import_stream(
        &self,
        importable: Vec<String>,
    ) -> impl Stream<Item = ImportOutcome> + '_ {
        let limit = self.options.concurrency_limit.max(1);
        stream::iter(importable)
            .map(move |uri| self.import_one(uri))
            .buffer_unordered(limit)
    }

    /// Imports every URI and waits for all of them.
    ///
    /// Returns exactly one outcome per input, in completion order. An empty
    /// input issues no requests.
    pub async fn import_all(&self, importable: Vec<String>) -> Vec<ImportOutcome> {
        if importable.is_empty() {
            return Vec::new();
        }
        self.import_stream(importable).collect().await
    }

    async fn import_one(&self, uri: String) -> ImportOutcome {
        let folder = self.options.target_folder.as_deref();
        tracing::debug!(url = %uri, folder = ?folder, "Submitting feed");

        let status = match self.adder.add_feed(&uri, folder).await {
            Ok(AddUrlReply::Accepted { body }) => ImportStatus::Imported { body },
            Ok(AddUrlReply::Rejected { body, message }) => {
                tracing::warn!(url = %uri, message = ?message, "Service rejected feed");
                ImportStatus::Rejected { body, message }
            }
            Err(e) => {
                tracing::warn!(url = %uri, error = %e, "Feed import request failed");
                ImportStatus::RequestFailed {
                    error: e.to_string(),
                }
            }
        };

        ImportOutcome { uri, status }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::time::Duration;

    /// Fake service: per-URL canned replies, a fixed latency, and in-flight tracking.
    #[derive(Default)]
    struct FakeAdder {
        replies: HashMap<String, Result<Value, u16>>,
        latency: HashMap<String, Duration>,
        in_flight: Cell<usize>,
        max_in_flight: Cell<usize>,
        calls: RefCell<Vec<(String, Option<String>)>>,
    }

    impl FakeAdder {
        fn reply(mut self, url: &str, body: Value) -> Self {
            self.replies.insert(url.to_string(), Ok(body));
            self
        }

        fn fail(mut self, url: &str, status: u16) -> Self {
            self.replies.insert(url.to_string(), Err(status));
            self
        }

        fn delay(mut self, url: &str, latency: Duration) -> Self {
            self.latency.insert(url.to_string(), latency);
            self
        }
    }

    impl FeedAdder for FakeAdder {
        async fn add_feed(
            &self,
            feed_url: &str,
            folder: Option<&str>,
        ) -> Result<AddUrlReply, ApiError> {
            self.calls
                .borrow_mut()
                .push((feed_url.to_string(), folder.map(str::to_string)));
            self.in_flight.set(self.in_flight.get() + 1);
            self.max_in_flight
                .set(self.max_in_flight.get().max(self.in_flight.get()));

            let latency = self
                .latency
                .get(feed_url)
                .copied()
                .unwrap_or(Duration::from_millis(100));
            tokio::time::sleep(latency).await;

            self.in_flight.set(self.in_flight.get() - 1);
            match self.replies.get(feed_url) {
                Some(Ok(body)) => Ok(AddUrlReply::from_body(body.clone())),
                Some(Err(status)) => Err(ApiError::HttpStatus(*status)),
                None => Ok(AddUrlReply::from_body(json!({"feeds": {}}))),
            }
        }
    }

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("http://feed{i}.com/rss")).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_concurrency_limit() {
        let importer = Importer::new(FakeAdder::default(), ImportOptions::default());

        let outcomes = importer.import_all(urls(10)).await;

        assert_eq!(outcomes.len(), 10);
        assert_eq!(importer.adder.max_in_flight.get(), DEFAULT_CONCURRENCY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_of_one_is_sequential() {
        let options = ImportOptions {
            concurrency_limit: 1,
            target_folder: None,
        };
        let importer = Importer::new(FakeAdder::default(), options);

        let start = tokio::time::Instant::now();
        let outcomes = importer.import_all(urls(4)).await;

        assert_eq!(outcomes.len(), 4);
        assert_eq!(importer.adder.max_in_flight.get(), 1);
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_limit_treated_as_one() {
        let options = ImportOptions {
            concurrency_limit: 0,
            target_folder: None,
        };
        let importer = Importer::new(FakeAdder::default(), options);

        assert_eq!(importer.import_all(urls(3)).await.len(), 3);
        assert_eq!(importer.adder.max_in_flight.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_admission_is_fifo() {
        let importer = Importer::new(FakeAdder::default(), ImportOptions::default());
        let input = urls(7);

        importer.import_all(input.clone()).await;

        let submitted: Vec<String> = importer
            .adder
            .calls
            .borrow()
            .iter()
            .map(|(url, _)| url.clone())
            .collect();
        assert_eq!(submitted, input);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outcomes_arrive_in_completion_order() {
        let adder = FakeAdder::default()
            .delay("http://slow.com/rss", Duration::from_secs(5))
            .delay("http://fast.com/rss", Duration::from_millis(10));
        let importer = Importer::new(adder, ImportOptions::default());

        let outcomes = importer
            .import_all(vec![
                "http://slow.com/rss".to_string(),
                "http://fast.com/rss".to_string(),
            ])
            .await;

        assert_eq!(outcomes[0].uri, "http://fast.com/rss");
        assert_eq!(outcomes[1].uri, "http://slow.com/rss");
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_keeps_one_outcome_per_uri() {
        let adder = FakeAdder::default()
            .reply(
                "http://blocked.com/rss",
                json!({"code": -1, "message": "not an RSS feed"}),
            )
            .fail("http://down.com/rss", 503)
            .reply("http://good.com/rss", json!({"feeds": {"5": {}}}));
        let importer = Importer::new(adder, ImportOptions::default());

        let mut outcomes = importer
            .import_all(vec![
                "http://blocked.com/rss".to_string(),
                "http://down.com/rss".to_string(),
                "http://good.com/rss".to_string(),
            ])
            .await;
        outcomes.sort_by(|a, b| a.uri.cmp(&b.uri));

        assert_eq!(outcomes.len(), 3);

        assert_eq!(outcomes[0].uri, "http://blocked.com/rss");
        assert!(!outcomes[0].succeeded());
        assert_eq!(
            outcomes[0].response_body(),
            Some(&json!({"code": -1, "message": "not an RSS feed"}))
        );

        assert_eq!(outcomes[1].uri, "http://down.com/rss");
        assert!(!outcomes[1].succeeded());
        assert!(outcomes[1].response_body().is_none());
        assert!(matches!(
            &outcomes[1].status,
            ImportStatus::RequestFailed { error } if error.contains("503")
        ));

        assert_eq!(outcomes[2].uri, "http://good.com/rss");
        assert!(outcomes[2].succeeded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_folder_forwarded() {
        let options = ImportOptions {
            concurrency_limit: 2,
            target_folder: Some("Imported".to_string()),
        };
        let importer = Importer::new(FakeAdder::default(), options);

        importer.import_all(urls(2)).await;

        assert!(importer
            .adder
            .calls
            .borrow()
            .iter()
            .all(|(_, folder)| folder.as_deref() == Some("Imported")));
    }

    #[test]
    fn test_summary_counts_each_kind() {
        let outcomes = vec![
            ImportOutcome {
                uri: "http://a.com/rss".into(),
                status: ImportStatus::Imported { body: json!({}) },
            },
            ImportOutcome {
                uri: "http://b.com/rss".into(),
                status: ImportStatus::Rejected {
                    body: json!({"code": -1}),
                    message: None,
                },
            },
            ImportOutcome {
                uri: "http://c.com/rss".into(),
                status: ImportStatus::RequestFailed {
                    error: "timed out".into(),
                },
            },
            ImportOutcome {
                uri: "http://d.com/rss".into(),
                status: ImportStatus::Imported { body: json!({}) },
            },
        ];

        assert_eq!(
            ImportSummary::from_outcomes(&outcomes),
            ImportSummary {
                attempted: 4,
                imported: 2,
                rejected: 1,
                failed: 1
            }
        );
    }

    #[tokio::test]
    async fn test_empty_input_issues_no_calls() {
        let importer = Importer::new(FakeAdder::default(), ImportOptions::default());

        let outcomes = importer.import_all(Vec::new()).await;

        assert!(outcomes.is_empty());
        assert!(importer.adder.calls.borrow().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_yields_each_outcome() {
        let importer = Importer::new(FakeAdder::default(), ImportOptions::default());

        let stream = importer.import_stream(urls(5));
        let mut stream = std::pin::pin!(stream);
        let mut seen = 0;
        while let Some(outcome) = stream.next().await {
            assert!(outcome.succeeded());
            seen += 1;
        }
        assert_eq!(seen, 5);
    }
}
