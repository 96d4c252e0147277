//! Reconciliation: match desired feeds against the account and import the rest.
//!
//! - [`matcher`] - exact-address matching of desired URIs against a snapshot
//! - [`importer`] - bounded-concurrency add-feed submission with per-feed outcomes
//!
//! [`run`] wires both to the sources and a [`Reporter`].

mod importer;
mod matcher;

pub use importer::{
    FeedAdder, ImportOptions, ImportOutcome, ImportStatus, ImportSummary, Importer,
    DEFAULT_CONCURRENCY,
};
pub use matcher::{importable, match_feeds, MatchResult, MatchSummary};

use crate::newsblur::SnapshotSummary;
use crate::report::Reporter;
use crate::sources::{load_desired, DesiredListError, SnapshotError, SnapshotMode, SnapshotSource};
use futures::StreamExt;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that end a run. Per-feed import failures never show up here.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Subscription snapshot unavailable")]
    SnapshotUnavailable(#[source] SnapshotError),
    #[error("Desired feed list unavailable")]
    DesiredListUnavailable(#[source] DesiredListError),
    #[error("Failed to write report")]
    Report(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub desired_path: PathBuf,
    pub snapshot_mode: SnapshotMode,
    /// Stop after matching; no add-feed requests are made.
    pub dry_run: bool,
}

/// What a run did, for callers that want more than the console report.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub snapshot: SnapshotSummary,
    pub matches: Vec<MatchResult>,
    pub matched: MatchSummary,
    pub imports: ImportSummary,
    /// Completion order.
    pub outcomes: Vec<ImportOutcome>,
}

/// Runs one reconciliation pass.
///
/// The snapshot and the desired list load concurrently; either failing aborts
/// the run before any import is attempted.
pub async fn run<A, R>(
    snapshots: &SnapshotSource,
    importer: &Importer<A>,
    reporter: &mut R,
    options: &RunOptions,
) -> Result<RunReport, SyncError>
where
    A: FeedAdder,
    R: Reporter,
{
    let (loaded, desired) = tokio::try_join!(
        async {
            snapshots
                .load(options.snapshot_mode)
                .await
                .map_err(SyncError::SnapshotUnavailable)
        },
        async {
            load_desired(&options.desired_path)
                .await
                .map_err(SyncError::DesiredListUnavailable)
        },
    )?;

    let snapshot = loaded.snapshot.summary();
    reporter.snapshot(snapshot, loaded.origin)?;

    let matches = match_feeds(&loaded.snapshot, &desired);
    let matched = MatchSummary::from_results(&matches);
    let pending = importable(&matches);
    tracing::info!(
        checked = matched.checked,
        importable = matched.importable,
        "Matched desired feeds"
    );
    reporter.matched(matched, &pending)?;

    let mut imports = ImportSummary::default();
    let mut outcomes = Vec::with_capacity(pending.len());

    if options.dry_run {
        tracing::info!(skipped = pending.len(), "Dry run, not importing");
    } else if !pending.is_empty() {
        let stream = importer.import_stream(pending);
        let mut stream = std::pin::pin!(stream);
        while let Some(outcome) = stream.next().await {
            imports.record(&outcome);
            reporter.outcome(&outcome)?;
            outcomes.push(outcome);
        }
        reporter.finished(&imports)?;
        tracing::info!(
            imported = imports.imported,
            rejected = imports.rejected,
            failed = imports.failed,
            "Import finished"
        );
    }

    Ok(RunReport {
        snapshot,
        matches,
        matched,
        imports,
        outcomes,
    })
}
