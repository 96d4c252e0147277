//! Console rendering of each pipeline stage.
use crate::newsblur::SnapshotSummary;
use crate::sources::SnapshotOrigin;
use crate::sync::{ImportOutcome, ImportStatus, ImportSummary, MatchSummary};
use std::io::{self, Write};

/// Sink for pipeline progress.
///
/// Outcomes are delivered in completion order; implementations must not
/// assume they line up with the desired list.
pub trait Reporter {
    fn snapshot(&mut self, summary: SnapshotSummary, origin: SnapshotOrigin) -> io::Result<()>;
    fn matched(&mut self, summary: MatchSummary, importable: &[String]) -> io::Result<()>;
    fn outcome(&mut self, outcome: &ImportOutcome) -> io::Result<()>;
    fn finished(&mut self, summary: &ImportSummary) -> io::Result<()>;
}

/// Human-readable report written to any `Write` (stdout in the binary).
pub struct ConsoleReporter<W> {
    out: W,
    /// List every importable URI after matching (dry runs).
    list_importable: bool,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout(list_importable: bool) -> Self {
        Self::new(io::stdout(), list_importable)
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, list_importable: bool) -> Self {
        Self {
            out,
            list_importable,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn snapshot(&mut self, summary: SnapshotSummary, origin: SnapshotOrigin) -> io::Result<()> {
        let source = match origin {
            SnapshotOrigin::Fresh => "fetched".to_string(),
            SnapshotOrigin::Cached { age } => format!("cached, {} min old", age.num_minutes()),
        };
        writeln!(
            self.out,
            "Subscriptions: {} feeds ({}, authenticated: {})",
            summary.feed_count, source, summary.authenticated
        )
    }

    fn matched(&mut self, summary: MatchSummary, importable: &[String]) -> io::Result<()> {
        writeln!(
            self.out,
            "Checked {} desired feeds: {} already subscribed, {} to import",
            summary.checked,
            summary.subscribed(),
            summary.importable
        )?;
        if self.list_importable {
            for uri in importable {
                writeln!(self.out, "  ? {}", uri)?;
            }
        }
        Ok(())
    }

    fn outcome(&mut self, outcome: &ImportOutcome) -> io::Result<()> {
        match &outcome.status {
            ImportStatus::Imported { .. } => writeln!(self.out, "  + {}", outcome.uri),
            ImportStatus::Rejected { message, body } => {
                let reason = message.clone().unwrap_or_else(|| body.to_string());
                writeln!(self.out, "  ! {}: {}", outcome.uri, reason)
            }
            ImportStatus::RequestFailed { error } => {
                writeln!(self.out, "  x {}: {}", outcome.uri, error)
            }
        }
    }

    fn finished(&mut self, summary: &ImportSummary) -> io::Result<()> {
        writeln!(
            self.out,
            "Import complete: {} attempted, {} imported, {} rejected, {} failed",
            summary.attempted, summary.imported, summary.rejected, summary.failed
        )?;
        self.out.flush()
    }
}
