use crate::newsblur::{ApiError, FeedSnapshot, NewsBlurClient};
use crate::util::atomic_write;
use chrono::{DateTime, TimeDelta, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to fetch subscriptions")]
    Fetch(#[from] ApiError),
    #[error("No cached snapshot at {0}")]
    CacheMissing(PathBuf),
    #[error("Failed to read cached snapshot")]
    CacheRead(#[from] std::io::Error),
    #[error("Cached snapshot is not valid JSON")]
    CacheParse(#[from] serde_json::Error),
    /// The service answered, but not for a logged-in session.
    #[error("Session is not authenticated (expired or wrong session token?)")]
    NotAuthenticated,
}

/// Where a snapshot is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotMode {
    /// Use a fresh enough cache, otherwise fetch.
    #[default]
    Auto,
    /// Always fetch and rewrite the cache.
    Refresh,
    /// Never touch the network.
    CacheOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOrigin {
    Fresh,
    Cached { age: TimeDelta },
}

#[derive(Debug, Clone)]
pub struct LoadedSnapshot {
    pub snapshot: FeedSnapshot,
    pub origin: SnapshotOrigin,
}

/// Supplies the server-side subscription map, from the API or the local cache.
///
/// Every fresh fetch overwrites the cache file with the raw response body,
/// so the cache always holds exactly what the service returned.
pub struct SnapshotSource {
    client: NewsBlurClient,
    cache_path: PathBuf,
    max_age: TimeDelta,
}

impl SnapshotSource {
    pub fn new(client: NewsBlurClient, cache_path: impl Into<PathBuf>, max_age: TimeDelta) -> Self {
        Self {
            client,
            cache_path: cache_path.into(),
            max_age,
        }
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub async fn load(&self, mode: SnapshotMode) -> Result<LoadedSnapshot, SnapshotError> {
        let loaded = match mode {
            SnapshotMode::Refresh => self.fetch().await?,
            SnapshotMode::CacheOnly => self.read_cache().await?,
            SnapshotMode::Auto => match cache_age(&self.cache_path).await {
                Some(age) if age <= self.max_age => self.read_cache().await?,
                Some(age) => {
                    tracing::info!(age_minutes = age.num_minutes(), "Cached snapshot is stale");
                    self.fetch().await?
                }
                None => self.fetch().await?,
            },
        };

        if !loaded.snapshot.authenticated {
            return Err(SnapshotError::NotAuthenticated);
        }

        tracing::info!(
            feeds = loaded.snapshot.feeds.len(),
            origin = ?loaded.origin,
            "Loaded subscription snapshot"
        );
        Ok(loaded)
    }

    async fn fetch(&self) -> Result<LoadedSnapshot, SnapshotError> {
        let response = self.client.fetch_feeds().await?;
        // An anonymous body must never replace a good cache
        if !response.snapshot.authenticated {
            return Err(SnapshotError::NotAuthenticated);
        }

        // A cache write failure costs the next run a fetch, nothing more
        let path = self.cache_path.clone();
        let body = response.body;
        match tokio::task::spawn_blocking(move || atomic_write(&path, &body)).await {
            Ok(Ok(())) => {
                tracing::debug!(path = %self.cache_path.display(), "Snapshot cached");
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    path = %self.cache_path.display(),
                    error = %e,
                    "Failed to cache snapshot"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "Snapshot cache task failed");
            }
        }

        Ok(LoadedSnapshot {
            snapshot: response.snapshot,
            origin: SnapshotOrigin::Fresh,
        })
    }

    async fn read_cache(&self) -> Result<LoadedSnapshot, SnapshotError> {
        let age = cache_age(&self.cache_path)
            .await
            .ok_or_else(|| SnapshotError::CacheMissing(self.cache_path.clone()))?;
        let bytes = tokio::fs::read(&self.cache_path).await?;
        let snapshot = FeedSnapshot::from_slice(&bytes)?;

        Ok(LoadedSnapshot {
            snapshot,
            origin: SnapshotOrigin::Cached { age },
        })
    }
}

/// Age of the file at `path`, or `None` if it does not exist.
///
/// Modification times in the future count as age zero.
async fn cache_age(path: &Path) -> Option<TimeDelta> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    if !metadata.is_file() {
        return None;
    }
    let modified: DateTime<Utc> = metadata.modified().ok()?.into();
    Some(Utc::now().signed_duration_since(modified).max(TimeDelta::zero()))
}
