//! Fire-and-forget persistence.
//!
//! The store never awaits a write. It queues [`SyncJob`]s on an unbounded
//! channel and this worker drains them in order, logging and swallowing
//! every failure. The in-memory state stays authoritative for the session.

use tokio::sync::mpsc;

use super::remote::{RemoteChange, RemoteInteractions};
use crate::storage::Database;

#[derive(Debug, Clone, PartialEq)]
pub enum SyncJob {
    /// Replace the value under `key` in the local key-value store.
    Snapshot { key: String, payload: String },
    /// Mirror one change to the remote interaction table.
    Remote(RemoteChange),
}

pub type SyncSender = mpsc::UnboundedSender<SyncJob>;
pub type SyncReceiver = mpsc::UnboundedReceiver<SyncJob>;

pub fn sync_channel() -> (SyncSender, SyncReceiver) {
    mpsc::unbounded_channel()
}

/// What the worker did before its channel closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub snapshots_written: usize,
    pub remote_applied: usize,
    pub remote_skipped: usize,
    pub failures: usize,
}

/// Drain `rx` until every sender is dropped.
///
/// Remote changes are skipped (not failed) when there is no remote client,
/// i.e. the user is signed out or Supabase is not configured.
pub async fn run_sync_worker(
    db: Database,
    remote: Option<RemoteInteractions>,
    mut rx: SyncReceiver,
) -> SyncStats {
    let mut stats = SyncStats::default();

    while let Some(job) = rx.recv().await {
        match job {
            SyncJob::Snapshot { key, payload } => match db.set_value(&key, &payload).await {
                Ok(()) => stats.snapshots_written += 1,
                Err(e) => {
                    stats.failures += 1;
                    tracing::warn!(error = %e, key = %key, "Failed to persist snapshot");
                }
            },
            SyncJob::Remote(change) => {
                let Some(remote) = remote.as_ref() else {
                    stats.remote_skipped += 1;
                    continue;
                };
                match remote.apply(&change).await {
                    Ok(()) => stats.remote_applied += 1,
                    Err(e) => {
                        stats.failures += 1;
                        tracing::warn!(
                            error = %e,
                            article_id = %change.article_id,
                            op = ?change.op,
                            "Failed to mirror interaction remotely"
                        );
                    }
                }
            }
        }
    }

    tracing::debug!(
        snapshots = stats.snapshots_written,
        remote = stats.remote_applied,
        failures = stats.failures,
        "Sync worker drained"
    );
    stats
}
