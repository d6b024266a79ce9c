use std::sync::Arc;

use chrono::NaiveDate;

use super::remote::{InteractionRow, RemoteChange, RemoteOp};
use super::state::{InteractionFacts, InteractionState};
use super::sync::{SyncJob, SyncSender};
use crate::storage::{interactions_key, user_key, Database};

/// Owner of the read/bookmark facts for the current user.
///
/// Queries are answered from memory. Every mutation updates memory first,
/// then queues a snapshot (and, when signed in, a remote change) for the
/// sync worker. Nothing here awaits I/O except [`InteractionStore::load`].
#[derive(Debug)]
pub struct InteractionStore {
    state: InteractionState,
    user_id: Option<Arc<str>>,
    storage_key: String,
    sync_tx: SyncSender,
}

impl InteractionStore {
    pub fn new(state: InteractionState, user_id: Option<Arc<str>>, sync_tx: SyncSender) -> Self {
        let storage_key = interactions_key(&user_key(user_id.as_deref()));
        Self {
            state,
            user_id,
            storage_key,
            sync_tx,
        }
    }

    /// Load the saved snapshot for `user_id`. A missing, unreadable or corrupt
    /// snapshot yields empty state so startup never blocks on it.
    pub async fn load(db: &Database, user_id: Option<Arc<str>>, sync_tx: SyncSender) -> Self {
        let key = interactions_key(&user_key(user_id.as_deref()));
        let state = match db.get_value(&key).await {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!(error = %e, key = %key, "Corrupt interaction snapshot, starting empty");
                InteractionState::default()
            }),
            Ok(None) => InteractionState::default(),
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Failed to read interaction snapshot, starting empty");
                InteractionState::default()
            }
        };
        Self::new(state, user_id, sync_tx)
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn user_id(&self) -> Option<&Arc<str>> {
        self.user_id.as_ref()
    }

    pub fn query(&self, article_id: &str) -> InteractionFacts {
        self.state.query(article_id)
    }

    /// Returns true if this call changed the article from unread to read.
    pub fn mark_read(&mut self, article_id: &Arc<str>, today: NaiveDate) -> bool {
        if !self.state.mark_read(article_id, today) {
            return false;
        }
        tracing::debug!(article_id = %article_id, "Marked article read");
        self.persist();
        self.mirror(article_id, RemoteOp::UpsertRead);
        true
    }

    /// Returns the new bookmark value.
    pub fn toggle_bookmark(&mut self, article_id: &Arc<str>) -> bool {
        let bookmarked = self.state.toggle_bookmark(article_id);
        self.persist();
        self.mirror(
            article_id,
            if bookmarked {
                RemoteOp::InsertBookmark
            } else {
                RemoteOp::DeleteBookmark
            },
        );
        bookmarked
    }

    /// Shares only exist remotely; there is no local fact to change.
    pub fn record_share(&mut self, article_id: &Arc<str>) {
        self.mirror(article_id, RemoteOp::InsertShare);
    }

    /// Fold in rows fetched from the remote table. Returns how many facts
    /// changed; a snapshot is queued only if something did.
    pub fn merge_remote(&mut self, rows: &[InteractionRow]) -> usize {
        let changed = self
            .state
            .merge_remote(rows.iter().map(|r| (r.article_id.as_str(), r.action)));
        if changed > 0 {
            tracing::info!(changed = changed, "Merged remote interactions");
            self.persist();
        }
        changed
    }

    fn persist(&self) {
        let payload = match serde_json::to_string(&self.state) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialise interaction state");
                return;
            }
        };
        self.enqueue(SyncJob::Snapshot {
            key: self.storage_key.clone(),
            payload,
        });
    }

    fn mirror(&self, article_id: &Arc<str>, op: RemoteOp) {
        let Some(user_id) = &self.user_id else {
            return;
        };
        self.enqueue(SyncJob::Remote(RemoteChange {
            user_id: Arc::clone(user_id),
            article_id: Arc::clone(article_id),
            op,
        }));
    }

    fn enqueue(&self, job: SyncJob) {
        if self.sync_tx.send(job).is_err() {
            tracing::warn!("Sync worker has stopped, change kept in memory only");
        }
    }
}
