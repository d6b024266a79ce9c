use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::client::{AuthClient, AuthError, Session, UserIdentity};
use crate::storage::{Database, SESSION_KEY};

/// On-disk shape of a [`Session`]. The database file is 0600.
#[derive(Serialize, Deserialize)]
struct StoredSession {
    user: UserIdentity,
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

impl From<&Session> for StoredSession {
    fn from(session: &Session) -> Self {
        Self {
            user: session.user.clone(),
            access_token: session.access_token.expose_secret().to_string(),
            refresh_token: session
                .refresh_token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
            expires_at: session.expires_at,
        }
    }
}

impl From<StoredSession> for Session {
    fn from(stored: StoredSession) -> Self {
        Self {
            user: stored.user,
            access_token: SecretString::from(stored.access_token),
            refresh_token: stored.refresh_token.map(SecretString::from),
            expires_at: stored.expires_at,
        }
    }
}

pub async fn save_session(db: &Database, session: &Session) -> anyhow::Result<()> {
    let payload = serde_json::to_string(&StoredSession::from(session))?;
    db.set_value(SESSION_KEY, &payload).await
}

/// The stored session, if any. A corrupt entry is logged and ignored.
pub async fn load_session(db: &Database) -> Option<Session> {
    let raw = match db.get_value(SESSION_KEY).await {
        Ok(raw) => raw?,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read stored session");
            return None;
        }
    };
    match serde_json::from_str::<StoredSession>(&raw) {
        Ok(stored) => Some(stored.into()),
        Err(e) => {
            tracing::warn!(error = %e, "Stored session is corrupt, ignoring");
            None
        }
    }
}

pub async fn clear_session(db: &Database) -> anyhow::Result<()> {
    db.delete_value(SESSION_KEY).await.map(drop)
}

/// Load the stored session and make sure it is usable at `now`.
///
/// An expired session is refreshed when a client and refresh token are
/// available. It is discarded when it can never be refreshed or when the
/// server rejects the refresh token. Any other refresh failure keeps the
/// stored session: it comes back still expired, so the user's local state
/// loads and [`SharedSession`] retries the refresh before the next remote
/// call.
pub async fn restore_session(
    db: &Database,
    client: Option<&AuthClient>,
    now: DateTime<Utc>,
) -> Option<Session> {
    let session = load_session(db).await?;
    if !session.is_expired(now) {
        return Some(session);
    }

    let (Some(client), Some(token)) = (client, &session.refresh_token) else {
        discard(db, "Stored session expired and cannot be refreshed").await;
        return None;
    };

    match client.refresh(token).await {
        Ok(fresh) => {
            if let Err(e) = save_session(db, &fresh).await {
                tracing::warn!(error = %e, "Failed to persist refreshed session");
            }
            tracing::info!(user_id = %fresh.user.id, "Session refreshed");
            Some(fresh)
        }
        Err(AuthError::InvalidCredentials) => {
            discard(db, "Refresh token rejected, signing out").await;
            None
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                user_id = %session.user.id,
                "Session refresh failed, keeping stored session offline"
            );
            Some(session)
        }
    }
}

async fn discard(db: &Database, reason: &str) {
    tracing::info!("{reason}");
    if let Err(e) = clear_session(db).await {
        tracing::warn!(error = %e, "Failed to clear stored session");
    }
}

// ============================================================================
// Shared session
// ============================================================================

/// A session shared by every task that talks to Supabase on the user's
/// behalf.
///
/// The user never changes for the lifetime of the handle, only the tokens
/// do. Callers ask for a token with [`SharedSession::access_token`], which
/// refreshes an expired session first, and report a rejected token with
/// [`SharedSession::refresh_rejected`]. Refreshed sessions are written back
/// to the database.
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<SharedInner>,
}

struct SharedInner {
    user: UserIdentity,
    session: RwLock<Session>,
    refresher: Option<(AuthClient, Database)>,
}

impl std::fmt::Debug for SharedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSession")
            .field("user_id", &self.inner.user.id)
            .field("refreshable", &self.inner.refresher.is_some())
            .finish_non_exhaustive()
    }
}

impl SharedSession {
    /// A session whose tokens are used as they are.
    pub fn new(session: Session) -> Self {
        Self::build(session, None)
    }

    /// A session that refreshes through `client` and persists into `db`.
    pub fn with_refresh(session: Session, client: AuthClient, db: Database) -> Self {
        Self::build(session, Some((client, db)))
    }

    fn build(session: Session, refresher: Option<(AuthClient, Database)>) -> Self {
        Self {
            inner: Arc::new(SharedInner {
                user: session.user.clone(),
                session: RwLock::new(session),
                refresher,
            }),
        }
    }

    pub fn user(&self) -> &UserIdentity {
        &self.inner.user
    }

    /// A copy of the current session, refreshed first if it expired.
    pub async fn fresh(&self, now: DateTime<Utc>) -> Result<Session, AuthError> {
        let current = self.inner.session.read().await.clone();
        if !current.is_expired(now) {
            return Ok(current);
        }
        self.refresh_rejected(&current.access_token).await
    }

    pub async fn access_token(&self, now: DateTime<Utc>) -> Result<SecretString, AuthError> {
        Ok(self.fresh(now).await?.access_token)
    }

    /// Replace `rejected` with a new token.
    ///
    /// Concurrent callers holding the same stale token share one refresh:
    /// whoever arrives after it completed gets the new session directly.
    pub async fn refresh_rejected(&self, rejected: &SecretString) -> Result<Session, AuthError> {
        let mut session = self.inner.session.write().await;
        if session.access_token.expose_secret() != rejected.expose_secret() {
            return Ok(session.clone());
        }

        let Some((client, db)) = &self.inner.refresher else {
            return Err(AuthError::NotRefreshable);
        };
        let Some(refresh_token) = session.refresh_token.clone() else {
            return Err(AuthError::NotRefreshable);
        };

        match client.refresh(&refresh_token).await {
            Ok(fresh) => {
                if let Err(e) = save_session(db, &fresh).await {
                    tracing::warn!(error = %e, "Failed to persist refreshed session");
                }
                tracing::info!(user_id = %fresh.user.id, "Session refreshed");
                *session = fresh.clone();
                Ok(fresh)
            }
            Err(AuthError::InvalidCredentials) => {
                discard(db, "Refresh token rejected, sign in again to sync").await;
                Err(AuthError::InvalidCredentials)
            }
            Err(e) => Err(e),
        }
    }
}
