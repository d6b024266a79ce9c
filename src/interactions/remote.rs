//! Mirror of interaction facts in the Supabase `user_interactions` table.
//!
//! Rows are `(user_id, article_id, action, created_at)`. Reads are upserted
//! (monotonic), bookmarks are inserted and deleted (reversible), shares are
//! plain inserts.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::auth::{AuthError, SharedSession};
use crate::config::SupabaseSettings;

const TABLE: &str = "user_interactions";

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("Request timed out")]
    Timeout,
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("Supabase URL cannot carry a path: {0}")]
    InvalidUrl(String),
    #[error("Session refresh failed: {0}")]
    Auth(#[from] AuthError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionAction {
    Read,
    Bookmark,
    Share,
}

impl InteractionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            InteractionAction::Read => "read",
            InteractionAction::Bookmark => "bookmark",
            InteractionAction::Share => "share",
        }
    }
}

/// One row of the remote table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRow {
    pub user_id: String,
    pub article_id: String,
    pub action: InteractionAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A pending change queued by the interaction store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteChange {
    pub user_id: Arc<str>,
    pub article_id: Arc<str>,
    pub op: RemoteOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOp {
    UpsertRead,
    InsertBookmark,
    DeleteBookmark,
    InsertShare,
}

/// PostgREST client for the interaction table, authenticated as one user.
///
/// An expired session is refreshed before a request goes out, and a request
/// answered with 401 is retried once with a refreshed token.
#[derive(Clone)]
pub struct RemoteInteractions {
    http: reqwest::Client,
    base: Url,
    anon_key: SecretString,
    session: SharedSession,
    timeout: Duration,
}

impl std::fmt::Debug for RemoteInteractions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteInteractions")
            .field("base", &self.base.as_str())
            .field("session", &self.session)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RemoteInteractions {
    pub fn new(
        http: reqwest::Client,
        settings: &SupabaseSettings,
        session: SharedSession,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base: settings.url.clone(),
            anon_key: settings.anon_key.clone(),
            session,
            timeout,
        }
    }

    /// Apply one queued change.
    pub async fn apply(&self, change: &RemoteChange) -> Result<(), RemoteError> {
        let row = |action| InteractionRow {
            user_id: change.user_id.to_string(),
            article_id: change.article_id.to_string(),
            action,
            created_at: None,
        };
        match change.op {
            RemoteOp::UpsertRead => self.upsert(&row(InteractionAction::Read)).await,
            RemoteOp::InsertBookmark => self.insert(&row(InteractionAction::Bookmark)).await,
            RemoteOp::DeleteBookmark => {
                self.delete(&change.user_id, &change.article_id, InteractionAction::Bookmark)
                    .await
            }
            RemoteOp::InsertShare => self.insert(&row(InteractionAction::Share)).await,
        }
    }

    /// Insert, or do nothing if the `(user, article, action)` row exists.
    pub async fn upsert(&self, row: &InteractionRow) -> Result<(), RemoteError> {
        let mut url = self.table_url()?;
        url.query_pairs_mut()
            .append_pair("on_conflict", "user_id,article_id,action");
        let body = encode(row)?;
        self.send_authorized(|| {
            self.http
                .post(url.clone())
                .header("Prefer", "resolution=ignore-duplicates,return=minimal")
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone())
        })
        .await
        .map(drop)
    }

    pub async fn insert(&self, row: &InteractionRow) -> Result<(), RemoteError> {
        let url = self.table_url()?;
        let body = encode(row)?;
        self.send_authorized(|| {
            self.http
                .post(url.clone())
                .header("Prefer", "return=minimal")
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone())
        })
        .await
        .map(drop)
    }

    pub async fn delete(
        &self,
        user_id: &str,
        article_id: &str,
        action: InteractionAction,
    ) -> Result<(), RemoteError> {
        let mut url = self.table_url()?;
        url.query_pairs_mut()
            .append_pair("user_id", &format!("eq.{user_id}"))
            .append_pair("article_id", &format!("eq.{article_id}"))
            .append_pair("action", &format!("eq.{}", action.as_str()));
        self.send_authorized(|| self.http.delete(url.clone()))
            .await
            .map(drop)
    }

    /// All rows for `user_id`.
    pub async fn list(&self, user_id: &str) -> Result<Vec<InteractionRow>, RemoteError> {
        let mut url = self.table_url()?;
        url.query_pairs_mut()
            .append_pair("select", "user_id,article_id,action,created_at")
            .append_pair("user_id", &format!("eq.{user_id}"));
        let bytes = self
            .send_authorized(|| {
                self.http
                    .get(url.clone())
                    .header(reqwest::header::ACCEPT, "application/json")
            })
            .await?;

        // Rows with actions this client does not know about are skipped.
        let values: Vec<serde_json::Value> =
            serde_json::from_slice(&bytes).map_err(|e| RemoteError::Malformed(e.to_string()))?;
        Ok(values
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect())
    }

    fn table_url(&self) -> Result<Url, RemoteError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(["rest", "v1", TABLE]);
        Ok(url)
    }

    fn authorized(
        &self,
        request: reqwest::RequestBuilder,
        token: &SecretString,
    ) -> reqwest::RequestBuilder {
        request
            .header("apikey", self.anon_key.expose_secret())
            .bearer_auth(token.expose_secret())
    }

    /// Send the request `build` produces, refreshing the session and retrying
    /// once if the token is rejected.
    async fn send_authorized<F>(&self, build: F) -> Result<Vec<u8>, RemoteError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let token = self.session.access_token(Utc::now()).await?;
        let rejected = match self.send(self.authorized(build(), &token)).await {
            Err(e @ RemoteError::HttpStatus { status: 401, .. }) => e,
            other => return other,
        };

        tracing::debug!(user_id = %self.session.user().id, "Access token rejected, refreshing");
        let fresh = match self.session.refresh_rejected(&token).await {
            Ok(fresh) => fresh,
            Err(AuthError::NotRefreshable) => return Err(rejected),
            Err(e) => return Err(e.into()),
        };
        self.send(self.authorized(build(), &fresh.access_token)).await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, RemoteError> {
        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            if !status.is_success() {
                return Err(RemoteError::HttpStatus {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&body).chars().take(200).collect(),
                });
            }
            Ok(body.to_vec())
        };
        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| RemoteError::Timeout)?
    }
}

fn encode(row: &InteractionRow) -> Result<Vec<u8>, RemoteError> {
    serde_json::to_vec(row).map_err(|e| RemoteError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{load_session, AuthClient, Session, UserIdentity};
    use crate::storage::Database;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_json, header, headers, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings_for(server: &MockServer) -> SupabaseSettings {
        SupabaseSettings {
            url: Url::parse(&server.uri()).unwrap(),
            anon_key: SecretString::from("anon"),
        }
    }

    fn session(token: &str, expires_at: Option<DateTime<Utc>>) -> Session {
        Session {
            user: UserIdentity {
                id: "u1".to_string(),
                email: "ada@example.com".to_string(),
                full_name: None,
            },
            access_token: SecretString::from(token),
            refresh_token: Some(SecretString::from("refresh-1")),
            expires_at,
        }
    }

    fn remote_for(server: &MockServer) -> RemoteInteractions {
        RemoteInteractions::new(
            reqwest::Client::new(),
            &settings_for(server),
            SharedSession::new(session("token-1", None)),
            Duration::from_secs(5),
        )
    }

    /// A client whose session refreshes against the same mock server.
    fn refreshing_remote(server: &MockServer, session: Session, db: &Database) -> RemoteInteractions {
        let settings = settings_for(server);
        let auth = AuthClient::new(reqwest::Client::new(), &settings, Duration::from_secs(5));
        RemoteInteractions::new(
            reqwest::Client::new(),
            &settings,
            SharedSession::with_refresh(session, auth, db.clone()),
            Duration::from_secs(5),
        )
    }

    async fn mount_refresh(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"access_token":"token-2","refresh_token":"refresh-2","expires_in":3600,
                    "user":{"id":"u1","email":"ada@example.com"}}"#,
            ))
            .expect(1)
            .mount(server)
            .await;
    }

    fn change(op: RemoteOp) -> RemoteChange {
        RemoteChange {
            user_id: Arc::from("u1"),
            article_id: Arc::from("a1"),
            op,
        }
    }

    #[tokio::test]
    async fn test_read_is_upserted_with_conflict_target() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/user_interactions"))
            .and(query_param("on_conflict", "user_id,article_id,action"))
            .and(header("apikey", "anon"))
            .and(header("authorization", "Bearer token-1"))
            .and(headers("prefer", vec!["resolution=ignore-duplicates", "return=minimal"]))
            .and(body_json(serde_json::json!({
                "user_id": "u1", "article_id": "a1", "action": "read"
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        remote_for(&server)
            .apply(&change(RemoteOp::UpsertRead))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_bookmark_insert_and_delete() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/user_interactions"))
            .and(body_json(serde_json::json!({
                "user_id": "u1", "article_id": "a1", "action": "bookmark"
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/user_interactions"))
            .and(query_param("user_id", "eq.u1"))
            .and(query_param("article_id", "eq.a1"))
            .and(query_param("action", "eq.bookmark"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let remote = remote_for(&server);
        remote.apply(&change(RemoteOp::InsertBookmark)).await.unwrap();
        remote.apply(&change(RemoteOp::DeleteBookmark)).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_skips_unknown_actions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/user_interactions"))
            .and(query_param("user_id", "eq.u1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[
                    {"user_id":"u1","article_id":"a1","action":"read","created_at":"2025-03-01T10:00:00Z"},
                    {"user_id":"u1","article_id":"a2","action":"bookmark","created_at":null},
                    {"user_id":"u1","article_id":"a3","action":"like"}
                ]"#,
            ))
            .mount(&server)
            .await;

        let rows = remote_for(&server).list("u1").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].action, InteractionAction::Read);
        assert!(rows[0].created_at.is_some());
        assert_eq!(rows[1].article_id, "a2");
    }

    #[tokio::test]
    async fn test_error_status_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("JWT expired"))
            .mount(&server)
            .await;

        let err = remote_for(&server)
            .apply(&change(RemoteOp::InsertShare))
            .await
            .unwrap_err();
        match err {
            RemoteError::HttpStatus { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "JWT expired");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_rejected_token_is_refreshed_and_retried_once() {
        let server = MockServer::start().await;
        mount_refresh(&server).await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/user_interactions"))
            .and(header("authorization", "Bearer token-1"))
            .respond_with(ResponseTemplate::new(401).set_body_string("JWT expired"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/user_interactions"))
            .and(header("authorization", "Bearer token-2"))
            .respond_with(ResponseTemplate::new(201))
            .expect(2)
            .mount(&server)
            .await;

        let db = Database::open(":memory:").await.unwrap();
        let remote = refreshing_remote(&server, session("token-1", None), &db);
        remote.apply(&change(RemoteOp::UpsertRead)).await.unwrap();
        // The refreshed token is reused without another refresh
        remote.apply(&change(RemoteOp::InsertShare)).await.unwrap();

        let persisted = load_session(&db).await.unwrap();
        assert_eq!(persisted.access_token.expose_secret(), "token-2");
    }

    #[tokio::test]
    async fn test_expired_session_refreshes_before_sending() {
        let server = MockServer::start().await;
        mount_refresh(&server).await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/user_interactions"))
            .and(header("authorization", "Bearer token-2"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let db = Database::open(":memory:").await.unwrap();
        let expired = session("token-1", Some(Utc::now() - chrono::Duration::minutes(5)));
        let remote = refreshing_remote(&server, expired, &db);
        remote.apply(&change(RemoteOp::DeleteBookmark)).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_refresh_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/user_interactions"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let db = Database::open(":memory:").await.unwrap();
        let expired = session("token-1", Some(Utc::now() - chrono::Duration::minutes(5)));
        let err = refreshing_remote(&server, expired, &db)
            .apply(&change(RemoteOp::UpsertRead))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RemoteError::Auth(AuthError::HttpStatus { status: 503, .. })
        ));
    }
}
