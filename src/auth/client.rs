use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::SupabaseSettings;

/// Sessions this close to expiry are treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Request timed out")]
    Timeout,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Auth error (status {status}): {message}")]
    HttpStatus { status: u16, message: String },
    #[error("Malformed auth response: {0}")]
    Malformed(String),
    #[error("Supabase URL cannot carry a path: {0}")]
    InvalidUrl(String),
    #[error("Session has no refresh token")]
    NotRefreshable,
}

/// Who is signed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

impl UserIdentity {
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.email)
    }
}

/// A signed-in user plus the tokens that prove it.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserIdentity,
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|at| at <= now + chrono::Duration::seconds(EXPIRY_SKEW_SECS))
    }
}

#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    SignedIn(Session),
    /// The project requires email confirmation before the first sign-in.
    ConfirmationRequired(UserIdentity),
}

/// Row of the `user_profiles` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: GoTrueUser,
}

#[derive(Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Default, Deserialize)]
struct UserMetadata {
    #[serde(default)]
    full_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Token(TokenResponse),
    User(GoTrueUser),
}

#[derive(Default, Deserialize)]
struct ErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl GoTrueUser {
    fn into_identity(self) -> UserIdentity {
        UserIdentity {
            id: self.id,
            email: self.email.unwrap_or_default(),
            full_name: self.user_metadata.full_name.filter(|n| !n.trim().is_empty()),
        }
    }
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .or_else(|| {
                self.expires_in
                    .map(|secs| now + chrono::Duration::seconds(secs))
            });
        Session {
            user: self.user.into_identity(),
            access_token: SecretString::from(self.access_token),
            refresh_token: self.refresh_token.map(SecretString::from),
            expires_at,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// GoTrue client for one Supabase project.
#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base: Url,
    anon_key: SecretString,
    timeout: Duration,
}

impl std::fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClient")
            .field("base", &self.base.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl AuthClient {
    pub fn new(http: reqwest::Client, settings: &SupabaseSettings, timeout: Duration) -> Self {
        Self {
            http,
            base: settings.url.clone(),
            anon_key: settings.anon_key.clone(),
            timeout,
        }
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, AuthError> {
        let mut url = self.url(&["auth", "v1", "token"])?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let body = serde_json::json!({
            "email": email.trim(),
            "password": password.expose_secret(),
        });

        let token: TokenResponse = self.post_credentials(url, &body).await?;
        let session = token.into_session(Utc::now());
        tracing::info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
        full_name: Option<&str>,
    ) -> Result<SignUpOutcome, AuthError> {
        let url = self.url(&["auth", "v1", "signup"])?;
        let body = serde_json::json!({
            "email": email.trim(),
            "password": password.expose_secret(),
            "data": { "full_name": full_name.unwrap_or_default() },
        });

        let response = self
            .request(self.http.post(url).json_body(&body)?)
            .await?;
        let parsed: SignUpResponse = decode(&response)?;
        Ok(match parsed {
            SignUpResponse::Token(token) => SignUpOutcome::SignedIn(token.into_session(Utc::now())),
            SignUpResponse::User(user) => SignUpOutcome::ConfirmationRequired(user.into_identity()),
        })
    }

    /// Exchange a refresh token for a new session.
    pub async fn refresh(&self, refresh_token: &SecretString) -> Result<Session, AuthError> {
        let mut url = self.url(&["auth", "v1", "token"])?;
        url.query_pairs_mut().append_pair("grant_type", "refresh_token");
        let body = serde_json::json!({ "refresh_token": refresh_token.expose_secret() });

        let token: TokenResponse = self.post_credentials(url, &body).await?;
        Ok(token.into_session(Utc::now()))
    }

    pub async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        let url = self.url(&["auth", "v1", "logout"])?;
        let request = self
            .http
            .post(url)
            .bearer_auth(session.access_token.expose_secret());
        self.request(request).await?;
        tracing::info!(user_id = %session.user.id, "Signed out");
        Ok(())
    }

    /// The user's `user_profiles` row, if one exists.
    pub async fn fetch_profile(&self, session: &Session) -> Result<Option<Profile>, AuthError> {
        let mut url = self.url(&["rest", "v1", "user_profiles"])?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("id", &format!("eq.{}", session.user.id));
        let request = self
            .http
            .get(url)
            .bearer_auth(session.access_token.expose_secret())
            .header(reqwest::header::ACCEPT, "application/json");

        let body = self.request(request).await?;
        let rows: Vec<Profile> = decode(&body)?;
        Ok(rows.into_iter().next())
    }

    /// POST to a credential grant; 400/401 mean the credentials were refused.
    async fn post_credentials<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        body: &serde_json::Value,
    ) -> Result<T, AuthError> {
        match self.request(self.http.post(url).json_body(body)?).await {
            Ok(bytes) => decode(&bytes),
            Err(AuthError::HttpStatus { status: 400 | 401, message }) => {
                tracing::debug!(message = %message, "Credential grant refused");
                Err(AuthError::InvalidCredentials)
            }
            Err(e) => Err(e),
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url, AuthError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| AuthError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, AuthError> {
        let request = request.header("apikey", self.anon_key.expose_secret());
        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            if !status.is_success() {
                return Err(AuthError::HttpStatus {
                    status: status.as_u16(),
                    message: error_message(&body),
                });
            }
            Ok(body.to_vec())
        };
        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| AuthError::Timeout)?
    }
}

/// JSON bodies without reqwest's `json` feature.
trait JsonBody: Sized {
    fn json_body(self, body: &serde_json::Value) -> Result<Self, AuthError>;
}

impl JsonBody for reqwest::RequestBuilder {
    fn json_body(self, body: &serde_json::Value) -> Result<Self, AuthError> {
        let bytes = serde_json::to_vec(body).map_err(|e| AuthError::Malformed(e.to_string()))?;
        Ok(self
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(bytes))
    }
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, AuthError> {
    serde_json::from_slice(bytes).map_err(|e| AuthError::Malformed(e.to_string()))
}

fn error_message(body: &[u8]) -> String {
    let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
    parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .or(parsed.error)
        .unwrap_or_else(|| String::from_utf8_lossy(body).chars().take(200).collect())
}
