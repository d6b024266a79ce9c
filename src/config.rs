//! Configuration file parser for ~/.config/ninet/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde, though we log a warning when the file
//! contains potential typos. A handful of environment variables override the
//! file; they are read once in [`Config::load_with_env`] and nowhere else.
use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::feed::GestureConfig;

pub const DEFAULT_API_BASE_URL: &str = "https://ai-news-api.skaybotlabs.workers.dev";

/// Environment variables that override file settings.
pub const ENV_API_URL: &str = "NINET_API_URL";
pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "SUPABASE_ANON_KEY";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid URL for {key}: {reason}")]
    InvalidUrl { key: &'static str, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
///
/// SEC-015: Custom Debug impl masks `supabase_anon_key` to prevent secret
/// leakage in logs, error messages, and debug output.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the article API.
    pub api_base_url: String,

    /// Upper bound on any single backend request, in seconds.
    pub request_timeout_secs: u64,

    /// Continuous focus required before an article counts as read.
    pub dwell_ms: u64,

    /// Supabase project URL. Auth and remote mirroring need both this and the key.
    pub supabase_url: Option<String>,

    pub supabase_anon_key: Option<String>,

    /// Swipe thresholds and animation timings.
    pub gesture: GestureConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: 15,
            dwell_ms: 3000,
            supabase_url: None,
            supabase_anon_key: None,
            gesture: GestureConfig::default(),
        }
    }
}

/// SEC-015: Mask supabase_anon_key in Debug output to prevent secret leakage.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("dwell_ms", &self.dwell_ms)
            .field("supabase_url", &self.supabase_url)
            .field(
                "supabase_anon_key",
                &self.supabase_anon_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("gesture", &self.gesture)
            .finish()
    }
}

/// Validated Supabase project settings, shared by auth and remote mirroring.
#[derive(Debug, Clone)]
pub struct SupabaseSettings {
    pub url: Url,
    pub anon_key: SecretString,
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading to prevent memory exhaustion
        // from a maliciously large or corrupted config file.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw);
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            api_base_url = %config.api_base_url,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// [`Config::load`] followed by the process environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from `lookup`. Empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_API_URL) {
            tracing::debug!(env = ENV_API_URL, "Overriding api_base_url from environment");
            self.api_base_url = url;
        }
        if let Some(url) = get(ENV_SUPABASE_URL) {
            self.supabase_url = Some(url);
        }
        if let Some(key) = get(ENV_SUPABASE_ANON_KEY) {
            self.supabase_anon_key = Some(key);
        }
    }

    /// The validated article API base URL.
    pub fn api_base(&self) -> Result<Url, ConfigError> {
        parse_http_url("api_base_url", &self.api_base_url)
    }

    /// Supabase settings when both URL and key are configured.
    ///
    /// `Ok(None)` means "run signed-out"; a malformed URL is still an error.
    pub fn supabase(&self) -> Result<Option<SupabaseSettings>, ConfigError> {
        let (Some(url), Some(key)) = (&self.supabase_url, &self.supabase_anon_key) else {
            return Ok(None);
        };
        Ok(Some(SupabaseSettings {
            url: parse_http_url("supabase_url", url)?,
            anon_key: SecretString::from(key.clone()),
        }))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }
}

fn parse_http_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidUrl {
        key,
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            key,
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(url)
}

fn warn_unknown_keys(raw: &toml::Table) {
    const KNOWN_KEYS: [&str; 6] = [
        "api_base_url",
        "request_timeout_secs",
        "dwell_ms",
        "supabase_url",
        "supabase_anon_key",
        "gesture",
    ];
    const KNOWN_GESTURE_KEYS: [&str; 10] = [
        "commit_distance",
        "commit_velocity",
        "drag_damping",
        "edge_damping",
        "scroll_top_epsilon",
        "require_scroll_top_for_previous",
        "exit_distance",
        "exit_duration_ms",
        "return_duration_ms",
        "row_height",
    ];

    for key in raw.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            tracing::warn!(key = %key, "Unknown key in config file, ignoring");
        }
    }
    if let Some(toml::Value::Table(gesture)) = raw.get("gesture") {
        for key in gesture.keys() {
            if !KNOWN_GESTURE_KEYS.contains(&key.as_str()) {
                tracing::warn!(key = %key, "Unknown key in [gesture], ignoring");
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
