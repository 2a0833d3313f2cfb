pub mod source;
pub use source::{ConfigSource, EnvFileConfig, MemoryConfig};

use crate::error::{Error, Result};
use crate::credentials::threshold_duration;

/// Name of the variable holding the base64-encoded secret key.
pub const SECRET_KEY_VAR: &str = "SECRET_KEY";

/// OAuth client registration.
///
/// All four values are required; a missing one aborts startup.
#[derive(Clone)]
pub struct AuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub code: String,
}

impl AuthConfig {
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self> {
        Ok(Self {
            client_id: source.require("CLIENT_ID")?,
            client_secret: source.require("CLIENT_SECRET")?,
            redirect_uri: source.require("REDIRECT_URI")?,
            code: source.require("CODE")?,
        })
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("code", &"<redacted>")
            .finish()
    }
}

/// Deployment settings for one ETL run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// SQLite record store path
    pub database_path: String,
    /// Age after which a stored credential is refreshed (hours)
    pub threshold_hours: i64,
    /// OAuth token endpoint
    pub token_url: String,
    /// Marketplace API base URL
    pub api_base_url: String,
    /// Marketplace site searched
    pub site_id: String,
    /// Free-text product query; no search runs without one
    pub search_query: Option<String>,
    /// Optional category filter
    pub search_category: Option<String>,
    /// Per-request HTTP timeout (seconds)
    pub http_timeout_secs: u64,
}

fn default_database_path() -> String {
    "meli.db".to_string()
}

fn default_threshold_hours() -> i64 {
    6
}

fn default_token_url() -> String {
    crate::oauth::TOKEN_URL.to_string()
}

fn default_api_base_url() -> String {
    "https://api.mercadolibre.com".to_string()
}

fn default_site_id() -> String {
    "MLA".to_string()
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            threshold_hours: default_threshold_hours(),
            token_url: default_token_url(),
            api_base_url: default_api_base_url(),
            site_id: default_site_id(),
            search_query: None,
            search_category: None,
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl Settings {
    /// Loads settings, falling back to defaults for absent keys.
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self> {
        let threshold_hours = match source.get("TOKEN_THRESHOLD_HOURS")? {
            Some(raw) => parse_positive(&raw, "TOKEN_THRESHOLD_HOURS")?,
            None => default_threshold_hours(),
        };
        threshold_duration(threshold_hours)?;
        let http_timeout_secs = match source.get("HTTP_TIMEOUT_SECS")? {
            Some(raw) => parse_positive(&raw, "HTTP_TIMEOUT_SECS")? as u64,
            None => default_http_timeout_secs(),
        };

        Ok(Self {
            database_path: source
                .get("DATABASE_PATH")?
                .unwrap_or_else(default_database_path),
            threshold_hours,
            token_url: source.get("TOKEN_URL")?.unwrap_or_else(default_token_url),
            api_base_url: source
                .get("API_BASE_URL")?
                .unwrap_or_else(default_api_base_url),
            site_id: source.get("SITE_ID")?.unwrap_or_else(default_site_id),
            search_query: source.get("SEARCH_QUERY")?,
            search_category: source.get("SEARCH_CATEGORY")?,
            http_timeout_secs,
        })
    }
}

fn parse_positive(raw: &str, name: &str) -> Result<i64> {
    match raw.trim().parse::<i64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(Error::Config(format!(
            "{} must be a positive integer, got {:?}",
            name, raw
        ))),
    }
}
