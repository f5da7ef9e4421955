//! Application configuration.
//!
//! Layered the figment way: serialized defaults, then the TOML config file,
//! then `STG_`-prefixed environment variables. `DATABASE_URL` is honoured as
//! a bare environment fallback; its absence disables the store.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use stg_domain::error::{Error, Result};

/// XDG path resolution
pub mod paths;

/// Outbound HTTP defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Per-request timeout when the caller does not override it
    pub default_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            user_agent: format!("stg/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Stored-body caps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    pub max_request_body_bytes: usize,
    pub max_response_body_bytes: usize,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_request_body_bytes: 1024 * 1024,
            max_response_body_bytes: 1024 * 1024,
        }
    }
}

/// Sensitive-header redaction set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionSettings {
    /// Case-insensitive header names replaced with the redaction sentinel
    pub headers: Vec<String>,
    /// Also redact the Cookie request header
    pub redact_cookie: bool,
    /// Also redact Set-Cookie response headers
    pub redact_set_cookie: bool,
}

impl Default for RedactionSettings {
    fn default() -> Self {
        Self {
            headers: vec!["authorization".to_owned(), "proxy-authorization".to_owned()],
            redact_cookie: false,
            redact_set_cookie: false,
        }
    }
}

impl RedactionSettings {
    /// The effective header-name set including the optional cookie entries.
    #[must_use]
    pub fn effective_headers(&self) -> Vec<String> {
        let mut names = self.headers.clone();
        if self.redact_cookie {
            names.push("cookie".to_owned());
        }
        if self.redact_set_cookie {
            names.push("set-cookie".to_owned());
        }
        names
    }
}

/// Embedding model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub enabled: bool,
    /// fastembed model identifier
    pub model: String,
    pub dimensions: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "all-minilm-l6-v2".to_owned(),
            dimensions: 384,
        }
    }
}

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Postgres connection string; absent disables the store
    pub database_url: Option<String>,
    /// Upstream intercepting proxy applied to every outbound request
    pub proxy_url: Option<String>,
    pub http: HttpSettings,
    pub limits: LimitSettings,
    pub redaction: RedactionSettings,
    pub embedding: EmbeddingSettings,
    /// Override for the prompt guide directory
    pub prompts_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration.
    ///
    /// Resolution order: defaults, then the TOML file (explicit path or
    /// `$XDG_CONFIG_HOME/stg/config.toml` when present), then `STG_*`
    /// environment variables, then the bare `DATABASE_URL` fallback.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the file cannot be parsed or a
    /// value fails validation.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let file = config_path
            .map(Path::to_path_buf)
            .or_else(|| {
                let default = paths::config_file();
                default.exists().then_some(default)
            });
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment = figment.merge(Env::prefixed("STG_").split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::config_with_source("failed to load configuration", e))?;
        if config.database_url.is_none() {
            config.database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.embedding.dimensions == 0 {
            return Err(Error::config("embedding.dimensions must be positive"));
        }
        if self.limits.max_request_body_bytes == 0 || self.limits.max_response_body_bytes == 0 {
            return Err(Error::config("limits.* body caps must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_contract() {
        let config = AppConfig::default();
        assert_eq!(config.limits.max_request_body_bytes, 1024 * 1024);
        assert_eq!(config.embedding.dimensions, 384);
        assert_eq!(config.http.default_timeout_ms, 30_000);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn redaction_set_grows_with_cookie_toggles() {
        let mut settings = RedactionSettings::default();
        assert!(!settings.effective_headers().contains(&"cookie".to_owned()));
        settings.redact_cookie = true;
        settings.redact_set_cookie = true;
        let effective = settings.effective_headers();
        assert!(effective.contains(&"cookie".to_owned()));
        assert!(effective.contains(&"set-cookie".to_owned()));
    }

    #[test]
    fn zero_dimension_embedding_is_rejected() {
        let mut config = AppConfig::default();
        config.embedding.dimensions = 0;
        assert!(config.validate().is_err());
    }
}
