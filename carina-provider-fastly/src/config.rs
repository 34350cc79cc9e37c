//! Provider configuration
//!
//! Values come from the provider block first, then the environment
//! (`FASTLY_API_KEY`, `FASTLY_BASE_URL`), then built-in defaults.

use std::collections::HashMap;

use carina_core::resource::Value;
use reqwest::Url;
use thiserror::Error;

/// Default Fastly API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.fastly.com";

pub const API_KEY_ENV: &str = "FASTLY_API_KEY";
pub const BASE_URL_ENV: &str = "FASTLY_BASE_URL";

/// Errors in provider configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No Fastly API key: set `api_key` in the provider block or FASTLY_API_KEY")]
    MissingApiKey,

    #[error("Provider attribute '{name}' must be a string")]
    InvalidAttribute { name: String },

    #[error("Invalid Fastly base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// Resolved configuration for talking to the Fastly API
#[derive(Clone)]
pub struct FastlyConfig {
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for FastlyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastlyConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl FastlyConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Result<Self, ConfigError> {
        self.base_url = validate_base_url(base_url.into())?;
        Ok(self)
    }

    /// Build configuration from the environment only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_attributes(&HashMap::new())
    }

    /// Build configuration from provider block attributes, falling back to
    /// the environment
    pub fn from_attributes(attributes: &HashMap<String, Value>) -> Result<Self, ConfigError> {
        Self::resolve(attributes, |name| std::env::var(name).ok())
    }

    fn resolve(
        attributes: &HashMap<String, Value>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let lookup = |attr: &str, var: &str| -> Result<Option<String>, ConfigError> {
            match attributes.get(attr) {
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(_) => Err(ConfigError::InvalidAttribute {
                    name: attr.to_string(),
                }),
                None => Ok(env(var).filter(|v| !v.is_empty())),
            }
        };

        let api_key = lookup("api_key", API_KEY_ENV)?
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let config = Self::new(api_key);
        match lookup("base_url", BASE_URL_ENV)? {
            Some(url) => config.with_base_url(url),
            None => Ok(config),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn validate_base_url(url: String) -> Result<String, ConfigError> {
    let parsed = Url::parse(&url).map_err(|e| ConfigError::InvalidBaseUrl {
        url: url.clone(),
        reason: e.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidBaseUrl {
            url,
            reason: "scheme must be http or https".to_string(),
        });
    }

    Ok(url.trim_end_matches('/').to_string())
}
