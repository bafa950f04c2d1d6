//! Runtime configuration.
//!
//! Each setting comes from the builder if set, then from an environment
//! variable, then from a default. The binary loads `.env` before building.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::notify::DEFAULT_EXCERPT_CHARS;

pub const ENV_DB: &str = "IDEALOG_DB";
pub const ENV_BASE_URL: &str = "IDEALOG_BASE_URL";
pub const ENV_MENTION_LIMIT: &str = "IDEALOG_MENTION_LIMIT";
pub const ENV_EXCERPT_CHARS: &str = "IDEALOG_EXCERPT_CHARS";

/// Default number of mention candidates offered.
pub const DEFAULT_MENTION_LIMIT: usize = 5;

/// Resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_path: PathBuf,
    /// Prefix for contact links in rendered notes.
    pub base_url: String,
    pub mention_limit: usize,
    pub excerpt_chars: usize,
}

impl Config {
    /// Builds a config from the environment alone.
    pub fn from_env() -> Result<Self> {
        ConfigBuilder::new().build()
    }
}

/// Builder for [`Config`].
///
/// # Examples
///
/// ```
/// use idealog::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .database_path("/tmp/idealog-test.db")
///     .base_url("https://crm.example.com")
///     .mention_limit(8)
///     .excerpt_chars(80)
///     .build()
///     .expect("config should build");
/// assert_eq!(config.mention_limit, 8);
/// ```
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    database_path: Option<PathBuf>,
    base_url: Option<String>,
    mention_limit: Option<usize>,
    excerpt_chars: Option<usize>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn mention_limit(mut self, limit: usize) -> Self {
        self.mention_limit = Some(limit);
        self
    }

    pub fn excerpt_chars(mut self, chars: usize) -> Self {
        self.excerpt_chars = Some(chars);
        self
    }

    /// Resolves every setting.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable does not parse, or if no
    /// database path is given and the data directory cannot be determined.
    pub fn build(self) -> Result<Config> {
        let database_path = match self.database_path {
            Some(path) => path,
            None => match std::env::var_os(ENV_DB) {
                Some(path) if !path.is_empty() => PathBuf::from(path),
                _ => crate::utils::default_database_path()?,
            },
        };

        let base_url = match self.base_url {
            Some(url) => url,
            None => std::env::var(ENV_BASE_URL).unwrap_or_default(),
        };

        let mention_limit = match self.mention_limit {
            Some(limit) => limit,
            None => env_usize(ENV_MENTION_LIMIT)?.unwrap_or(DEFAULT_MENTION_LIMIT),
        };

        let excerpt_chars = match self.excerpt_chars {
            Some(chars) => chars,
            None => env_usize(ENV_EXCERPT_CHARS)?.unwrap_or(DEFAULT_EXCERPT_CHARS),
        };

        Ok(Config {
            database_path,
            base_url: base_url.trim_end_matches('/').to_string(),
            mention_limit,
            excerpt_chars,
        })
    }
}

fn env_usize(name: &str) -> Result<Option<usize>> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{name} must be a non-negative integer, got {value:?}")),
        _ => Ok(None),
    }
}
