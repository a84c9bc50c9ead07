//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::Path;

use anyhow::{Context, Result};
use onair_core::Slot;
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP server to (0 = first free port in the default range).
    /// Override: `ONAIR_BIND_PORT`
    pub bind_port: u16,

    /// Broadcast metadata feed.
    /// Override: `ONAIR_FEED_URL`
    pub feed_url: Option<String>,

    /// Offset of the broadcast timezone from UTC, in minutes.
    /// Override: `ONAIR_UTC_OFFSET_MINUTES`
    pub utc_offset_minutes: i32,

    /// Timeout for a single feed request, in seconds.
    /// Override: `ONAIR_FEED_TIMEOUT_SECS`
    pub feed_timeout_secs: u64,

    /// Replacement slot set; the built-in four when absent.
    pub slots: Option<Vec<Slot>>,

    /// Silent source the audio client loops while paused.
    pub focus_source_url: Option<String>,

    /// Origin prefixes allowed by CORS. Empty allows any origin.
    pub trusted_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let core = onair_core::Config::default();
        Self {
            bind_port: 49400,
            feed_url: None,
            utc_offset_minutes: core.utc_offset_minutes,
            feed_timeout_secs: core.feed_timeout_secs,
            slots: None,
            focus_source_url: None,
            trusted_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ONAIR_BIND_PORT") {
            if let Ok(port) = val.parse() {
                self.bind_port = port;
            }
        }

        if let Ok(val) = std::env::var("ONAIR_FEED_URL") {
            if !val.trim().is_empty() {
                self.feed_url = Some(val);
            }
        }

        if let Ok(val) = std::env::var("ONAIR_UTC_OFFSET_MINUTES") {
            if let Ok(minutes) = val.parse() {
                self.utc_offset_minutes = minutes;
            }
        }

        if let Ok(val) = std::env::var("ONAIR_FEED_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.feed_timeout_secs = secs;
            }
        }
    }

    /// Converts to onair-core's Config type and validates it.
    pub fn to_core_config(&self) -> Result<onair_core::Config> {
        if self.feed_url.as_deref().map_or(true, |url| url.trim().is_empty()) {
            anyhow::bail!(
                "A feed URL is required. Pass --feed-url, set ONAIR_FEED_URL, \
                 or add feed_url to the configuration file."
            );
        }

        let defaults = onair_core::Config::default();
        let config = onair_core::Config {
            preferred_port: self.bind_port,
            trusted_origins: self.trusted_origins.clone(),
            feed_url: self.feed_url.clone().unwrap_or_default(),
            feed_timeout_secs: self.feed_timeout_secs,
            utc_offset_minutes: self.utc_offset_minutes,
            slots: self.slots.clone().unwrap_or(defaults.slots),
            focus_source_url: self
                .focus_source_url
                .clone()
                .unwrap_or(defaults.focus_source_url),
            ..onair_core::Config::default()
        };
        config
            .validate()
            .map_err(anyhow::Error::msg)
            .context("Invalid configuration")?;
        Ok(config)
    }
}
