/*!
common/src/lib.rs

Shared configuration types and the contact list for socialbot.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader that merges a default and an override config file
- The `contacts` module: the validated list of important contacts
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod contacts;

pub use contacts::{Contact, ContactError, ContactList};

/// Contact list configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactsConfig {
    /// Path to the JSON contact list (e.g. "config/contacts.json")
    pub path: PathBuf,
}

impl Default for ContactsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("config/contacts.json"),
        }
    }
}

/// Google OAuth + API endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    /// OAuth client secret downloaded from the Google Cloud console
    pub credentials_path: PathBuf,
    /// Cached OAuth token, written after the first authorization
    pub token_path: PathBuf,
    pub gmail_base_url: String,
    pub calendar_base_url: String,
    pub timeout_seconds: Option<u64>,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("oauth_credentials.json"),
            token_path: PathBuf::from("token.json"),
            gmail_base_url: "https://gmail.googleapis.com/gmail/v1".to_string(),
            calendar_base_url: "https://www.googleapis.com/calendar/v3".to_string(),
            timeout_seconds: None,
        }
    }
}

/// Gemini config (used if `llm.adapter = "gemini"`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Remote LLM config (used if `llm.adapter = "remote"`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
}

/// LLM top-level config grouping provider specifics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub adapter: Option<String>, // "gemini", "remote"
    pub gemini: Option<GeminiConfig>,
    pub remote: Option<RemoteLlmConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            adapter: Some("gemini".to_string()),
            gemini: None,
            remote: None,
        }
    }
}

/// Windows and limits used by the recommend / draft / catchup flows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutreachConfig {
    pub lookback_days: i64,
    pub max_messages: u32,
    pub draft_post_limit: usize,
    pub catchup_post_limit: usize,
}

impl Default for OutreachConfig {
    fn default() -> Self {
        Self {
            lookback_days: 30,
            max_messages: 500,
            draft_post_limit: 3,
            catchup_post_limit: 10,
        }
    }
}

impl OutreachConfig {
    /// Longest lookback window accepted, about ten years.
    pub const MAX_LOOKBACK_DAYS: i64 = 3650;

    pub fn validate(&self) -> Result<()> {
        if !(1..=Self::MAX_LOOKBACK_DAYS).contains(&self.lookback_days) {
            anyhow::bail!(
                "outreach.lookback_days must be between 1 and {}, got {}",
                Self::MAX_LOOKBACK_DAYS,
                self.lookback_days
            );
        }
        Ok(())
    }
}

/// Feed fetching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedsConfig {
    pub fetch_timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_seconds: 10,
            user_agent: "socialbot/0.1.0".to_string(),
        }
    }
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub contacts: ContactsConfig,
    pub google: GoogleConfig,
    pub llm: LlmConfig,
    pub outreach: OutreachConfig,
    pub feeds: FeedsConfig,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence). Missing
    /// sections fall back to `Config::default()`.
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        if let Some(path) = default_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path).await
                    .with_context(|| format!("Failed to read default config: {}", path.display()))?;
                let val: toml::Value = toml::from_str(&data)
                    .context("Failed to parse default configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        if let Some(path) = override_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path).await
                    .with_context(|| format!("Failed to read override config: {}", path.display()))?;
                let val: toml::Value = toml::from_str(&data)
                    .context("Failed to parse override configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        Ok(cfg)
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}
