/*!
common/src/lib.rs

Shared configuration types and DB helper functions for NextStep.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader that merges a default config file with an optional override
- A helper to initialize an SQLite connection pool
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Database configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the sqlite database file (e.g. "data/nextstep.db")
    pub path: String,
}

/// HTTP listener configuration, merged into Rocket's figment at launch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
}

/// Remote LLM config (used if `llm.adapter = "remote"`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    pub api_url: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
}

/// LLM top-level config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub adapter: Option<String>, // "remote", "none"
    pub remote: Option<RemoteLlmConfig>,
}

/// News feed and cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsConfig {
    /// RSS/Atom feed the news section is built from
    pub feed_url: String,
    /// Source label used when the feed has no title of its own
    pub source_name: Option<String>,
    pub cache_ttl_hours: Option<i64>,
    pub max_items: Option<usize>,
    pub fetch_timeout_seconds: Option<u64>,
}

impl NewsConfig {
    pub const DEFAULT_CACHE_TTL_HOURS: i64 = 24;
    pub const DEFAULT_MAX_ITEMS: usize = 20;
    pub const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 10;
    /// One year; anything larger is a typo, and far larger overflows a duration
    pub const MAX_CACHE_TTL_HOURS: i64 = 24 * 365;

    pub fn cache_ttl_hours(&self) -> i64 {
        self.cache_ttl_hours.unwrap_or(Self::DEFAULT_CACHE_TTL_HOURS)
    }

    pub fn max_items(&self) -> usize {
        self.max_items.unwrap_or(Self::DEFAULT_MAX_ITEMS)
    }

    pub fn fetch_timeout_seconds(&self) -> u64 {
        self.fetch_timeout_seconds
            .unwrap_or(Self::DEFAULT_FETCH_TIMEOUT_SECONDS)
    }
}

/// Chat client configuration (used by the terminal client)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Base URL of the NextStep server, e.g. "http://localhost:8000"
    pub server_url: Option<String>,
    /// Directory where the chat history is kept between runs
    pub history_dir: Option<String>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: Option<ServerConfig>,
    pub llm: Option<LlmConfig>,
    pub news: NewsConfig,
    pub chat: Option<ChatConfig>,
}

impl Config {
    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if path.exists() {
                let data = tokio::fs::read_to_string(path).await
                    .with_context(|| format!("Failed to read config: {}", path.display()))?;
                let val: toml::Value = toml::from_str(&data)
                    .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
                merge_toml(&mut config_value, val);
            }
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject URLs that cannot possibly work before anything tries to use them.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.news.feed_url)
            .with_context(|| format!("Invalid news.feed_url: {}", self.news.feed_url))?;

        let ttl = self.news.cache_ttl_hours();
        if !(1..=NewsConfig::MAX_CACHE_TTL_HOURS).contains(&ttl) {
            anyhow::bail!(
                "Invalid news.cache_ttl_hours: {} (expected 1..={})",
                ttl,
                NewsConfig::MAX_CACHE_TTL_HOURS
            );
        }

        if let Some(api_url) = self
            .llm
            .as_ref()
            .and_then(|l| l.remote.as_ref())
            .and_then(|r| r.api_url.as_deref())
        {
            url::Url::parse(api_url).with_context(|| format!("Invalid llm.remote.api_url: {}", api_url))?;
        }

        if let Some(server_url) = self.chat.as_ref().and_then(|c| c.server_url.as_deref()) {
            url::Url::parse(server_url)
                .with_context(|| format!("Invalid chat.server_url: {}", server_url))?;
        }

        Ok(())
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

/// Initialize an SQLite connection pool.
///
/// This function will create the parent directory if necessary and return a configured
/// `SqlitePool` (WAL journal, at most 5 connections). Schema creation is left to the caller.
///
/// Example:
///   let pool = init_db_pool("data/nextstep.db").await?;
pub async fn init_db_pool(path: &str) -> Result<SqlitePool> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create DB parent directory: {}", parent.display())
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to sqlite database at path: {}", path))?;

    Ok(pool)
}
