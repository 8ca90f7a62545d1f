/*!
common/src/lib.rs

Shared configuration types and DB helper functions for the said bot.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader that merges a default config file with an optional override
- A helper to initialize the SQLite database holding already-posted quotes
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Database configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the sqlite database file (e.g. "data/used-quotes.db")
    pub path: String,
}

/// Politeness / fetching configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolitenessConfig {
    pub fetch_timeout_seconds: Option<u64>,
    pub max_retries: Option<u32>,
    pub scrape_concurrency: Option<usize>,
    pub user_agent: Option<String>,
}

impl PolitenessConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds.unwrap_or(10))
    }

    pub fn retries(&self) -> u32 {
        self.max_retries.unwrap_or(3).max(1)
    }

    pub fn concurrency(&self) -> usize {
        self.scrape_concurrency.unwrap_or(4).max(1)
    }

    pub fn agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or("said/0.1.0")
    }
}

/// A fixed news site, identified by name and read through its RSS/Atom feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub url: String,
}

/// Article source catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Free-text news search queries; a blank entry asks for the top stories
    pub search_terms: Option<Vec<String>>,
    /// Search feed endpoint, the term is appended as the `q` parameter
    pub search_url: Option<String>,
    /// Feed used for the blank search term
    pub top_stories_url: Option<String>,
    pub sites: Option<Vec<SiteConfig>>,
}

/// Sentence normalizer options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Collapse "..." into an ellipsis, drop the final period and capitalize
    pub cosmetic: Option<bool>,
}

/// Posting behaviour
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostConfig {
    /// Chance (0-100) that `post --random` actually posts
    pub probability_percent: Option<u32>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub politeness: PolitenessConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub post: PostConfig,
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
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
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
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject site and endpoint URLs that cannot be fetched.
    pub fn validate(&self) -> Result<()> {
        let endpoints = self.sources.search_url.iter()
            .chain(self.sources.top_stories_url.iter());
        for url in endpoints {
            url::Url::parse(url).with_context(|| format!("invalid source endpoint URL: {}", url))?;
        }

        for site in self.sources.sites.iter().flatten() {
            url::Url::parse(&site.url)
                .with_context(|| format!("invalid feed URL for site '{}': {}", site.name, site.url))?;
        }

        if let Some(p) = self.post.probability_percent {
            anyhow::ensure!(p <= 100, "post.probability_percent must be between 0 and 100, got {}", p);
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
/// This function will create the parent directory if necessary, ensure the DB file exists
/// (attempting to create it if missing), and return a configured `SqlitePool`.
/// The bot runs as a short-lived process, so the pool is small:
/// - max_connections: 5
/// - connection timeout default provided by `sqlx`
///
/// Example:
///   let pool = init_db_pool("data/used-quotes.db").await?;
pub async fn init_db_pool(path: &str) -> Result<SqlitePool> {
    if let Some(parent) = Path::new(path).parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create DB parent directory: {}", parent.display())
        })?;
    }

    // Creating the file up front surfaces permission or path problems with a clearer
    // error than the SQLite connection attempt gives.
    tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to create or open DB file: {}", path))?;

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

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn config_from_string_and_db_pool() {
        let toml = r#"
            [database]
            path = "data/test.db"

            [sources]
            search_terms = ["", "gardening"]

            [[sources.sites]]
            name = "npr"
            url = "https://feeds.npr.org/1001/rss.xml"
        "#;

        let cfg: Config = toml::from_str(toml).expect("parse config");
        cfg.validate().expect("valid config");
        assert_eq!(cfg.sources.search_terms.as_ref().map(Vec::len), Some(2));
        assert_eq!(cfg.sources.sites.as_ref().map(Vec::len), Some(1));
        assert_eq!(cfg.politeness.retries(), 3);
        assert!(cfg.normalizer.cosmetic.is_none());

        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("nested").join("used.db");
        let db_path_str = db_path.to_string_lossy().to_string();

        let pool = init_db_pool(&db_path_str).await.expect("init pool");
        let conn = pool.acquire().await.expect("acquire conn");
        drop(conn);
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn override_file_wins_over_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let default_path = dir.path().join("config.default.toml");
        let override_path = dir.path().join("config.toml");

        fs::write(
            &default_path,
            r#"
            [database]
            path = "data/used-quotes.db"

            [politeness]
            fetch_timeout_seconds = 10
            max_retries = 3

            [normalizer]
            cosmetic = true
            "#,
        )
        .expect("write defaults");
        fs::write(
            &override_path,
            r#"
            [politeness]
            max_retries = 5
            "#,
        )
        .expect("write override");

        let cfg = Config::load_with_defaults(Some(&default_path), Some(&override_path))
            .await
            .expect("load");

        assert_eq!(cfg.database.path, "data/used-quotes.db");
        assert_eq!(cfg.politeness.fetch_timeout_seconds, Some(10));
        assert_eq!(cfg.politeness.max_retries, Some(5));
        assert_eq!(cfg.normalizer.cosmetic, Some(true));
    }

    #[test]
    fn invalid_site_url_is_rejected() {
        let toml = r#"
            [database]
            path = "used.db"

            [[sources.sites]]
            name = "broken"
            url = "not a url"
        "#;

        let cfg: Config = toml::from_str(toml).expect("parse config");
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn probability_above_hundred_is_rejected() {
        let toml = r#"
            [database]
            path = "used.db"

            [post]
            probability_percent = 150
        "#;

        let cfg: Config = toml::from_str(toml).expect("parse config");
        assert!(cfg.validate().is_err());
    }
}
