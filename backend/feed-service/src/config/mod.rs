use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub feed: FeedTuning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Knobs of the composition pipelines. Defaults reproduce the behavior the
/// mobile clients were built against; every field can be overridden with a
/// `FEED_`-prefixed environment variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedTuning {
    /// Discovery items pulled per followed item (rounded up)
    #[serde(default = "default_discovery_ratio")]
    pub discovery_ratio: f64,
    /// Discovery items pulled when the followed partition is empty
    #[serde(default = "default_discovery_fallback")]
    pub discovery_fallback: usize,
    /// Most recent posts kept per author in the post feed
    #[serde(default = "default_post_author_cap")]
    pub post_author_cap: usize,
    /// Longest same-author run allowed in the listing feed
    #[serde(default = "default_listing_max_run")]
    pub listing_max_run: usize,
    /// Deferred listings re-injected per cooldown
    #[serde(default = "default_listing_cooldown_drain")]
    pub listing_cooldown_drain: usize,
    /// Most recent listings kept per author in the followed listing feed
    #[serde(default = "default_listing_author_cap")]
    pub listing_author_cap: usize,
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
}

impl Default for FeedTuning {
    fn default() -> Self {
        Self {
            discovery_ratio: default_discovery_ratio(),
            discovery_fallback: default_discovery_fallback(),
            post_author_cap: default_post_author_cap(),
            listing_max_run: default_listing_max_run(),
            listing_cooldown_drain: default_listing_cooldown_drain(),
            listing_author_cap: default_listing_author_cap(),
            default_page_size: default_page_size(),
        }
    }
}

impl FeedTuning {
    pub fn from_env() -> Result<Self> {
        let tuning: FeedTuning = envy::prefixed("FEED_")
            .from_env()
            .context("invalid FEED_* tuning variables")?;
        tuning.validate()?;
        Ok(tuning)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.discovery_ratio.is_finite() || self.discovery_ratio < 0.0 {
            bail!(
                "FEED_DISCOVERY_RATIO must be a finite, non-negative number (got {})",
                self.discovery_ratio
            );
        }
        for (name, value) in [
            ("FEED_POST_AUTHOR_CAP", self.post_author_cap),
            ("FEED_LISTING_MAX_RUN", self.listing_max_run),
            ("FEED_LISTING_COOLDOWN_DRAIN", self.listing_cooldown_drain),
            ("FEED_LISTING_AUTHOR_CAP", self.listing_author_cap),
            ("FEED_DEFAULT_PAGE_SIZE", self.default_page_size),
        ] {
            if value == 0 {
                bail!("{} must be at least 1", name);
            }
        }
        Ok(())
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: std::env::var("APP_PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .context("APP_PORT must be a valid u16")?,
                log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?,
            },
            feed: FeedTuning::from_env()?,
        })
    }
}

fn default_discovery_ratio() -> f64 {
    0.7
}

fn default_discovery_fallback() -> usize {
    40
}

fn default_post_author_cap() -> usize {
    2
}

fn default_listing_max_run() -> usize {
    2
}

fn default_listing_cooldown_drain() -> usize {
    3
}

fn default_listing_author_cap() -> usize {
    6
}

fn default_page_size() -> usize {
    10
}
