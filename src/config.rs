use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub feed: FeedConfig,
    pub follow: FollowConfig,
    pub tags: TagSuggestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `memory` for the in-process store, otherwise a sqlite URL.
    pub url: String,
    /// Maximum number of values a single `in` filter may carry.
    pub in_filter_limit: usize,
    pub id_shard: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub trending_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowConfig {
    pub write_retries: u32,
    pub retry_delay_ms: u64,
    pub reconcile_max_attempts: u32,
    /// Base delay between repair attempts made on reads.
    pub reconcile_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagSuggestConfig {
    pub url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                in_filter_limit: 10,
                id_shard: 0,
            },
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            feed: FeedConfig { trending_limit: 10 },
            follow: FollowConfig {
                write_retries: 3,
                retry_delay_ms: 25,
                reconcile_max_attempts: 5,
                reconcile_backoff_ms: 200,
            },
            tags: TagSuggestConfig {
                url: None,
                timeout_ms: 10_000,
            },
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| {
            AppError::ConfigurationError(format!("{} has invalid value {:?}", name, raw)).into()
        }),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let config = Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(defaults.database.url),
                in_filter_limit: parse_var("FEED_IN_FILTER_LIMIT", defaults.database.in_filter_limit)?,
                id_shard: parse_var("ID_SHARD", defaults.database.id_shard)?,
            },
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port)?,
            },
            feed: FeedConfig {
                trending_limit: parse_var("TRENDING_LIMIT", defaults.feed.trending_limit)?,
            },
            follow: FollowConfig {
                write_retries: parse_var("FOLLOW_WRITE_RETRIES", defaults.follow.write_retries)?,
                retry_delay_ms: parse_var("FOLLOW_RETRY_DELAY_MS", defaults.follow.retry_delay_ms)?,
                reconcile_max_attempts: parse_var(
                    "RECONCILE_MAX_ATTEMPTS",
                    defaults.follow.reconcile_max_attempts,
                )?,
                reconcile_backoff_ms: parse_var(
                    "RECONCILE_BACKOFF_MS",
                    defaults.follow.reconcile_backoff_ms,
                )?,
            },
            tags: TagSuggestConfig {
                url: env::var("TAG_SUGGEST_URL").ok().filter(|u| !u.trim().is_empty()),
                timeout_ms: parse_var("TAG_SUGGEST_TIMEOUT_MS", defaults.tags.timeout_ms)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.in_filter_limit == 0 {
            return Err(AppError::ConfigurationError(
                "FEED_IN_FILTER_LIMIT must be at least 1".to_string(),
            )
            .into());
        }
        if self.database.id_shard >= 1024 {
            return Err(AppError::ConfigurationError("ID_SHARD must be below 1024".to_string()).into());
        }
        Ok(())
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
