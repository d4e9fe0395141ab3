use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// What to do when a snapshot directory already exists for a requested URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotPolicy {
    /// Re-crawl and overwrite the existing files.
    Overwrite,
    /// Return the existing manifest without launching the browser.
    Reuse,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub cache_dir: PathBuf,
    pub snapshot_policy: SnapshotPolicy,

    // Web Server
    pub web_host: String,
    pub web_port: u16,

    // Browser
    pub chrome_path: Option<String>,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub nav_timeout: Duration,
    pub fast_fail_timeout: Duration,
    pub settle_delay: Duration,
    pub extra_problematic_domains: Vec<String>,

    // Crawl
    pub default_max_depth: u32,
    pub max_depth_limit: u32,

    // Batch
    pub batch_concurrency: usize,
    pub batch_max_concurrency: usize,
    pub batch_stagger: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Storage
            cache_dir: PathBuf::from(env_or_default("CACHE_DIR", "./cache")),
            snapshot_policy: parse_snapshot_policy(&env_or_default(
                "SNAPSHOT_POLICY",
                "overwrite",
            ))?,

            // Web Server
            web_host: env_or_default("WEB_HOST", "0.0.0.0"),
            web_port: parse_env_u16("WEB_PORT", 3000)?,

            // Browser
            chrome_path: optional_env("CHROME_PATH"),
            viewport_width: parse_env_u32("VIEWPORT_WIDTH", 1920)?,
            viewport_height: parse_env_u32("VIEWPORT_HEIGHT", 1080)?,
            nav_timeout: Duration::from_secs(parse_env_u64("NAV_TIMEOUT_SECS", 60)?),
            fast_fail_timeout: Duration::from_secs(parse_env_u64("FAST_FAIL_TIMEOUT_SECS", 15)?),
            settle_delay: Duration::from_millis(parse_env_u64("SETTLE_DELAY_MS", 1000)?),
            extra_problematic_domains: optional_env("PROBLEMATIC_DOMAINS")
                .map(|v| parse_domain_list(&v))
                .unwrap_or_default(),

            // Crawl
            default_max_depth: parse_env_u32("DEFAULT_MAX_DEPTH", 0)?,
            max_depth_limit: parse_env_u32("MAX_DEPTH_LIMIT", 3)?,

            // Batch
            batch_concurrency: parse_env_usize("BATCH_CONCURRENCY", 3)?,
            batch_max_concurrency: parse_env_usize("BATCH_MAX_CONCURRENCY", 8)?,
            batch_stagger: Duration::from_millis(parse_env_u64("BATCH_STAGGER_MS", 250)?),
        })
    }

    /// A deterministic configuration rooted at `./cache` with short waits.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            cache_dir: PathBuf::from("./cache"),
            snapshot_policy: SnapshotPolicy::Overwrite,
            web_host: "127.0.0.1".to_string(),
            web_port: 0,
            chrome_path: None,
            viewport_width: 1280,
            viewport_height: 800,
            nav_timeout: Duration::from_secs(10),
            fast_fail_timeout: Duration::from_secs(5),
            settle_delay: Duration::from_millis(10),
            extra_problematic_domains: Vec::new(),
            default_max_depth: 0,
            max_depth_limit: 3,
            batch_concurrency: 2,
            batch_max_concurrency: 4,
            batch_stagger: Duration::from_millis(1),
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                name: "BATCH_CONCURRENCY".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.batch_max_concurrency < self.batch_concurrency {
            return Err(ConfigError::InvalidValue {
                name: "BATCH_MAX_CONCURRENCY".to_string(),
                message: "must not be lower than BATCH_CONCURRENCY".to_string(),
            });
        }
        if self.default_max_depth > self.max_depth_limit {
            return Err(ConfigError::InvalidValue {
                name: "DEFAULT_MAX_DEPTH".to_string(),
                message: format!("must not exceed MAX_DEPTH_LIMIT ({})", self.max_depth_limit),
            });
        }
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return Err(ConfigError::InvalidValue {
                name: "VIEWPORT_WIDTH/VIEWPORT_HEIGHT".to_string(),
                message: "must be non-zero".to_string(),
            });
        }
        if self.fast_fail_timeout > self.nav_timeout {
            return Err(ConfigError::InvalidValue {
                name: "FAST_FAIL_TIMEOUT_SECS".to_string(),
                message: "must not exceed NAV_TIMEOUT_SECS".to_string(),
            });
        }
        Ok(())
    }

    /// Clamp a requested crawl depth to the configured ceiling.
    #[must_use]
    pub fn effective_depth(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_max_depth)
            .min(self.max_depth_limit)
    }

    /// Clamp a requested batch concurrency to `1..=batch_max_concurrency`.
    #[must_use]
    pub fn effective_concurrency(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.batch_concurrency)
            .clamp(1, self.batch_max_concurrency)
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_snapshot_policy(value: &str) -> Result<SnapshotPolicy, ConfigError> {
    match value.to_lowercase().as_str() {
        "overwrite" => Ok(SnapshotPolicy::Overwrite),
        "reuse" => Ok(SnapshotPolicy::Reuse),
        _ => Err(ConfigError::InvalidValue {
            name: "SNAPSHOT_POLICY".to_string(),
            message: format!("must be 'overwrite' or 'reuse', got '{value}'"),
        }),
    }
}

fn parse_domain_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|d| d.trim().trim_start_matches("www.").to_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}
