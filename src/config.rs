use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Upstream feed connection settings
    pub feed: FeedConfig,
    /// Poll loop configuration
    #[serde(default)]
    pub poll: PollConfig,
    /// Allowed CORS origins. Required unless cors_permissive is true.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Explicitly allow all origins (development only). Defaults to false.
    #[serde(default)]
    pub cors_permissive: bool,
}

/// Connection settings for the upstream bus position feed
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Base URL of the feed endpoint
    pub endpoint: String,
    /// Routes to poll each cycle (e.g. "701X", "71", "N6")
    pub routes: Vec<String>,
    /// Wire format the endpoint speaks (default: route_stations)
    #[serde(default)]
    pub format: WireFormat,
    /// Optional API key authentication
    #[serde(default)]
    pub auth: Option<FeedAuth>,
    /// Timeout in seconds for a single fetch (default: 30)
    #[serde(default = "FeedConfig::default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl FeedConfig {
    fn default_fetch_timeout_secs() -> u64 {
        30
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Payload layout served by the upstream endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// Flat JSON array of vehicle position objects
    Positions,
    /// Nested station list with per-station vehicle entries (DSAT-style)
    #[default]
    RouteStations,
}

/// Upstream authentication, applied to every fetch
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedAuth {
    /// API key sent as an HTTP header
    ApiKeyHeader { header: String, key: String },
    /// API key appended as a URL query parameter
    UrlParam { param: String, key: String },
}

/// Configuration for the snapshot collection loop
#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// Interval in seconds between poll cycles (default: 60)
    #[serde(default = "PollConfig::default_interval_secs")]
    pub interval_secs: u64,
    /// Ceiling in seconds for the failure backoff (default: 900)
    #[serde(default = "PollConfig::default_max_backoff_secs")]
    pub max_backoff_secs: u64,
    /// Number of superseded snapshots kept as trailing history (default: 30)
    #[serde(default = "PollConfig::default_history_capacity")]
    pub history_capacity: usize,
    /// Consecutive failures before the staleness alarm is raised (default: 5)
    #[serde(default = "PollConfig::default_failure_alarm_threshold")]
    pub failure_alarm_threshold: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: Self::default_interval_secs(),
            max_backoff_secs: Self::default_max_backoff_secs(),
            history_capacity: Self::default_history_capacity(),
            failure_alarm_threshold: Self::default_failure_alarm_threshold(),
        }
    }
}

impl PollConfig {
    fn default_interval_secs() -> u64 {
        60
    }
    fn default_max_backoff_secs() -> u64 {
        900
    }
    fn default_history_capacity() -> usize {
        30
    }
    fn default_failure_alarm_threshold() -> u32 {
        5
    }

    pub fn base_interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Reject configurations the collector cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.endpoint.is_empty() {
            return Err(ConfigError::Invalid("feed.endpoint must not be empty".into()));
        }
        if self.feed.routes.is_empty() {
            return Err(ConfigError::Invalid(
                "feed.routes must list at least one route".into(),
            ));
        }
        if self.poll.interval_secs == 0 {
            return Err(ConfigError::Invalid("poll.interval_secs must be >= 1".into()));
        }
        if self.poll.max_backoff_secs < self.poll.interval_secs {
            return Err(ConfigError::Invalid(
                "poll.max_backoff_secs must be >= poll.interval_secs".into(),
            ));
        }
        if self.poll.history_capacity == 0 {
            return Err(ConfigError::Invalid(
                "poll.history_capacity must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}
