//! Pipeline configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lock row key for the instant-message job
pub const DEFAULT_JOB_NAME: &str = "instantMessage";

/// Task label recorded on the lock row
pub const TASK_NAME: &str = "handleInstantMessage";

/// Shortest accepted run interval
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Broadcast pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BroadcastConfig {
    /// Time between scheduled runs
    #[serde(
        serialize_with = "duration_millis::serialize",
        deserialize_with = "duration_millis::deserialize_interval"
    )]
    pub poll_interval: Duration,

    /// Maximum age of a notification before it is deleted
    #[serde(with = "duration_millis")]
    pub retention: Duration,

    /// Lock row key shared by every worker running this job
    pub job_name: String,

    /// Identity recorded as the lock holder
    pub worker_id: String,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5000),
            retention: Duration::from_millis(60_000),
            job_name: DEFAULT_JOB_NAME.to_string(),
            worker_id: format!("worker-{}", Uuid::now_v7()),
        }
    }
}

impl BroadcastConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `BROADCAST_POLL_INTERVAL_MS`: Run interval (default: 5000)
    /// - `BROADCAST_RETENTION_MS`: Notification retention (default: 60000)
    /// - `BROADCAST_JOB_NAME`: Lock key (default: "instantMessage")
    /// - `WORKER_ID`: Lock holder identity (default: "worker-{uuid}")
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let poll_interval = std::env::var("BROADCAST_POLL_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval);

        let retention = std::env::var("BROADCAST_RETENTION_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.retention);

        Self {
            poll_interval,
            retention,
            job_name: std::env::var("BROADCAST_JOB_NAME").unwrap_or(defaults.job_name),
            worker_id: std::env::var("WORKER_ID").unwrap_or(defaults.worker_id),
        }
    }

    /// Set the run interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Set the notification retention window
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Set the lock key
    pub fn with_job_name(mut self, job_name: impl Into<String>) -> Self {
        self.job_name = job_name.into();
        self
    }

    /// Set the worker ID
    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    /// Retention as a signed duration for timestamp arithmetic
    pub fn retention_window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.retention.as_millis().min(i64::MAX as u128 / 1000) as i64)
    }
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }

    /// Like [`deserialize`], raised to [`super::MIN_POLL_INTERVAL`]
    pub fn deserialize_interval<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(deserialize(deserializer)?.max(super::MIN_POLL_INTERVAL))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BroadcastConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.retention, Duration::from_secs(60));
        assert_eq!(config.job_name, "instantMessage");
        assert!(config.worker_id.starts_with("worker-"));
        assert_eq!(config.retention_window(), chrono::Duration::seconds(60));
    }

    #[test]
    fn test_config_builder() {
        let config = BroadcastConfig::new()
            .with_poll_interval(Duration::from_millis(250))
            .with_retention(Duration::from_secs(30))
            .with_job_name("instantMessage-test")
            .with_worker_id("worker-1");

        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.retention, Duration::from_secs(30));
        assert_eq!(config.job_name, "instantMessage-test");
        assert_eq!(config.worker_id, "worker-1");
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let config = BroadcastConfig::new().with_poll_interval(Duration::ZERO);
        assert_eq!(config.poll_interval, Duration::from_millis(1));
    }

    #[test]
    fn test_zero_poll_interval_is_clamped_on_deserialize() {
        let config: BroadcastConfig = serde_json::from_value(serde_json::json!({
            "poll_interval": 0,
            "retention": 0,
            "job_name": "instantMessage",
            "worker_id": "w"
        }))
        .unwrap();

        assert_eq!(config.poll_interval, MIN_POLL_INTERVAL);
        assert_eq!(config.retention, Duration::ZERO);
    }

    #[test]
    fn test_config_serializes_millis() {
        let config = BroadcastConfig::new().with_worker_id("w");
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["poll_interval"], 5000);
        assert_eq!(value["retention"], 60000);

        let parsed: BroadcastConfig = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, config);
    }
}
