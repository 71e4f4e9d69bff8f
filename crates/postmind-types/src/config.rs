//! Runtime configuration for the Postmind session core.
//!
//! `CoreConfig` represents the `config.toml` that controls queue bounds,
//! rate limits, retention caps, and background task cadence.

use serde::{Deserialize, Serialize};

/// Tunables for the session core.
///
/// Loaded from `{data_dir}/config.toml`. All fields have sensible defaults,
/// so a missing file or a partial file both work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Bounded request queue capacity.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Max requests per session within the rolling rate window.
    #[serde(default = "default_max_requests_per_minute")]
    pub max_requests_per_minute: u32,

    /// How long `enqueue` waits on a full queue before failing, in seconds.
    #[serde(default = "default_enqueue_timeout_secs")]
    pub enqueue_timeout_secs: u64,

    /// Per-connection send timeout, in seconds. A send that exceeds this is
    /// treated as a dead connection.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,

    /// Max chat messages retained per session; oldest are evicted on write.
    #[serde(default = "default_history_cap")]
    pub history_cap: u32,

    /// Max draft snapshots retained per session.
    #[serde(default = "default_draft_history_cap")]
    pub draft_history_cap: usize,

    /// Reaper pass cadence, in seconds.
    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,

    /// Connections idle longer than this are reaped, in minutes.
    #[serde(default = "default_idle_timeout_minutes")]
    pub idle_timeout_minutes: i64,

    /// Sessions inactive longer than this fail validation, in hours.
    #[serde(default = "default_max_inactivity_hours")]
    pub max_inactivity_hours: i64,

    /// Session cleanup cadence, in hours.
    #[serde(default = "default_cleanup_interval_hours")]
    pub cleanup_interval_hours: u64,

    /// Sessions inactive longer than this are deleted by cleanup, in days.
    #[serde(default = "default_session_retention_days")]
    pub session_retention_days: i64,

    /// Messages older than this are removed by the retention sweep, in days.
    #[serde(default = "default_message_retention_days")]
    pub message_retention_days: i64,
}

fn default_queue_capacity() -> usize {
    100
}

fn default_max_requests_per_minute() -> u32 {
    20
}

fn default_enqueue_timeout_secs() -> u64 {
    5
}

fn default_send_timeout_secs() -> u64 {
    5
}

fn default_history_cap() -> u32 {
    500
}

fn default_draft_history_cap() -> usize {
    10
}

fn default_reaper_interval_secs() -> u64 {
    300
}

fn default_idle_timeout_minutes() -> i64 {
    30
}

fn default_max_inactivity_hours() -> i64 {
    24
}

fn default_cleanup_interval_hours() -> u64 {
    24
}

fn default_session_retention_days() -> i64 {
    7
}

fn default_message_retention_days() -> i64 {
    30
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_requests_per_minute: default_max_requests_per_minute(),
            enqueue_timeout_secs: default_enqueue_timeout_secs(),
            send_timeout_secs: default_send_timeout_secs(),
            history_cap: default_history_cap(),
            draft_history_cap: default_draft_history_cap(),
            reaper_interval_secs: default_reaper_interval_secs(),
            idle_timeout_minutes: default_idle_timeout_minutes(),
            max_inactivity_hours: default_max_inactivity_hours(),
            cleanup_interval_hours: default_cleanup_interval_hours(),
            session_retention_days: default_session_retention_days(),
            message_retention_days: default_message_retention_days(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = CoreConfig::default();
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.max_requests_per_minute, 20);
        assert_eq!(config.enqueue_timeout_secs, 5);
        assert_eq!(config.history_cap, 500);
        assert_eq!(config.draft_history_cap, 10);
        assert_eq!(config.reaper_interval_secs, 300);
        assert_eq!(config.idle_timeout_minutes, 30);
        assert_eq!(config.session_retention_days, 7);
    }

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: CoreConfig = toml::from_str("").unwrap();
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.max_requests_per_minute, 20);
    }

    #[test]
    fn test_deserialize_partial_overrides() {
        let config: CoreConfig = toml::from_str(
            r#"
queue_capacity = 50
max_requests_per_minute = 5
idle_timeout_minutes = 10
"#,
        )
        .unwrap();
        assert_eq!(config.queue_capacity, 50);
        assert_eq!(config.max_requests_per_minute, 5);
        assert_eq!(config.idle_timeout_minutes, 10);
        // Untouched fields keep defaults
        assert_eq!(config.history_cap, 500);
        assert_eq!(config.draft_history_cap, 10);
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = CoreConfig {
            queue_capacity: 64,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: CoreConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.queue_capacity, 64);
        assert_eq!(parsed.history_cap, 500);
    }
}
