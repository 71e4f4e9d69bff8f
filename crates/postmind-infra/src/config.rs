//! Configuration loader for the Postmind session core.
//!
//! Reads `config.toml` from the data directory and deserializes it into
//! [`CoreConfig`]. Falls back to defaults when the file is missing or
//! malformed.

use std::path::Path;

use postmind_types::config::CoreConfig;

/// Load core configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`CoreConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the
///   default.
/// - If the file exists and parses successfully, returns the parsed config
///   (missing fields keep their defaults).
pub async fn load_config(data_dir: &Path) -> CoreConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                "No config.toml found at {}, using defaults",
                config_path.display()
            );
            return CoreConfig::default();
        }
        Err(err) => {
            tracing::warn!(
                "Failed to read {}: {err}, using defaults",
                config_path.display()
            );
            return CoreConfig::default();
        }
    };

    match toml::from_str::<CoreConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            CoreConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).await;
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.max_requests_per_minute, 20);
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        tokio::fs::write(
            &config_path,
            r#"
queue_capacity = 32
max_requests_per_minute = 10
idle_timeout_minutes = 15
"#,
        )
        .await
        .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.queue_capacity, 32);
        assert_eq!(config.max_requests_per_minute, 10);
        assert_eq!(config.idle_timeout_minutes, 15);
        // Untouched fields keep defaults
        assert_eq!(config.history_cap, 500);
    }

    #[tokio::test]
    async fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        tokio::fs::write(&config_path, "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.queue_capacity, 100);
    }
}
