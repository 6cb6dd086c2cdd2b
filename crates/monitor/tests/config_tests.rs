//! Integration tests for configuration parsing
//!
//! Tests monitor configuration files, including:
//! - Full and partial files with defaulted sections
//! - Save/load round trip through a temporary directory
//! - Invalid configuration handling

use monitor::config::{MonitorConfig, RetentionSettings};
use std::time::Duration;
use tempfile::tempdir;

mod monitor_config {
    use super::*;

    const FULL_CONFIG: &str = r#"
[monitor]
poll_interval_secs = 5
log_level = "debug"

[eject]
retry_delay_ms = 250

[retention]
max_events = 50
max_failures = 10
"#;

    #[test]
    fn test_parse_full_config() {
        let config: MonitorConfig = toml::from_str(FULL_CONFIG).unwrap();

        assert_eq!(config.monitor.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.monitor.log_level, "debug");
        assert_eq!(config.eject.retry_delay(), Duration::from_millis(250));
        assert_eq!(config.retention.max_events, 50);
        assert_eq!(config.retention.max_failures, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: MonitorConfig = toml::from_str("[eject]\nretry_delay_ms = 0\n").unwrap();

        assert_eq!(config.monitor.poll_interval_secs, 3);
        assert_eq!(config.monitor.log_level, "info");
        assert_eq!(config.eject.retry_delay_ms, 0);
        assert_eq!(config.retention, RetentionSettings::default());
    }

    #[test]
    fn test_empty_file_is_default() {
        let config: MonitorConfig = toml::from_str("").unwrap();
        assert_eq!(config, MonitorConfig::default());
    }

    #[test]
    fn test_unbounded_retention() {
        let config: MonitorConfig =
            toml::from_str("[retention]\nmax_events = 0\nmax_failures = 0\n").unwrap();
        assert_eq!(config.retention, RetentionSettings::unbounded());
    }
}

// ============================================================================
// File handling
// ============================================================================

mod config_files {
    use super::*;

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("monitor.toml");

        let mut config = MonitorConfig::default();
        config.monitor.poll_interval_secs = 10;
        config.retention.max_events = 5;
        config.save(&path).unwrap();

        let loaded = MonitorConfig::load(Some(path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempdir().unwrap();
        let err = MonitorConfig::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("monitor.toml");
        std::fs::write(&path, "[monitor\npoll_interval_secs = 3").unwrap();

        let err = MonitorConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_load_rejects_invalid_log_level() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("monitor.toml");
        std::fs::write(&path, "[monitor]\nlog_level = \"verbose\"\n").unwrap();

        let err = MonitorConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid log level 'verbose'"));
    }

    #[test]
    fn test_load_rejects_zero_interval() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("monitor.toml");
        std::fs::write(&path, "[monitor]\npoll_interval_secs = 0\n").unwrap();

        let err = MonitorConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("poll_interval_secs"));
    }
}
