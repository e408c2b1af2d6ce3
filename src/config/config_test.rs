use serial_test::serial;
use temp_env::with_vars;

use super::*;
use crate::Error;

fn cleanup_all_multiwatcher_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("MULTIWATCHER__") || key == "CONFIG_PATH" {
            std::env::remove_var(&key);
        }
    }
}

#[test]
#[serial]
fn default_config_should_initialize_with_hardcoded_values() {
    let config = MultiwatcherConfig::default();

    assert_eq!(config.watcher.request_queue_size, 1024);
    assert_eq!(config.watcher.max_pending_requests, 8);
    assert!(config.aggregator.enable_metrics);
    assert_eq!(config.aggregator.max_consecutive_changes, 128);
}

#[test]
#[serial]
fn new_should_merge_environment_overrides() {
    cleanup_all_multiwatcher_env_vars();
    with_vars(
        vec![
            ("MULTIWATCHER__WATCHER__MAX_PENDING_REQUESTS", Some("3")),
            ("MULTIWATCHER__AGGREGATOR__ENABLE_METRICS", Some("false")),
            ("MULTIWATCHER__AGGREGATOR__MAX_CONSECUTIVE_CHANGES", Some("16")),
        ],
        || {
            let config = MultiwatcherConfig::new().unwrap();

            assert_eq!(config.watcher.max_pending_requests, 3);
            assert_eq!(config.watcher.request_queue_size, 1024);
            assert!(!config.aggregator.enable_metrics);
            assert_eq!(config.aggregator.max_consecutive_changes, 16);
        },
    );
}

#[test]
#[serial]
fn new_should_load_file_from_config_path() {
    cleanup_all_multiwatcher_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("multiwatcher.toml");
    std::fs::write(
        &config_path,
        r#"
        [watcher]
        request_queue_size = 16
        "#,
    )
    .unwrap();

    with_vars(vec![("CONFIG_PATH", Some(config_path.to_str().unwrap()))], || {
        let config = MultiwatcherConfig::new().unwrap();
        assert_eq!(config.watcher.request_queue_size, 16);
        assert_eq!(config.watcher.max_pending_requests, 8);
    });
}

#[test]
#[serial]
fn with_override_config_should_merge_file_settings() {
    cleanup_all_multiwatcher_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("override.toml");
    std::fs::write(
        &config_path,
        r#"
        [watcher]
        max_pending_requests = 2

        [aggregator]
        enable_metrics = false
        "#,
    )
    .unwrap();

    let empty_vars: Vec<(&str, Option<&str>)> = vec![];
    with_vars(empty_vars, || {
        let base_config = MultiwatcherConfig::new().expect("success");
        let config = base_config
            .with_override_config(config_path.to_str().unwrap())
            .expect("override should load");

        assert_eq!(config.watcher.max_pending_requests, 2);
        assert_eq!(config.watcher.request_queue_size, 1024);
        assert!(!config.aggregator.enable_metrics);
    });
}

#[test]
#[serial]
fn environment_should_win_over_override_file() {
    cleanup_all_multiwatcher_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("override.toml");
    std::fs::write(&config_path, "[watcher]\nmax_pending_requests = 2\n").unwrap();

    with_vars(vec![("MULTIWATCHER__WATCHER__MAX_PENDING_REQUESTS", Some("5"))], || {
        let config = MultiwatcherConfig::default()
            .with_override_config(config_path.to_str().unwrap())
            .unwrap();
        assert_eq!(config.watcher.max_pending_requests, 5);
    });
}

#[test]
fn validation_should_reject_zero_sizes() {
    let mut config = MultiwatcherConfig::default();
    config.watcher.request_queue_size = 0;
    assert!(matches!(config.validate(), Err(Error::Config(_))));

    let mut config = MultiwatcherConfig::default();
    config.watcher.max_pending_requests = 0;
    assert!(matches!(config.validate(), Err(Error::Config(_))));

    let mut config = MultiwatcherConfig::default();
    config.aggregator.max_consecutive_changes = 0;
    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

#[test]
fn validation_should_accept_defaults() {
    assert!(MultiwatcherConfig::default().validate().is_ok());
}
