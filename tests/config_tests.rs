use capacity_planner::{AllocationStatus, ConfigError, Planner, PlannerConfig, ThresholdTier};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

#[test]
fn defaults_are_valid() {
    let config = PlannerConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.default_window_days, 14);
    assert_eq!(config.rag_amber_buffer, 3.0);
    assert_eq!(config.thresholds.tiers.len(), 3);
}

#[test]
fn partial_file_keeps_defaults_for_missing_keys() {
    let file = write_config(r#"{ "http_addr": "127.0.0.1:8080", "rag_amber_buffer": 2 }"#);
    let config = PlannerConfig::from_file(file.path()).unwrap();
    assert_eq!(config.http_addr, "127.0.0.1:8080");
    assert_eq!(config.rag_amber_buffer, 2.0);
    assert_eq!(config.default_window_days, 14);
    assert_eq!(config.thresholds, PlannerConfig::default().thresholds);
}

#[test]
fn custom_threshold_table_drives_the_planner() {
    let file = write_config(
        r#"{
            "thresholds": {
                "tiers": [
                    { "above": 100, "status": "Overallocated" },
                    { "above": 75, "status": "Full" }
                ],
                "fallback": "Balanced"
            }
        }"#,
    );
    let config = PlannerConfig::from_file(file.path()).unwrap();
    let planner = Planner::from_config(&config);
    assert_eq!(planner.thresholds().classify(101.0), AllocationStatus::Overallocated);
    assert_eq!(planner.thresholds().classify(80.0), AllocationStatus::Full);
    assert_eq!(planner.thresholds().classify(10.0), AllocationStatus::Balanced);
}

#[test]
fn unordered_thresholds_are_rejected() {
    let mut config = PlannerConfig::default();
    config.thresholds.tiers.push(ThresholdTier {
        above: 95.0,
        status: AllocationStatus::Full,
    });
    assert!(matches!(config.validate(), Err(ConfigError::Thresholds(_))));
}

#[test]
fn negative_window_is_rejected() {
    let file = write_config(r#"{ "default_window_days": -1 }"#);
    let err = PlannerConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Setting { name: "default_window_days", .. }));
}

#[test]
fn oversized_window_is_rejected() {
    let file = write_config(r#"{ "default_window_days": 1000000000000000 }"#);
    let err = PlannerConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Setting { name: "default_window_days", .. }));
    assert!(err.to_string().contains("at most"));

    let mut config = PlannerConfig::default();
    config.default_window_days = capacity_planner::config::MAX_WINDOW_DAYS;
    assert!(config.validate().is_ok());
}

#[test]
fn unreadable_and_malformed_files_report_the_path() {
    let err = PlannerConfig::from_file("/definitely/not/here.json").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("/definitely/not/here.json"));

    let file = write_config("{ not json");
    assert!(matches!(
        PlannerConfig::from_file(file.path()).unwrap_err(),
        ConfigError::Parse { .. }
    ));
}
