// Config loading and validation tests

use netscope::config::AppConfig;
use netscope::interfaces::InterfaceScope;

const VALID_CONFIG: &str = r#"
[server]
port = 8081
host = "0.0.0.0"

[database]
path = "data/netscope.db"
flush_rate = 10
retention_days = 7

[monitoring]
tick_interval_secs = 3
window_secs = 600
interface_scope = "primary"
stats_log_interval_secs = 60

[latency]
targets = ["1.1.1.1:53"]
timeout_ms = 800

[benchmark]
enabled = true
period_secs = 900

[publishing]
broadcast_capacity = 60
"#;

#[test]
fn test_config_loads_from_str() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.server.port, 8081);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.database.path, "data/netscope.db");
    assert_eq!(config.database.flush_rate, 10);
    assert_eq!(config.database.retention_days, 7);
    assert_eq!(config.monitoring.tick_interval_secs, 3);
    assert_eq!(config.monitoring.window_secs, 600);
    assert_eq!(config.monitoring.interface_scope, InterfaceScope::Primary);
    assert_eq!(config.latency.targets, vec!["1.1.1.1:53".to_string()]);
    assert_eq!(config.benchmark.period_secs, 900);
    assert_eq!(config.publishing.broadcast_capacity, 60);
}

#[test]
fn test_config_defaults_for_optional_sections() {
    let minimal = r#"
[server]
port = 8081
host = "127.0.0.1"

[database]
path = "netscope.db"
"#;
    let config = AppConfig::load_from_str(minimal).expect("load_from_str");
    assert_eq!(config.monitoring.tick_interval_secs, 1);
    assert_eq!(config.monitoring.interface_scope, InterfaceScope::All);
    assert_eq!(config.latency.targets.len(), 3);
    assert!(config.latency.timeout_ms < 1000);
    assert_eq!(config.benchmark.period_secs, 300);
    assert_eq!(config.benchmark.timeout_secs, 120);
    assert_eq!(config.benchmark.command, "speedtest-cli");
    assert_eq!(config.geo.url, "https://ipinfo.io/json");
    assert_eq!(config.geo.timeout_secs, 5);
    assert!(config.database.vacuum_schedule.is_none());
    let settings = config.monitor_settings();
    assert_eq!(settings.tick_interval_secs, 1);
    assert_eq!(settings.window_secs, 300);
}

#[test]
fn test_config_validation_rejects_invalid_port() {
    let bad = VALID_CONFIG.replace("port = 8081", "port = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("server.port"));
}

#[test]
fn test_config_validation_rejects_empty_db_path() {
    let bad = VALID_CONFIG.replace("path = \"data/netscope.db\"", "path = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("database.path"));
}

#[test]
fn test_config_validation_rejects_flush_rate_zero() {
    let bad = VALID_CONFIG.replace("flush_rate = 10", "flush_rate = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("flush_rate"));
}

#[test]
fn test_config_validation_rejects_unselectable_tick_interval() {
    let bad = VALID_CONFIG.replace("tick_interval_secs = 3", "tick_interval_secs = 2");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("monitoring.tick_interval_secs"));
}

#[test]
fn test_config_validation_rejects_unselectable_window() {
    let bad = VALID_CONFIG.replace("window_secs = 600", "window_secs = 120");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("monitoring.window_secs"));
}

#[test]
fn test_config_validation_rejects_probe_timeout_of_a_second() {
    let bad = VALID_CONFIG.replace("timeout_ms = 800", "timeout_ms = 1000");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("latency.timeout_ms"));
}

#[test]
fn test_config_validation_rejects_empty_latency_targets() {
    let bad = VALID_CONFIG.replace("targets = [\"1.1.1.1:53\"]", "targets = []");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("latency.targets"));
}

#[test]
fn test_config_validation_rejects_invalid_vacuum_cron() {
    let bad = VALID_CONFIG.replace(
        "retention_days = 7",
        "retention_days = 7\nvacuum_schedule = \"not a cron\"",
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("database.vacuum_schedule"));

    let ok = VALID_CONFIG.replace(
        "retention_days = 7",
        "retention_days = 7\nvacuum_schedule = \"0 0 3 * * *\"",
    );
    assert!(AppConfig::load_from_str(&ok).is_ok());
}

#[test]
fn test_config_retention_zero_means_forever() {
    let cfg = VALID_CONFIG.replace("retention_days = 7", "retention_days = 0");
    let config = AppConfig::load_from_str(&cfg).expect("retention 0 is valid");
    assert_eq!(config.database.retention_days, 0);
}

#[test]
fn test_config_disabled_benchmark_skips_benchmark_checks() {
    let cfg = VALID_CONFIG.replace(
        "enabled = true\nperiod_secs = 900",
        "enabled = false\nperiod_secs = 0",
    );
    assert!(AppConfig::load_from_str(&cfg).is_ok());
}

#[test]
fn test_config_validation_rejects_broadcast_capacity_zero() {
    let bad = VALID_CONFIG.replace("broadcast_capacity = 60", "broadcast_capacity = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("broadcast_capacity"));
}
