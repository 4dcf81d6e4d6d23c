use std::fs;
use std::sync::Arc;

use cronwatch::config::AppConfig;
use cronwatch::config_manager::ConfigManager;
use tokio::sync::RwLock;

const CONFIG_V1: &str = r#"
log_level: "info"
log_directory: "/tmp/cronwatch-tests/logs"
pid_file_directory: "/tmp/cronwatch-tests/pids"
working_directory: "/"

cron:
  enabled: true
  auto_discover: true
  interval_secs: 5
  global_timeout_secs: 30
  timeouts:
    "/usr/local/bin/backup.sh": 600
  ignore:
    "/bin/flaky.sh": [1, 75]

report:
  endpoint: "https://dashboard.example.com"
  server_id: "srv-0001"
  api_secret: "not-a-real-secret"
"#;

const CONFIG_V2: &str = r#"
log_level: "debug"
cron:
  enabled: true
  auto_discover: false
  global_timeout_secs: 120
"#;

#[test]
fn full_config_parses() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.yaml");
    fs::write(&path, CONFIG_V1).expect("write config");

    let config = AppConfig::load_from_file(&path).expect("config loads");
    assert!(config.cron.enabled);
    assert_eq!(config.cron.interval_secs, 5);
    assert_eq!(config.cron.timeout_for("/usr/local/bin/backup.sh"), 600);
    assert_eq!(config.cron.timeout_for("/anything/else"), 30);
    assert!(config.cron.is_ignored("/bin/flaky.sh", 75));
    assert!(!config.cron.is_ignored("/bin/flaky.sh", 2));
    assert!(!config.cron.is_ignored("/bin/other.sh", 75));

    let report = config.report.expect("report section parsed");
    assert_eq!(report.endpoint, "https://dashboard.example.com");
    assert_eq!(report.server_id, "srv-0001");
}

#[test]
fn minimal_config_uses_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.yaml");
    fs::write(&path, "{}\n").expect("write config");

    let config = AppConfig::load_from_file(&path).expect("empty config loads");
    assert!(config.cron.enabled);
    assert!(config.cron.auto_discover);
    assert_eq!(config.cron.global_timeout_secs, 0);
    assert!(config.report.is_none());
    assert!(config.probe.object_path.is_none());
}

#[tokio::test]
async fn sighup_reload_swaps_shared_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.yaml");
    fs::write(&path, CONFIG_V1).expect("write config");

    let initial = AppConfig::load_from_file(&path).expect("config loads");
    let shared = Arc::new(RwLock::new(initial));
    let manager = ConfigManager::new(Arc::clone(&shared), path.clone());

    fs::write(&path, CONFIG_V2).expect("rewrite config");
    manager.reload_config().await.expect("reload succeeds");

    let guard = shared.read().await;
    assert_eq!(guard.cron.global_timeout_secs, 120);
    assert!(!guard.cron.auto_discover);
    assert!(guard.report.is_none(), "removed sections disappear on reload");
}

#[tokio::test]
async fn broken_reload_keeps_previous_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.yaml");
    fs::write(&path, CONFIG_V1).expect("write config");

    let initial = AppConfig::load_from_file(&path).expect("config loads");
    let shared = Arc::new(RwLock::new(initial));
    let manager = ConfigManager::new(Arc::clone(&shared), path.clone());

    fs::write(&path, "cron: [this is not a mapping").expect("write broken config");
    assert!(manager.reload_config().await.is_err());

    let guard = shared.read().await;
    assert_eq!(guard.cron.global_timeout_secs, 30, "old config survives");
}
