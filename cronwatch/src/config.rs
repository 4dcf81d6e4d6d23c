use crate::daemon_handler::DaemonConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

// 顶层配置结构体

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[allow(dead_code)] // Reserved for future use
    pub log_level: Option<String>,
    pub log_directory: Option<PathBuf>,
    pub pid_file_directory: Option<PathBuf>,
    pub working_directory: Option<PathBuf>,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub cron: CronConfig,
    pub report: Option<ReportConfig>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ProbeConfig {
    /// 外部编译的 BPF 对象路径；不设置时使用内嵌对象
    #[serde(default)]
    pub object_path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CronConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 关闭后只跟踪 timeouts/ignore 里出现过的命令（白名单模式）
    #[serde(default = "default_true")]
    pub auto_discover: bool,
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
    /// journal 扫描间隔
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// 全局超时（秒），0 表示不做长时间运行检查
    #[serde(default)]
    pub global_timeout_secs: u64,
    /// 按命令覆盖的超时
    #[serde(default)]
    pub timeouts: HashMap<String, u64>,
    /// 按命令忽略的退出码
    #[serde(default)]
    pub ignore: HashMap<String, Vec<i32>>,
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_discover: true,
            log_path: default_log_path(),
            interval_secs: default_interval_secs(),
            global_timeout_secs: 0,
            timeouts: HashMap::new(),
            ignore: HashMap::new(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ReportConfig {
    /// dashboard 的事件上报地址
    pub endpoint: String,
    pub server_id: String,
    pub api_secret: String,
}

fn default_true() -> bool {
    true
}
fn default_log_path() -> PathBuf {
    PathBuf::from("/var/log/syslog")
}
fn default_interval_secs() -> u64 {
    10
}

impl CronConfig {
    /// 某命令的某退出码是否被配置忽略
    pub fn is_ignored(&self, command: &str, exit_code: i32) -> bool {
        self.ignore
            .get(command)
            .map(|codes| codes.contains(&exit_code))
            .unwrap_or(false)
    }

    /// 某命令生效的超时秒数；0 表示不检查
    pub fn timeout_for(&self, command: &str) -> u64 {
        self.timeouts
            .get(command)
            .copied()
            .unwrap_or(self.global_timeout_secs)
    }

    /// 白名单模式下命令是否在名单里
    pub fn is_listed(&self, command: &str) -> bool {
        self.timeouts.contains_key(command) || self.ignore.contains_key(command)
    }
}

impl AppConfig {
    pub fn load_from_file(config_file_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let config_content = fs::read_to_string(config_file_path)?;
        let loaded_config: AppConfig = serde_yaml::from_str(&config_content)?;
        Ok(loaded_config)
    }

    pub fn to_daemonize_config(&self) -> DaemonConfig {
        DaemonConfig {
            pid_file: self
                .pid_file_directory
                .as_ref()
                .map(|pid_file| pid_file.join("cronwatch.pid"))
                .unwrap_or_else(|| PathBuf::from("/tmp/cronwatch.pid")),
            log_directory: self
                .log_directory
                .clone()
                .unwrap_or_else(|| PathBuf::from("/tmp/cronwatch")),
            working_dir: self
                .working_directory
                .clone()
                .unwrap_or_else(|| PathBuf::from("/")),
        }
    }
}
