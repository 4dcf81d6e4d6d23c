use crate::config::AppConfig;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

// 配置管理器，负责配置的加载和热更新。
// JobTracker 和 JournalMonitor 每次用到 cron 配置时都从共享配置现读，
// 所以 SIGHUP 换入新配置后下一轮扫描/事件就会生效。
pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
    config_path: std::path::PathBuf,
}

impl ConfigManager {
    pub fn new(config: Arc<RwLock<AppConfig>>, config_path: std::path::PathBuf) -> Self {
        Self {
            config,
            config_path,
        }
    }

    // 重新加载配置文件
    pub async fn reload_config(&self) -> Result<()> {
        info!(
            "ConfigManager: Reloading configuration from {:?}",
            self.config_path
        );
        // 先加载到临时变量，避免持锁期间做IO
        let load_start = std::time::Instant::now();
        let load_result = AppConfig::load_from_file(&self.config_path);
        debug!(
            elapsed_ms = load_start.elapsed().as_millis() as u64,
            "ConfigManager: load_from_file completed"
        );

        match load_result {
            Ok(new_config) => {
                let mut config_guard = self.config.write().await;
                *config_guard = new_config;
                info!("ConfigManager: Configuration reloaded successfully.");
                Ok(())
            }
            Err(e) => {
                error!("ConfigManager: Failed to reload configuration: {}", e);
                Err(anyhow::anyhow!("Failed to reload configuration: {}", e))
            }
        }
    }
}
