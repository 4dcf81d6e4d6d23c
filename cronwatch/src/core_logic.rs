use crate::{
    config::AppConfig,
    config_manager::ConfigManager,
    event_bus,
    monitor::{exit_monitor::ExitMonitor, journal_monitor::JournalMonitor, Monitor},
    service_manager::ServiceManager,
    signal_handler::{SignalEvent, SignalHandler},
    utils,
};
use anyhow::Result;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

pub fn async_runtime(app_config: Arc<RwLock<AppConfig>>, config_path: PathBuf) {
    println!("Async runtime: Starting cron job monitoring");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(4)
        .thread_name("cronwatch")
        .build()
    {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Async runtime: Error from {}", e);
            std::process::exit(1);
        }
    };

    rt.block_on(async {
        if let Err(e) = daemon_core_logic(app_config, config_path).await {
            error!("Core logic error: {}", e);
            std::process::exit(1);
        }
    });
}

async fn daemon_core_logic(config: Arc<RwLock<AppConfig>>, config_path: PathBuf) -> Result<()> {
    info!("Application Core Logic: Starting up and initializing components...");

    // 1. 创建事件总线：monitors -> job tracker
    let event_sender = event_bus::create_event_sender();
    info!("Application Core Logic: Event bus created.");

    // 2. 配置管理器
    let config_manager = ConfigManager::new(Arc::clone(&config), config_path);

    // 启动时提示 cron 守护进程是否可见，方便排查"为什么一条都没抓到"
    match utils::find_cron_daemon_pid() {
        Some(pid) => debug!("Cron daemon visible at pid {}.", pid),
        None => warn!(
            "No cron daemon (cron/crond) visible on this system; the probe will stay idle until one starts."
        ),
    }

    // 3. 启动持久性后台服务（事件消费端）
    ServiceManager::spawn_persistent_services(&event_sender, &config);
    info!("Application Core Logic: Persistent services started.");

    // 4. 加载探针。挂接失败（老内核、缺权限、BTF 不匹配）不致命，
    //    降级为仅 journal 监控，跟原始 agent 的行为一致
    let mut exit_monitor = {
        let config_guard = config.read().await;
        match ExitMonitor::new(&config_guard.probe, event_sender.clone()).await {
            Ok(monitor) => Some(monitor),
            Err(e) => {
                warn!(
                    "eBPF probe unavailable: {:#}. Exit-code capture disabled, falling back to journal-only monitoring.",
                    e
                );
                None
            }
        }
    };

    // 5. journal 扫描
    {
        let config_guard = config.read().await;
        if config_guard.cron.enabled {
            let journal_monitor =
                JournalMonitor::new(Arc::clone(&config), event_sender.clone());
            info!(
                "Application Core Logic: Spawning monitor '{}'.",
                journal_monitor.name()
            );
            tokio::spawn(journal_monitor.run());
        } else {
            info!("Application Core Logic: Cron monitoring disabled by config.");
        }
    }

    // 6. 主事件循环 - 等待信号并处理
    loop {
        match SignalHandler::wait_for_signal().await? {
            SignalEvent::ConfigReload => {
                info!("Core Logic: Processing configuration reload...");
                // 换入新配置；tracker 和 journal 扫描每轮现读配置，
                // 下一个事件/扫描周期自动生效
                if let Err(e) = config_manager.reload_config().await {
                    error!("Core Logic: Failed to reload config: {}", e);
                }
            }
            SignalEvent::Shutdown => {
                info!("Core Logic: Initiating graceful shutdown...");
                break;
            }
        }
    }

    // 7. 关闭
    if let Some(monitor) = exit_monitor.as_mut() {
        monitor.shutdown().await;
    }
    info!("Application Core Logic: Shutdown completed.");

    // 8. 确保进程正确退出
    info!("Application Core Logic: Exiting process...");
    std::process::exit(0);
}
