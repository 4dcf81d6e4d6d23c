use crate::{
    config::AppConfig,
    event_bus::CronEvent,
    subscriber::{job_tracker::JobTracker, Subscriber},
};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{self, Duration};
use tracing::{error, info, warn};

/// 巡检周期：失败告警、超时检查、过期状态清理都挂在这个定时器上
const SWEEP_INTERVAL_SECS: u64 = 30;

/// 服务管理器，负责管理持久性后台任务
pub struct ServiceManager;

impl ServiceManager {
    /// 启动所有持久性后台服务
    pub fn spawn_persistent_services(
        event_sender: &broadcast::Sender<CronEvent>,
        config: &Arc<RwLock<AppConfig>>,
    ) {
        Self::spawn_job_tracker(event_sender, config);
    }

    /// 启动任务跟踪服务：消费事件总线并周期性巡检
    fn spawn_job_tracker(
        event_sender: &broadcast::Sender<CronEvent>,
        config: &Arc<RwLock<AppConfig>>,
    ) {
        let mut tracker_receiver = event_sender.subscribe();
        let tracker_config = Arc::clone(config);

        tokio::spawn(async move {
            let mut tracker = JobTracker::new(tracker_config).await;
            info!("ServiceManager: JobTracker service started.");
            let mut sweep_interval = time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));

            loop {
                tokio::select! {
                    received = tracker_receiver.recv() => match received {
                        Ok(event) => {
                            tracker.handle_event(event).await;
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(
                                "ServiceManager: JobTracker lagged, missed {} events",
                                n
                            );
                        }
                        Err(_) => {
                            error!("ServiceManager: JobTracker event channel closed, exiting.");
                            break;
                        }
                    },
                    _ = sweep_interval.tick() => {
                        tracker.sweep_and_report().await;
                    }
                }
            }
        });
    }
}
