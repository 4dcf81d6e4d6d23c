use super::Subscriber;
use crate::config::{AppConfig, CronConfig};
use crate::event_bus::CronEvent;
use crate::report::{ApiClient, CronAlert};
use crate::utils;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// 认领不到记录的探针退出事件保留这么久，等 journal 的启动行来认领
const ORPHAN_TTL_SECS: i64 = 60;
/// 超过这个时长没再执行过的任务从登记表清掉（覆盖每周任务和周末）
const STALE_JOB_RETENTION_SECS: i64 = 7 * 24 * 60 * 60;

/// 一个被跟踪的 cron 任务的最近状态
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub command: String,
    /// 正在运行的那次执行的 pid；0 表示没有在跑
    pub active_pid: u32,
    pub start_time: i64,
    pub last_exec_time: i64,
    pub last_exit_code: i32,
    pub last_error: String,
    pub last_duration: i64,
    pub failure_count: u32,
    /// 本次执行已经告警过，避免重复刷
    pub alert_sent: bool,
}

impl JobRecord {
    fn new(command: &str, now: i64) -> Self {
        Self {
            command: command.to_string(),
            active_pid: 0,
            start_time: now,
            last_exec_time: now,
            last_exit_code: 0,
            last_error: String::new(),
            last_duration: 0,
            failure_count: 0,
            alert_sent: false,
        }
    }
}

/// 探针先于 journal 看到的退出：按全局 pid 和 ns pid 两个键暂存
#[derive(Debug, Clone, Copy)]
struct OrphanExit {
    exit_code: i32,
    parent_pid: u32,
    ns_pid: u32,
    ns_parent_pid: u32,
    seen_at: i64,
}

/// 事件总线的消费端：把探针的退出事件和 journal 的启动记录按 pid
/// 汇合成任务状态，产出告警。
///
/// 探针报的 pid 可能是容器里的 ns pid，journal 记的是 CRON 进程自己的
/// pid（等于任务进程的父 pid），所以匹配时全局/父/ns/ns父四个 pid 都要
/// 试。两边到达顺序不定，先到的退出事件作为 orphan 暂存一分钟。
pub struct JobTracker {
    app_config: Arc<RwLock<AppConfig>>,
    reporter: Option<ApiClient>,
    jobs: HashMap<String, JobRecord>,
    orphaned_exits: HashMap<u32, OrphanExit>,
    last_sweep: i64,
}

impl JobTracker {
    pub async fn new(app_config: Arc<RwLock<AppConfig>>) -> Self {
        let reporter = {
            let config_guard = app_config.read().await;
            match &config_guard.report {
                Some(report_config) => match ApiClient::new(report_config.clone()) {
                    Ok(client) => Some(client),
                    Err(e) => {
                        warn!("[JobTracker] Alert reporter unavailable: {:#}. Alerts will be logged only.", e);
                        None
                    }
                },
                None => None,
            }
        };

        Self {
            app_config,
            reporter,
            jobs: HashMap::new(),
            orphaned_exits: HashMap::new(),
            last_sweep: Utc::now().timestamp(),
        }
    }

    pub fn tracked_jobs(&self) -> &HashMap<String, JobRecord> {
        &self.jobs
    }

    /// journal 里出现了一次任务启动
    pub fn observe_start(&mut self, cfg: &CronConfig, command: &str, pid: u32, now: i64) {
        // 白名单模式：只跟踪配置里点过名的命令
        if !cfg.auto_discover && !cfg.is_listed(command) {
            debug!(
                "[JobTracker] Auto-discover off, ignoring unlisted job '{}'.",
                command
            );
            return;
        }

        let record = self
            .jobs
            .entry(command.to_string())
            .or_insert_with(|| JobRecord::new(command, now));
        record.last_exec_time = now;
        record.start_time = now;
        record.active_pid = pid;

        // 探针的退出事件可能已经先到了，认领掉
        if let Some(orphan) = self.take_orphan_for_pid(pid) {
            let record = self.jobs.get_mut(command).expect("record just inserted");
            record.last_exit_code = orphan.exit_code;
            record.active_pid = 0; // 已经退出了
            if orphan.exit_code != 0 {
                record.failure_count += 1;
                record.last_error = format!(
                    "Cron job failed: {} - Process exited with code {} (captured via eBPF)",
                    command, orphan.exit_code
                );
                record.alert_sent = false;
            }
        }
    }

    /// 探针报告了一次被跟踪进程的退出
    pub fn observe_exit(
        &mut self,
        pid: u32,
        parent_pid: u32,
        ns_pid: u32,
        ns_parent_pid: u32,
        exit_code: i32,
        now: i64,
    ) {
        let mut matched = false;
        for record in self.jobs.values_mut() {
            if record.active_pid == 0 {
                continue;
            }
            // journal 记录的 pid 是 CRON 的（任务进程的父），容器里还可能
            // 只有 ns pid 对得上，四个都试
            let hit = record.active_pid == pid
                || record.active_pid == parent_pid
                || (ns_pid != 0 && record.active_pid == ns_pid)
                || (ns_parent_pid != 0 && record.active_pid == ns_parent_pid);
            if !hit {
                continue;
            }

            matched = true;
            record.last_exec_time = now;
            record.last_exit_code = exit_code;
            record.last_duration = now - record.start_time;
            record.active_pid = 0;
            record.alert_sent = false;
            if exit_code != 0 {
                record.failure_count += 1;
                record.last_error = format!(
                    "Process exited with code {} (captured via eBPF)",
                    exit_code
                );
            } else {
                record.failure_count = 0;
                record.last_error.clear();
            }
            break;
        }

        if !matched {
            let orphan = OrphanExit {
                exit_code,
                parent_pid,
                ns_pid,
                ns_parent_pid,
                seen_at: now,
            };
            // 全局 pid 和 ns pid 都能用来找回这条记录
            self.orphaned_exits.insert(pid, orphan);
            if ns_pid != 0 && ns_pid != pid {
                self.orphaned_exits.insert(ns_pid, orphan);
            }
        }
    }

    /// journal 里直接报告的失败（没有探针参与的老路径）
    pub fn note_failed_log(
        &mut self,
        cfg: &CronConfig,
        command: &str,
        exit_code: i32,
        now: i64,
    ) -> Option<CronAlert> {
        if cfg.is_ignored(command, exit_code) {
            return None;
        }
        let record = self
            .jobs
            .entry(command.to_string())
            .or_insert_with(|| JobRecord::new(command, now));
        record.last_exec_time = now;
        record.last_exit_code = exit_code;
        record.failure_count += 1;
        record.alert_sent = true;

        let description = utils::exit_code_description(exit_code);
        Some(CronAlert {
            kind: "cron_error",
            job_command: command.to_string(),
            exit_code,
            message: format!(
                "Cron job failed: {} - {} ({})",
                command, description, exit_code
            ),
            timestamp: now,
        })
    }

    /// 周期性巡检：产出失败/超时告警，清理过期状态
    pub fn sweep(&mut self, cfg: &CronConfig, now: i64) -> Vec<CronAlert> {
        let mut alerts = Vec::new();

        // 探针捕获到的失败，每次执行只报一次
        for record in self.jobs.values_mut() {
            if record.last_exit_code != 0 && !record.alert_sent {
                if cfg.is_ignored(&record.command, record.last_exit_code) {
                    record.alert_sent = true;
                    continue;
                }
                alerts.push(CronAlert {
                    kind: "cron_error",
                    job_command: record.command.clone(),
                    exit_code: record.last_exit_code,
                    message: if record.last_error.is_empty() {
                        format!(
                            "Cron job failed: {} - {} ({})",
                            record.command,
                            utils::exit_code_description(record.last_exit_code),
                            record.last_exit_code
                        )
                    } else {
                        record.last_error.clone()
                    },
                    timestamp: record.last_exec_time,
                });
                record.alert_sent = true;
            }
        }

        // 长时间运行检查
        for record in self.jobs.values_mut() {
            let timeout = cfg.timeout_for(&record.command);
            if timeout == 0 {
                continue;
            }
            if record.active_pid != 0 {
                let duration = now - record.start_time;
                if duration > timeout as i64 && !record.alert_sent {
                    alerts.push(CronAlert {
                        kind: "long_running",
                        job_command: record.command.clone(),
                        exit_code: -1,
                        message: format!(
                            "Long running cron job detected: {} (PID: {}) running for {}s (Timeout: {}s)",
                            record.command, record.active_pid, duration, timeout
                        ),
                        timestamp: now,
                    });
                    record.alert_sent = true;
                }
            } else if record.last_exec_time > self.last_sweep
                && record.last_duration > timeout as i64
            {
                // 在两次巡检之间跑完但超了时
                alerts.push(CronAlert {
                    kind: "long_running",
                    job_command: record.command.clone(),
                    exit_code: -1,
                    message: format!(
                        "Long running cron job detected (Finished): {} ran for {}s (Timeout: {}s)",
                        record.command, record.last_duration, timeout
                    ),
                    timestamp: record.last_exec_time,
                });
            }
        }

        // 过期 orphan 和长期没跑过的任务
        self.orphaned_exits
            .retain(|_, orphan| now - orphan.seen_at <= ORPHAN_TTL_SECS);
        self.jobs
            .retain(|_, record| now - record.last_exec_time <= STALE_JOB_RETENTION_SECS);

        self.last_sweep = now;
        alerts
    }

    fn take_orphan_for_pid(&mut self, pid: u32) -> Option<OrphanExit> {
        if let Some(orphan) = self.orphaned_exits.remove(&pid) {
            return Some(orphan);
        }
        // 直接键没中再按父 pid / ns pid 扫一遍
        let key = self
            .orphaned_exits
            .iter()
            .find(|(_, o)| {
                o.parent_pid == pid
                    || (o.ns_pid != 0 && o.ns_pid == pid)
                    || (o.ns_parent_pid != 0 && o.ns_parent_pid == pid)
            })
            .map(|(k, _)| *k);
        key.and_then(|k| self.orphaned_exits.remove(&k))
    }

    async fn emit_alerts(&self, alerts: Vec<CronAlert>) {
        if alerts.is_empty() {
            return;
        }
        for alert in &alerts {
            error!(
                target: "cronwatch_alert",
                kind = alert.kind,
                job = %alert.job_command,
                exit_code = alert.exit_code,
                "{}",
                alert.message
            );
        }
        if let Some(reporter) = &self.reporter {
            reporter.push_alerts_best_effort(&alerts).await;
        }
    }

    /// 周期性巡检入口，由 ServiceManager 的定时器驱动
    pub async fn sweep_and_report(&mut self) {
        let cfg = {
            let config_guard = self.app_config.read().await;
            config_guard.cron.clone()
        };
        if !cfg.enabled {
            return;
        }
        let alerts = self.sweep(&cfg, Utc::now().timestamp());
        self.emit_alerts(alerts).await;
    }
}

#[async_trait]
impl Subscriber for JobTracker {
    async fn handle_event(&mut self, event: CronEvent) {
        let cfg = {
            let config_guard = self.app_config.read().await;
            config_guard.cron.clone()
        };
        if !cfg.enabled {
            return;
        }
        let now = Utc::now().timestamp();

        match event {
            CronEvent::JobExit {
                pid,
                parent_pid,
                ns_pid,
                ns_parent_pid,
                exit_code,
                comm,
            } => {
                debug!(
                    "[JobTracker] Exit event: pid={} ppid={} code={} comm='{}'",
                    pid, parent_pid, exit_code, comm
                );
                self.observe_exit(pid, parent_pid, ns_pid, ns_parent_pid, exit_code, now);
            }
            CronEvent::JobStarted { command, user, pid } => {
                info!(
                    "[JobTracker] Job started: '{}' (user: {}, CRON pid: {})",
                    command, user, pid
                );
                self.observe_start(&cfg, &command, pid, now);
            }
            CronEvent::JobFailedLog { command, exit_code } => {
                if let Some(alert) = self.note_failed_log(&cfg, &command, exit_code, now) {
                    self.emit_alerts(vec![alert]).await;
                }
            }
        }
    }
}
