use super::Monitor;
use crate::config::AppConfig;
use crate::event_bus::CronEvent;
use crate::publisher::Publisher;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{self, Duration as TokioDuration};
use tracing::{debug, info, warn};

const DEFAULT_SYSLOG_PATH: &str = "/var/log/syslog";
/// 比这更老的日志行当作历史回放跳过
const MAX_ENTRY_AGE_SECS: i64 = 120;

/// 周期性扫描 cron 日志（journalctl 优先，退回 syslog 文件），
/// 把任务启动（CMD 行）和日志里直接报告的失败（FAILED 行）发到事件总线。
/// 探针只能看到 pid 和退出码，命令名只有日志里有，两边在 JobTracker 汇合。
pub struct JournalMonitor {
    app_config: Arc<RwLock<AppConfig>>,
    event_tx: broadcast::Sender<CronEvent>,
    last_check: i64,
    file_offset: u64,
    patterns: LinePatterns,
}

struct LinePatterns {
    user: Regex,
    cmd: Regex,
    exit: Regex,
    pid: Regex,
}

impl LinePatterns {
    fn new() -> Self {
        Self {
            user: Regex::new(r"\((.*?)\)").expect("user pattern"),
            cmd: Regex::new(r"CMD \((.*?)\)").expect("cmd pattern"),
            exit: Regex::new(r"exit code (\d+)").expect("exit pattern"),
            pid: Regex::new(r"CRON\[(\d+)\]:").expect("pid pattern"),
        }
    }
}

impl JournalMonitor {
    pub fn new(
        app_config: Arc<RwLock<AppConfig>>,
        event_tx: broadcast::Sender<CronEvent>,
    ) -> Self {
        Self {
            app_config,
            event_tx,
            last_check: Utc::now().timestamp(),
            file_offset: 0,
            patterns: LinePatterns::new(),
        }
    }

    async fn monitor_task_loop(mut self) {
        info!("[JournalMonitor] Cron log scanning task started.");
        loop {
            let (enabled, interval_secs, log_path) = {
                let config_guard = self.app_config.read().await;
                (
                    config_guard.cron.enabled,
                    config_guard.cron.interval_secs,
                    config_guard.cron.log_path.clone(),
                )
            };

            let mut interval = time::interval(TokioDuration::from_secs(interval_secs.max(1)));
            // 第一次 tick 立即返回，真正的等待从第二次开始
            interval.tick().await;
            interval.tick().await;

            if !enabled {
                debug!("[JournalMonitor] Cron monitoring disabled, skipping scan.");
                continue;
            }

            self.scan_once(&log_path).await;
        }
    }

    async fn scan_once(&mut self, log_path: &Path) {
        let since = self.last_check;
        let now = Utc::now();

        // 自定义日志路径直接读文件；默认路径先试 journalctl（systemd），
        // 失败再退回 syslog
        let entries = if log_path != Path::new(DEFAULT_SYSLOG_PATH) {
            self.read_cron_lines_from_file(log_path)
        } else {
            match Self::read_cron_lines_from_journal(since) {
                Ok(lines) => Ok(lines),
                Err(e) => {
                    debug!(
                        "[JournalMonitor] journalctl unavailable ({}), falling back to {}",
                        e,
                        log_path.display()
                    );
                    self.read_cron_lines_from_file(log_path)
                }
            }
        };

        let entries = match entries {
            Ok(lines) => lines,
            Err(e) => {
                warn!("[JournalMonitor] Failed to read cron log entries: {}", e);
                return;
            }
        };

        let mut published = 0usize;
        for entry in &entries {
            if let Some(event) = self.parse_entry(entry, now) {
                if self.publish(event).is_err() {
                    warn!("[JournalMonitor] No subscriber for journal event, dropping.");
                } else {
                    published += 1;
                }
            }
        }
        if !entries.is_empty() {
            debug!(
                "[JournalMonitor] Scanned {} cron log lines, published {} events.",
                entries.len(),
                published
            );
        }

        self.last_check = now.timestamp();
    }

    fn read_cron_lines_from_journal(since: i64) -> std::io::Result<Vec<String>> {
        let output = Command::new("journalctl")
            .args([
                "--unit=cron.service",
                &format!("--since=@{}", since),
                "--no-pager",
                "-o",
                "short-precise",
            ])
            .output()?;
        if !output.status.success() {
            return Err(std::io::Error::other("journalctl returned non-zero status"));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .filter(|line| line.contains("CRON") || line.contains("cron"))
            .map(str::to_string)
            .collect())
    }

    fn read_cron_lines_from_file(&mut self, log_path: &Path) -> std::io::Result<Vec<String>> {
        // 老系统上 syslog 不存在时退回 /var/log/messages
        let mut file = match File::open(log_path) {
            Ok(f) => f,
            Err(_) => File::open("/var/log/messages")?,
        };

        let size = file.metadata()?.len();
        // 文件比上次的偏移还小说明发生了轮转，从头读
        let start_pos = if size >= self.file_offset {
            self.file_offset
        } else {
            0
        };
        file.seek(SeekFrom::Start(start_pos))?;

        let reader = BufReader::new(file);
        let lines = reader
            .lines()
            .map_while(Result::ok)
            .filter(|line| line.contains("CRON") || line.contains("cron"))
            .collect();

        self.file_offset = size;
        Ok(lines)
    }

    /// 把一条 cron 日志行转成总线事件。启动行和失败行都会上报，
    /// 其余行（以及历史回放）返回 None。
    fn parse_entry(&self, entry: &str, now: DateTime<Utc>) -> Option<CronEvent> {
        // 行首第一个空白分隔的 token 是时间戳（rsyslog 的 RFC3339 精确格式）。
        // 解析不了就放过，解析得出且太老的行跳过，避免重放历史。
        if let Some(ts_str) = entry.split_whitespace().next() {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(ts_str) {
                if now.timestamp() - parsed.timestamp() > MAX_ENTRY_AGE_SECS {
                    return None;
                }
            }
        }

        if entry.contains("FAILED") {
            let command = self
                .patterns
                .cmd
                .captures(entry)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())?;
            let exit_code = self
                .patterns
                .exit
                .captures(entry)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<i32>().ok())
                .unwrap_or(1);
            return Some(CronEvent::JobFailedLog { command, exit_code });
        }

        if entry.contains("CMD") {
            let command = self
                .patterns
                .cmd
                .captures(entry)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())?;
            if command.is_empty() {
                return None;
            }
            let user = self
                .patterns
                .user
                .captures(entry)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| "root".to_string());
            let pid = self
                .patterns
                .pid
                .captures(entry)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .unwrap_or(0);
            return Some(CronEvent::JobStarted { command, user, pid });
        }

        None
    }
}

#[async_trait]
impl Monitor for JournalMonitor {
    async fn run(self) {
        self.monitor_task_loop().await;
    }

    fn name(&self) -> String {
        "JournalMonitor".to_string()
    }
}

impl Publisher for JournalMonitor {
    fn publish(
        &self,
        event: CronEvent,
    ) -> Result<usize, broadcast::error::SendError<CronEvent>> {
        self.event_tx.send(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn monitor() -> JournalMonitor {
        let config: AppConfig = serde_yaml::from_str("{}").expect("empty config");
        JournalMonitor::new(
            Arc::new(RwLock::new(config)),
            crate::event_bus::create_event_sender(),
        )
    }

    #[test]
    fn cmd_line_becomes_job_started() {
        let m = monitor();
        let now = Utc::now();
        let entry = format!(
            "{} host CRON[4242]: (backup) CMD (/usr/local/bin/backup.sh --daily)",
            now.to_rfc3339()
        );
        match m.parse_entry(&entry, now) {
            Some(CronEvent::JobStarted { command, user, pid }) => {
                assert_eq!(command, "/usr/local/bin/backup.sh --daily");
                assert_eq!(user, "backup");
                assert_eq!(pid, 4242);
            }
            other => panic!("unexpected parse result: {:?}", other),
        }
    }

    #[test]
    fn failed_line_becomes_job_failed() {
        let m = monitor();
        let now = Utc::now();
        let entry = format!(
            "{} host CRON[99]: (root) FAILED CMD (/etc/cron.daily/rotate) exit code 3",
            now.to_rfc3339()
        );
        match m.parse_entry(&entry, now) {
            Some(CronEvent::JobFailedLog { command, exit_code }) => {
                assert_eq!(command, "/etc/cron.daily/rotate");
                assert_eq!(exit_code, 3);
            }
            other => panic!("unexpected parse result: {:?}", other),
        }
    }

    #[test]
    fn stale_entries_are_skipped() {
        let m = monitor();
        let now = Utc::now();
        let old = now - chrono::Duration::seconds(MAX_ENTRY_AGE_SECS + 60);
        let entry = format!("{} host CRON[7]: (root) CMD (/bin/true)", old.to_rfc3339());
        assert!(m.parse_entry(&entry, now).is_none());
    }

    #[test]
    fn unrelated_lines_are_ignored() {
        let m = monitor();
        let now = Utc::now();
        let entry = format!(
            "{} host CRON[7]: pam_unix(cron:session): session opened for user root",
            now.to_rfc3339()
        );
        assert!(m.parse_entry(&entry, now).is_none());
    }
}
