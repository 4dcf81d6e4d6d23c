use crate::config::ReportConfig;
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// 单条告警。没有配置上报端点时只落日志。
#[derive(Debug, Clone, Serialize)]
pub struct CronAlert {
    /// "cron_error" 或 "long_running"
    pub kind: &'static str,
    pub job_command: String,
    pub exit_code: i32,
    pub message: String,
    pub timestamp: i64,
}

#[derive(Serialize)]
struct AlertRequest<'a> {
    server_id: &'a str,
    api_secret: &'a str,
    hostname: &'a str,
    events: &'a [CronAlert],
}

/// dashboard 事件上报客户端。上报失败只告警不重试——事件总线本身
/// 就是有损的，这里没有比它更强的投递义务。
pub struct ApiClient {
    config: ReportConfig,
    hostname: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(config: ReportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let hostname = sysinfo::System::host_name().unwrap_or_else(|| "unknown".to_string());
        Ok(Self {
            config,
            hostname,
            client,
        })
    }

    pub async fn push_alerts(&self, alerts: &[CronAlert]) -> Result<()> {
        if alerts.is_empty() {
            return Ok(());
        }

        let payload = AlertRequest {
            server_id: &self.config.server_id,
            api_secret: &self.config.api_secret,
            hostname: &self.hostname,
            events: alerts,
        };

        let url = format!(
            "{}/api/agent/events",
            self.config.endpoint.trim_end_matches('/')
        );
        let response = self.client.post(&url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "dashboard rejected alert push: HTTP {}",
                response.status()
            ));
        }
        debug!("[ApiClient] Pushed {} alert(s) to {}", alerts.len(), url);
        Ok(())
    }

    /// push 的包装：失败在这里消化掉，调用方不需要关心
    pub async fn push_alerts_best_effort(&self, alerts: &[CronAlert]) {
        if let Err(e) = self.push_alerts(alerts).await {
            warn!("[ApiClient] Failed to push {} alert(s): {:#}", alerts.len(), e);
        }
    }
}
