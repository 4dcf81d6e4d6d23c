use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 128;

#[derive(Clone, Debug)]
pub enum CronEvent {
    /// 探针捕获的 cron 子进程退出
    JobExit {
        pid: u32,
        parent_pid: u32,
        ns_pid: u32,
        ns_parent_pid: u32,
        exit_code: i32,
        comm: String,
    },
    /// journal 里的任务启动记录（CMD 行）
    JobStarted {
        command: String,
        user: String,
        pid: u32,
    },
    /// journal 里直接报告的失败（FAILED 行）
    JobFailedLog { command: String, exit_code: i32 },
}

pub fn create_event_sender() -> broadcast::Sender<CronEvent> {
    let (tx, _rx_initial) = broadcast::channel(CHANNEL_CAPACITY);
    tx
}
