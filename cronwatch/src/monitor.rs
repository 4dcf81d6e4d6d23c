use async_trait::async_trait;
pub mod exit_monitor;
pub mod journal_monitor;

#[async_trait]
pub trait Monitor: Send + Sync {
    // 启动并运行监控任务。
    // JournalMonitor 在这里进入无限扫描循环，因此应作为独立任务 spawn。
    // ExitMonitor 的读取任务在 new 里就已经启动，run 是空的。
    async fn run(self);

    fn name(&self) -> String;
}
