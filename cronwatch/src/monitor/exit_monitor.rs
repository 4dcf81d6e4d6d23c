use super::Monitor;
use crate::{config::ProbeConfig, event_bus::CronEvent, publisher::Publisher, utils};
use anyhow::anyhow;
use anyhow::Result;
use async_trait::async_trait;
use aya::{maps::PerfEventArray, programs::TracePoint, util::online_cpus, Ebpf};
use aya_log::EbpfLogger;
use bytes::BytesMut;
use cronwatch_common::{CronExitEvent, EXIT_EVENTS_MAP};
use nix::sys::resource::{setrlimit, Resource, RLIM_INFINITY};
use std::mem;
use std::time::Duration;
use std::{
    os::unix::io::AsRawFd,
    sync::atomic::{AtomicBool, Ordering},
    sync::Arc,
};
use tokio::{io::unix::AsyncFd, sync::broadcast, time::timeout};
use tracing::{debug, info, warn};

/// 加载并挂接 fork/exit 探针，把 perf 通道里的退出记录搬运到事件总线。
///
/// 探针这一侧是尽力而为的：perf 环满了记录就丢，这里只统计并告警，
/// 不做任何重试。
pub struct ExitMonitor {
    // take_map 之后探针程序的生命周期仍然挂在 Ebpf 上，必须持有
    _bpf: Ebpf,
    task_handles: Vec<tokio::task::JoinHandle<()>>, // 保存后台任务句柄
    shutdown_flag: Arc<AtomicBool>,                 // 关闭标志
    out_tx: broadcast::Sender<CronEvent>,           // 发布通道
}

impl ExitMonitor {
    pub async fn new(
        probe_config: &ProbeConfig,
        event_tx: broadcast::Sender<CronEvent>,
    ) -> Result<Self> {
        info!("[ExitMonitor] Loading eBPF probe...");

        // 老内核不用 memcg 记账，锁页内存上限需要先解除
        if let Err(e) = setrlimit(Resource::RLIMIT_MEMLOCK, RLIM_INFINITY, RLIM_INFINITY) {
            debug!("[ExitMonitor] remove limit on locked memory failed: {}", e);
        }

        let mut bpf = match &probe_config.object_path {
            Some(path) => {
                info!("[ExitMonitor] Loading external BPF object {:?}", path);
                Ebpf::load_file(path)?
            }
            None => Ebpf::load(aya::include_bytes_aligned!(concat!(
                env!("OUT_DIR"),
                "/cronwatch"
            )))?,
        };

        if let Err(e) = EbpfLogger::init(&mut bpf) {
            // 探针没有产生日志时初始化会失败，不影响监控
            debug!("[ExitMonitor] eBPF logger not initialized: {}", e);
        }

        // 两个 tracepoint 必须都挂上；任何一个失败都视为探针不可用，
        // 由调用方决定是否降级为仅 journal 监控
        let fork_program: &mut TracePoint = bpf
            .program_mut("cronwatch_fork")
            .ok_or_else(|| anyhow!("Program 'cronwatch_fork' not found"))?
            .try_into()?;
        fork_program.load()?;
        fork_program.attach("sched", "sched_process_fork")?;

        let exit_program: &mut TracePoint = bpf
            .program_mut("cronwatch_exit")
            .ok_or_else(|| anyhow!("Program 'cronwatch_exit' not found"))?
            .try_into()?;
        exit_program.load()?;
        exit_program.attach("sched", "sched_process_exit")?;
        info!("[ExitMonitor] Tracepoints attached (sched:sched_process_fork, sched:sched_process_exit).");

        let events_map = bpf
            .take_map(EXIT_EVENTS_MAP)
            .ok_or_else(|| anyhow!("Failed to take ownership of '{}' map", EXIT_EVENTS_MAP))?;
        let mut events = PerfEventArray::try_from(events_map)?;
        let mut task_handles = Vec::new();
        let shutdown_flag = Arc::new(AtomicBool::new(false));

        for cpu_id in online_cpus().map_err(|(_, error)| error)? {
            let perf_buf = events.open(cpu_id, None)?;
            let fd = perf_buf.as_raw_fd();
            let async_fd = AsyncFd::new(fd)?;
            let tx = event_tx.clone();
            let shutdown_flag_clone = shutdown_flag.clone();

            let handle = tokio::spawn(async move {
                debug!("[Worker] Exit-event reader for CPU {} started.", cpu_id);
                let mut local_perf_buf = perf_buf;

                while !shutdown_flag_clone.load(Ordering::SeqCst) {
                    let readable_result =
                        timeout(Duration::from_secs(1), async_fd.readable()).await;
                    match readable_result {
                        Ok(Ok(mut guard)) => {
                            let mut bufs: [BytesMut; 1] = [BytesMut::with_capacity(1024)];
                            match local_perf_buf.read_events(&mut bufs) {
                                Ok(events_read) => {
                                    if events_read.lost > 0 {
                                        // perf 通道是有损的，消费不及时就丢，
                                        // 对应的退出不会再有第二次机会
                                        warn!(
                                            "(CPU {}) Perf ring full, {} exit events lost.",
                                            cpu_id, events_read.lost
                                        );
                                    }
                                    for buf in bufs.iter().take(events_read.read) {
                                        if buf.len() < mem::size_of::<CronExitEvent>() {
                                            warn!(
                                                "(CPU {}) Short perf record: {} bytes (expected {}).",
                                                cpu_id,
                                                buf.len(),
                                                mem::size_of::<CronExitEvent>()
                                            );
                                            continue;
                                        }
                                        let event = unsafe {
                                            (buf.as_ptr() as *const CronExitEvent)
                                                .read_unaligned()
                                        };
                                        let comm = utils::comm_to_string(&event.comm);

                                        info!(
                                            "(CPU {}) Cron child exited: pid={} ppid={} ns_pid={} ns_ppid={} code={} comm='{}'",
                                            cpu_id,
                                            event.pid,
                                            event.parent_pid,
                                            event.ns_pid,
                                            event.ns_parent_pid,
                                            event.exit_code,
                                            comm
                                        );
                                        let send_result = tx.send(CronEvent::JobExit {
                                            pid: event.pid,
                                            parent_pid: event.parent_pid,
                                            ns_pid: event.ns_pid,
                                            ns_parent_pid: event.ns_parent_pid,
                                            exit_code: event.exit_code,
                                            comm,
                                        });
                                        if send_result.is_err() {
                                            warn!(
                                                "(CPU {}) No subscriber for exit event, dropping.",
                                                cpu_id
                                            );
                                        }
                                    }
                                }
                                Err(e) => {
                                    debug!(
                                        "[Worker] Perf buffer read error on CPU {}: {}, continuing",
                                        cpu_id, e
                                    );
                                }
                            }
                            guard.clear_ready();
                        }
                        Ok(Err(e)) => {
                            warn!("[Worker] AsyncFd error on CPU {}: {}, continuing", cpu_id, e);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                        Err(_) => {
                            // 超时是预料之中的，用于定期检查 shutdown 标志
                            continue;
                        }
                    }
                }
                debug!("[Worker] Exit-event reader for CPU {} shutting down.", cpu_id);
            });
            task_handles.push(handle);
        }

        info!(
            "[ExitMonitor] All {} reader tasks have been dispatched.",
            task_handles.len()
        );

        Ok(Self {
            _bpf: bpf,
            task_handles,
            shutdown_flag,
            out_tx: event_tx,
        })
    }

    // 关闭探针读取任务
    pub async fn shutdown(&mut self) {
        info!("[ExitMonitor] Initiating shutdown...");

        // 设置关闭标志，读取循环里的定期超时检查会让任务退出
        self.shutdown_flag.store(true, Ordering::SeqCst);

        let mut completed_tasks = 0;
        for handle in self.task_handles.drain(..) {
            match tokio::time::timeout(Duration::from_secs(3), handle).await {
                Ok(_) => {
                    completed_tasks += 1;
                }
                Err(_) => {
                    warn!("[ExitMonitor] Reader task did not complete within timeout, force stopping.");
                }
            }
        }

        info!(
            "[ExitMonitor] Shutdown completed. {} tasks stopped gracefully.",
            completed_tasks
        );
    }
}

impl Drop for ExitMonitor {
    fn drop(&mut self) {
        // 设置关闭标志，即使 shutdown 没有被调用
        self.shutdown_flag.store(true, Ordering::SeqCst);
        debug!("[ExitMonitor] Monitor dropped, shutdown flag set.");
    }
}

#[async_trait]
impl Monitor for ExitMonitor {
    // 读取任务在 new 里就已经启动，run 不需要做事
    async fn run(self) {}

    fn name(&self) -> String {
        "ExitMonitor".to_string()
    }
}

impl Publisher for ExitMonitor {
    fn publish(
        &self,
        event: CronEvent,
    ) -> Result<usize, broadcast::error::SendError<CronEvent>> {
        self.out_tx.send(event)
    }
}
