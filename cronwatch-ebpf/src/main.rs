#![cfg_attr(feature = "build-ebpf", no_std)]
#![cfg_attr(feature = "build-ebpf", no_main)]

#[cfg(feature = "build-ebpf")]
#[allow(
    clippy::all,
    dead_code,
    non_camel_case_types,
    non_snake_case,
    non_upper_case_globals
)]
#[rustfmt::skip]
mod vmlinux;

// 将 eBPF 相关代码放到一个 cfg 模块里，避免到处写 #[cfg(...)]
#[cfg(feature = "build-ebpf")]
mod ebpf {
    use core::ptr::addr_of;

    use aya_ebpf::{
        helpers::{
            bpf_get_current_comm, bpf_get_current_pid_tgid, bpf_probe_read,
            generated::bpf_get_current_task,
        },
        macros::{map, tracepoint},
        maps::{HashMap, PerfEventArray},
        programs::TracePointContext,
    };
    use aya_log_ebpf::debug;
    use cronwatch_common::{
        comm_matches_cron, decode_wait_status, ns_level_index, CronExitEvent,
        TRACKED_PIDS_CAPACITY,
    };

    use crate::vmlinux::{
        pid as kernel_pid, task_struct, trace_event_raw_sched_process_fork, upid,
    };

    // cron 子进程跟踪集合：fork 时登记，exit 时删除。value 只是占位，
    // 容量满时 insert 失败即静默放弃对该子进程的跟踪。
    #[map]
    static TRACKED_PIDS: HashMap<u32, u8> = HashMap::with_max_entries(TRACKED_PIDS_CAPACITY, 0);

    #[map]
    static EXIT_EVENTS: PerfEventArray<CronExitEvent> = PerfEventArray::new(0);

    #[tracepoint]
    pub fn cronwatch_fork(ctx: TracePointContext) -> u32 {
        match unsafe { try_cronwatch_fork(ctx) } {
            Ok(ret) => ret,
            Err(ret) => ret,
        }
    }

    // sched_process_fork 在父进程上下文触发，bpf_get_current_comm 读到的
    // 是父进程名。
    unsafe fn try_cronwatch_fork(ctx: TracePointContext) -> Result<u32, u32> {
        let parent_comm = match bpf_get_current_comm() {
            Ok(comm) => comm,
            Err(_) => return Ok(0),
        };
        if !comm_matches_cron(&parent_comm) {
            return Ok(0);
        }

        let record: trace_event_raw_sched_process_fork =
            ctx.read_at(0).map_err(|_| 1u32)?;
        let child_pid = record.child_pid as u32;

        if TRACKED_PIDS.insert(&child_pid, &1, 0).is_ok() {
            debug!(&ctx, "tracking cron child {}", child_pid);
        }
        Ok(0)
    }

    #[tracepoint]
    pub fn cronwatch_exit(ctx: TracePointContext) -> u32 {
        match unsafe { try_cronwatch_exit(ctx) } {
            Ok(ret) => ret,
            Err(ret) => ret,
        }
    }

    unsafe fn try_cronwatch_exit(ctx: TracePointContext) -> Result<u32, u32> {
        let pid = (bpf_get_current_pid_tgid() >> 32) as u32;
        if TRACKED_PIDS.get(&pid).is_none() {
            return Ok(0);
        }

        // 进程可能在 fork 之后 exec 改名，comm 必须在退出时现读
        let comm = bpf_get_current_comm().unwrap_or([0u8; 16]);

        let task = bpf_get_current_task() as *const task_struct;
        let raw_status: i32 = bpf_probe_read(addr_of!((*task).exit_code)).unwrap_or(0);

        // real_parent 是退出时刻的值；原父进程已退出时这里读到的是收养者
        let parent: *mut task_struct =
            bpf_probe_read(addr_of!((*task).real_parent)).unwrap_or(core::ptr::null_mut());
        let (parent_pid, ns_parent_pid) = if parent.is_null() {
            (0, 0)
        } else {
            (
                bpf_probe_read(addr_of!((*parent).pid)).unwrap_or(0) as u32,
                task_ns_pid(parent as *const task_struct),
            )
        };

        let event = CronExitEvent {
            pid,
            parent_pid,
            ns_pid: task_ns_pid(task),
            ns_parent_pid,
            exit_code: decode_wait_status(raw_status),
            comm,
        };
        EXIT_EVENTS.output(&ctx, &event, 0);

        // 无论通道写入是否成功都删除，跟踪项不能活过它对应的退出
        let _ = TRACKED_PIDS.remove(&pid);
        Ok(0)
    }

    // task 在其最内层 pid namespace 里的进程号。level 越界时回退到
    // numbers[0]（全局 pid）。
    unsafe fn task_ns_pid(task: *const task_struct) -> u32 {
        let pid_struct: *mut kernel_pid = match bpf_probe_read(addr_of!((*task).thread_pid)) {
            Ok(p) if !p.is_null() => p,
            _ => return 0,
        };
        let level: u32 = bpf_probe_read(addr_of!((*pid_struct).level)).unwrap_or(0);

        let base = addr_of!((*pid_struct).numbers) as *const upid;
        let entry = base.add(ns_level_index(level));
        bpf_probe_read(addr_of!((*entry).nr))
            .map(|nr| nr as u32)
            .unwrap_or(0)
    }

    // 提供 panic 处理，仅在 eBPF 特性开启时使用（no_std 环境）
    #[cfg(not(test))]
    #[panic_handler]
    fn panic(_info: &core::panic::PanicInfo) -> ! {
        loop {}
    }

    #[unsafe(link_section = "license")]
    #[unsafe(no_mangle)]
    static LICENSE: [u8; 13] = *b"Dual MIT/GPL\0";
}

// 未启用 eBPF 时，提供一个空的 std main，避免宿主构建报错。
#[cfg(not(feature = "build-ebpf"))]
fn main() {
    eprintln!("cronwatch-ebpf built without 'build-ebpf' feature; skipping eBPF program");
}
