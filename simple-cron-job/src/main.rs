// src/main.rs
//
// 手动测试辅助进程：把自己的 comm 改成 "cron"，再用 shell 启动一个按
// 指定退出码退出的子进程。cronwatch 的探针应当在 fork 时登记这个子进
// 程，并在它退出时上报退出码。

use std::env;
use std::ffi::CString;
use std::process::{self, Command};
use std::thread;
use std::time::Duration;

fn main() {
    // 第一个参数是子进程的退出码，默认 7；"sig" 前缀表示用信号结束，
    // 例如 sig9 验证 128+signal 的解码路径
    let arg = env::args().nth(1).unwrap_or_else(|| "7".to_string());

    let my_pid = process::id();
    println!("simple-cron-job 已启动，PID: {}", my_pid);

    // 探针匹配的是 fork 时刻父进程的 comm，所以要先改名再 fork
    let cron_name = CString::new("cron").expect("static name");
    if let Err(e) = nix::sys::prctl::set_name(&cron_name) {
        eprintln!("错误：无法把进程名改成 'cron': {}", e);
        process::exit(1);
    }
    println!("进程名已改为 'cron'，现在启动子任务...");

    let shell_cmd = if let Some(signal) = arg.strip_prefix("sig") {
        // 子进程给自己发信号
        format!("kill -{} $$", signal)
    } else {
        format!("exit {}", arg)
    };

    let mut child = Command::new("/bin/sh")
        .args(["-c", &shell_cmd])
        .spawn()
        .expect("无法启动子进程");
    let child_pid = child.id();
    println!("子任务 PID: {} (命令: sh -c '{}')", child_pid, shell_cmd);

    let status = child.wait().expect("等待子进程失败");
    println!("子任务结束: {}", status);

    // 留一点时间让探针事件穿过 perf 通道再退出
    thread::sleep(Duration::from_secs(1));
}
