use sysinfo::{ProcessRefreshKind, RefreshKind, System};

/// 从内核 comm 缓冲区还原字符串。缓冲区固定16字节，名字刚好16字节时
/// 没有 null 终止符。
pub fn comm_to_string(comm: &[u8]) -> String {
    let len = comm.iter().position(|&c| c == 0).unwrap_or(comm.len());
    String::from_utf8_lossy(&comm[..len]).into_owned()
}

/// 常见退出码的可读描述，告警消息里使用
pub fn exit_code_description(code: i32) -> String {
    match code {
        1 => "General Error".to_string(),
        2 => "Misuse of Shell Builtin".to_string(),
        126 => "Command Invoked Cannot Execute".to_string(),
        127 => "Command Not Found".to_string(),
        128 => "Invalid Exit Argument".to_string(),
        130 => "Script Terminated by Control-C".to_string(),
        137 => "Killed (OOM/Manual)".to_string(),
        139 => "Segmentation Fault".to_string(),
        143 => "Terminated by SIGTERM".to_string(),
        _ => {
            if code > 128 {
                format!("Signal {}", code - 128)
            } else {
                "Unknown Error".to_string()
            }
        }
    }
}

/// 查找系统里正在运行的 cron 守护进程。找不到不代表探针没用，
/// 只在启动时用来提示配置问题。
pub fn find_cron_daemon_pid() -> Option<u32> {
    let rk = RefreshKind::nothing().with_processes(ProcessRefreshKind::default());
    let sys = System::new_with_specifics(rk);
    for process in sys.processes().values() {
        let name = process.name().to_string_lossy();
        if matches!(name.as_ref(), "cron" | "crond" | "CRON") {
            return Some(usize::from(process.pid()) as u32);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comm_stops_at_null() {
        let mut buf = [0u8; 16];
        buf[..4].copy_from_slice(b"cron");
        assert_eq!(comm_to_string(&buf), "cron");
    }

    #[test]
    fn comm_without_null_uses_full_buffer() {
        let buf = *b"sixteen_bytes_ab";
        assert_eq!(comm_to_string(&buf), "sixteen_bytes_ab");
    }

    #[test]
    fn signal_codes_described() {
        assert_eq!(exit_code_description(137), "Killed (OOM/Manual)");
        assert_eq!(exit_code_description(129), "Signal 1");
        assert_eq!(exit_code_description(3), "Unknown Error");
    }
}
