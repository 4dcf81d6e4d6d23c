#![cfg_attr(not(test), no_std)]

/// 内核进程名长度上限（含 null 终止符）
pub const COMM_LEN: usize = 16;

/// Map 名称，两侧必须一致
pub const TRACKED_PIDS_MAP: &str = "TRACKED_PIDS";
pub const EXIT_EVENTS_MAP: &str = "EXIT_EVENTS";

/// 同时被跟踪的 cron 子进程数量上限
pub const TRACKED_PIDS_CAPACITY: u32 = 10240;

/// Exit record emitted by the probe, one per tracked process exit.
///
/// Field order and widths are the wire format the reader side decodes; the
/// layout carries no version field, so any change here breaks old readers.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct CronExitEvent {
    pub pid: u32,
    pub parent_pid: u32,
    pub ns_pid: u32,
    pub ns_parent_pid: u32,
    pub exit_code: i32,
    /// 进程名，截断到16字节，不保证 null 终止
    pub comm: [u8; COMM_LEN],
}

#[cfg(feature = "user")]
unsafe impl aya::Pod for CronExitEvent {}

/// True when `comm` names a cron-family scheduler.
///
/// Byte-for-byte check of the first four (and for `crond`, five) bytes of
/// the comm buffer. The buffer is fixed at 16 bytes and may not be
/// null-terminated, so no str conversion here — this runs in the probe.
#[inline(always)]
pub fn comm_matches_cron(comm: &[u8; COMM_LEN]) -> bool {
    (comm[0] == b'c' && comm[1] == b'r' && comm[2] == b'o' && comm[3] == b'n')
        || (comm[0] == b'C' && comm[1] == b'R' && comm[2] == b'O' && comm[3] == b'N')
        || (comm[0] == b'c'
            && comm[1] == b'r'
            && comm[2] == b'o'
            && comm[3] == b'n'
            && comm[4] == b'd')
}

/// Decode the kernel's packed wait status into a shell-style exit code.
///
/// Low 7 bits carry the terminating signal; when they are zero the upper
/// byte is the status the process passed to exit(). Signal deaths map to
/// 128 + signo, matching what a shell would report.
#[inline(always)]
pub fn decode_wait_status(raw: i32) -> i32 {
    let sig = raw & 0x7f;
    if sig != 0 {
        128 + sig
    } else {
        (raw >> 8) & 0xff
    }
}

/// 内核 pid namespace 嵌套深度上限（struct pid 的 numbers[] 边界）
pub const MAX_PID_NS_LEVEL: u32 = 7;

/// Index into `struct pid`'s per-level id array for the innermost namespace.
///
/// The verifier has no dynamic bounds check for the `numbers[]` read, so the
/// level must be clamped before indexing: levels outside [1, 7] fall back to
/// the outermost entry.
#[inline(always)]
pub fn ns_level_index(level: u32) -> usize {
    if level >= 1 && level <= MAX_PID_NS_LEVEL {
        level as usize
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comm(name: &str) -> [u8; COMM_LEN] {
        let mut buf = [0u8; COMM_LEN];
        buf[..name.len()].copy_from_slice(name.as_bytes());
        buf
    }

    #[test]
    fn cron_variants_match() {
        assert!(comm_matches_cron(&comm("cron")));
        assert!(comm_matches_cron(&comm("CRON")));
        assert!(comm_matches_cron(&comm("crond")));
    }

    #[test]
    fn non_cron_names_do_not_match() {
        assert!(!comm_matches_cron(&comm("bash")));
        assert!(!comm_matches_cron(&comm("Cron")));
        assert!(!comm_matches_cron(&comm("cro")));
        assert!(!comm_matches_cron(&comm("anacron")));
        assert!(!comm_matches_cron(&comm("")));
    }

    #[test]
    fn cron_prefix_matches_like_the_kernel_side_check() {
        // 前4字节逐字节比较，所以 cron 前缀的名字也会命中
        assert!(comm_matches_cron(&comm("cron-helper")));
        assert!(comm_matches_cron(&comm("crond-legacy")));
    }

    #[test]
    fn clean_exit_decodes_to_zero() {
        assert_eq!(decode_wait_status(0x0000), 0);
    }

    #[test]
    fn exit_status_comes_from_upper_byte() {
        assert_eq!(decode_wait_status(0x2a00), 42);
        assert_eq!(decode_wait_status(0x0100), 1);
        assert_eq!(decode_wait_status(0xff00), 255);
    }

    #[test]
    fn signal_death_maps_to_128_plus_signo() {
        assert_eq!(decode_wait_status(0x0009), 137); // SIGKILL
        assert_eq!(decode_wait_status(0x000f), 143); // SIGTERM
        // core-dump bit does not change the reported code
        assert_eq!(decode_wait_status(0x008b), 139); // SIGSEGV + core
    }

    #[test]
    fn ns_level_clamps_to_valid_range() {
        assert_eq!(ns_level_index(0), 0);
        assert_eq!(ns_level_index(1), 1);
        assert_eq!(ns_level_index(3), 3);
        assert_eq!(ns_level_index(7), 7);
        assert_eq!(ns_level_index(8), 0);
        assert_eq!(ns_level_index(9), 0);
        assert_eq!(ns_level_index(u32::MAX), 0);
    }
}
