use std::{env, fs, path::PathBuf};

use anyhow::Context as _;

fn main() -> anyhow::Result<()> {
    let out_dir = PathBuf::from(env::var("OUT_DIR").context("OUT_DIR not set")?);

    // 宿主默认构建不需要 BPF 工具链：写一个空对象占位，让
    // include_bytes_aligned! 可以编译通过。真正的探针用
    // `cargo build --features build-ebpf` 内嵌，或在运行时通过
    // probe.object_path 加载外部编译的对象。
    if env::var_os("CARGO_FEATURE_BUILD_EBPF").is_none() {
        fs::write(out_dir.join("cronwatch"), [])
            .context("failed to write placeholder BPF object")?;
        return Ok(());
    }

    aya_build::build_ebpf(
        [aya_build::Package {
            name: "cronwatch-ebpf",
            root_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/../cronwatch-ebpf"),
            ..Default::default()
        }],
        aya_build::Toolchain::default(),
    )
}
