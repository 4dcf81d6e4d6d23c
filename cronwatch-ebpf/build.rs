use which::which;

/// Building the BPF object has an undeclared dependency on the `bpf-linker`
/// binary; when the crate is being compiled for a BPF target, check for it
/// up front so a missing linker fails with a clear message instead of deep
/// inside the link step. Host builds (the crate is also a build-dependency
/// of `cronwatch`) never need the linker.
fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    let target = std::env::var("TARGET").unwrap_or_default();
    if !target.starts_with("bpf") {
        return;
    }
    let bpf_linker = which("bpf-linker")
        .expect("bpf-linker not found; install it with `cargo install bpf-linker`");
    println!("cargo:rerun-if-changed={}", bpf_linker.display());
}
