// build.rs: expose the compile-time target triple as a rustc env var.
//
// Cargo provides the `TARGET` env var to build scripts, which contains the
// canonical target triple (e.g., "aarch64-apple-darwin", "x86_64-unknown-linux-gnu").
// We re-export it as `cargo:rustc-env=TARGET=...` so that `platform::Platform::host()`
// can pick the host-specific release asset for binary fetches.

fn main() {
    let target = std::env::var("TARGET")
        .expect("TARGET env var not set by Cargo. This should never happen in a normal build.");

    println!("cargo:rustc-env=TARGET={target}");
}
