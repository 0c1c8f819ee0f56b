//! Integration tests for single-binary release assets (e.g. `wasm-split`).

use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use artifact_fetch::BinaryConfig;
use artifact_fetch::fetch::fetch_binary_for;
use artifact_fetch::platform::Platform;

const BINARY_BODY: &[u8] = b"\x7fELF fake wasm-split";

/// Serve `BINARY_BODY` to every request, returning the base URL and a hit counter.
fn spawn_binary_server() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind");
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    let hits_clone = Arc::clone(&hits);
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut buf = [0u8; 4096];
            let n = stream.read(&mut buf).unwrap_or(0);
            let request = String::from_utf8_lossy(&buf[..n]);
            hits_clone.fetch_add(1, Ordering::SeqCst);

            let found = request.starts_with("GET /releases/download/1.0.0/wasm-split-Linux-x86_64 ");
            let (status, body): (&str, &[u8]) = if found {
                ("200 OK", BINARY_BODY)
            } else {
                ("404 Not Found", b"")
            };
            let head = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(body);
            let _ = stream.flush();
        }
    });

    (format!("http://{addr}"), hits)
}

fn setup(root: &Path, repo: &str) -> BinaryConfig {
    std::fs::write(
        root.join("wasm-split.properties"),
        format!("repo={repo}\nversion=1.0.0\n"),
    )
    .unwrap();
    let mut cfg = BinaryConfig::new(root, "wasm-split.properties", "wasm-split", "tools/wasm-split");
    cfg.timeout = Duration::from_secs(10);
    cfg
}

#[test]
fn binary_is_downloaded_once() {
    let (url, hits) = spawn_binary_server();
    let root = tempfile::tempdir().unwrap();
    let cfg = setup(root.path(), &url);

    let path = fetch_binary_for(&cfg, Platform::Linux).unwrap();
    assert_eq!(path, cfg.target_dir.join("wasm-split-Linux-x86_64"));
    assert_eq!(std::fs::read(&path).unwrap(), BINARY_BODY);
    assert_eq!(
        std::fs::read_to_string(cfg.marker_path()).unwrap(),
        "1.0.0"
    );

    let again = fetch_binary_for(&cfg, Platform::Linux).unwrap();
    assert_eq!(again, path);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn missing_binary_is_refetched_despite_marker() {
    let (url, hits) = spawn_binary_server();
    let root = tempfile::tempdir().unwrap();
    let cfg = setup(root.path(), &url);

    let path = fetch_binary_for(&cfg, Platform::Linux).unwrap();
    std::fs::remove_file(&path).unwrap();

    fetch_binary_for(&cfg, Platform::Linux).unwrap();
    assert!(path.is_file());
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn no_temporary_files_left_in_target() {
    let (url, _hits) = spawn_binary_server();
    let root = tempfile::tempdir().unwrap();
    let cfg = setup(root.path(), &url);

    fetch_binary_for(&cfg, Platform::Linux).unwrap();

    let mut names: Vec<String> = std::fs::read_dir(&cfg.target_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec![".version", "wasm-split-Linux-x86_64"]);
}

#[cfg(unix)]
#[test]
fn binary_is_executable() {
    use std::os::unix::fs::PermissionsExt;

    let (url, _hits) = spawn_binary_server();
    let root = tempfile::tempdir().unwrap();
    let cfg = setup(root.path(), &url);

    let path = fetch_binary_for(&cfg, Platform::Linux).unwrap();
    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o111, 0o111, "mode {mode:o} should be executable");
}

#[test]
fn unsupported_platform_fails_before_network() {
    let (url, hits) = spawn_binary_server();
    let root = tempfile::tempdir().unwrap();
    let cfg = setup(root.path(), &url);

    assert!(fetch_binary_for(&cfg, Platform::Web).is_err());
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn wrong_asset_for_platform_is_http_error() {
    let (url, _hits) = spawn_binary_server();
    let root = tempfile::tempdir().unwrap();
    let cfg = setup(root.path(), &url);

    // The server only publishes the Linux build.
    let err = fetch_binary_for(&cfg, Platform::Mac).unwrap_err();
    assert!(format!("{err:#}").contains("HTTP 404"), "err: {err:#}");
    assert!(!cfg.marker_path().exists());
}
