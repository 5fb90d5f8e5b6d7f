#![cfg(all(unix, feature = "cli"))]

use std::os::unix::fs::FileTypeExt;
use std::path::PathBuf;
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/mfpipe-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn mfpipe() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_mfpipe"));
    cmd.arg("--log-level").arg("error");
    cmd
}

fn wait_with_deadline(mut child: Child, timeout: Duration) -> Output {
    let start = Instant::now();
    loop {
        if child.try_wait().expect("child should be pollable").is_some() {
            return child.wait_with_output().expect("child output");
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            panic!("child did not exit within {timeout:?}");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn wait_for_fifo(path: &PathBuf, timeout: Duration) {
    let start = Instant::now();
    while !path.exists() {
        assert!(start.elapsed() < timeout, "fifo was never created");
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn version_prints_package_version() {
    let output = mfpipe().arg("version").output().expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&format!("mfpipe {}", env!("CARGO_PKG_VERSION"))));
}

#[test]
fn create_makes_a_fifo() {
    let dir = unique_temp_dir("create");
    let path = dir.join("pipe");

    let output = mfpipe()
        .arg("--format")
        .arg("json")
        .arg("create")
        .arg(&path)
        .output()
        .expect("create should run");

    assert!(output.status.success());
    let meta = std::fs::metadata(&path).expect("fifo should exist");
    assert!(meta.file_type().is_fifo());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("create should emit json");
    assert_eq!(value["kind"], "named-pipe");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn put_then_get_buffer_over_fifo() {
    let dir = unique_temp_dir("buffer");
    let path = dir.join("pipe");

    let reader = mfpipe()
        .arg("--format")
        .arg("json")
        .arg("get")
        .arg(&path)
        .arg("--channel")
        .arg("ch1")
        .arg("--count")
        .arg("2")
        .arg("--timeout")
        .arg("10s")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("get should start");
    wait_for_fifo(&path, Duration::from_secs(5));

    let put = mfpipe()
        .arg("put")
        .arg(&path)
        .arg("--channel")
        .arg("ch1")
        .arg("--data")
        .arg("hello")
        .arg("--count")
        .arg("2")
        .output()
        .expect("put should run");
    assert!(
        put.status.success(),
        "put failed: {}",
        String::from_utf8_lossy(&put.stderr)
    );

    let output = wait_with_deadline(reader, Duration::from_secs(15));
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be json"))
        .collect();
    assert_eq!(lines.len(), 2);
    for line in &lines {
        assert_eq!(line["channel"], "ch1");
        assert_eq!(line["kind"], "buffer");
        assert_eq!(line["data"], "hello");
        assert_eq!(line["flags"], 1);
    }

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn put_then_get_message_over_fifo() {
    let dir = unique_temp_dir("message");
    let path = dir.join("pipe");

    let reader = mfpipe()
        .arg("--format")
        .arg("pretty")
        .arg("get")
        .arg(&path)
        .arg("--messages")
        .arg("--count")
        .arg("1")
        .arg("--timeout")
        .arg("10s")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("get should start");
    wait_for_fifo(&path, Duration::from_secs(5));

    let put = mfpipe()
        .arg("put")
        .arg(&path)
        .arg("--message")
        .arg("evt")
        .arg("--param")
        .arg("param")
        .output()
        .expect("put should run");
    assert!(put.status.success());

    let output = wait_with_deadline(reader, Duration::from_secs(15));
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("name=evt param=param"), "stdout: {stdout}");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn get_timeout_returns_124() {
    let dir = unique_temp_dir("timeout");
    let path = dir.join("pipe");

    let output = mfpipe()
        .arg("get")
        .arg(&path)
        .arg("--count")
        .arg("1")
        .arg("--timeout")
        .arg("300ms")
        .output()
        .expect("get should run");

    assert_eq!(output.status.code(), Some(124));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn put_without_reader_times_out() {
    let dir = unique_temp_dir("noreader");
    let path = dir.join("pipe");

    let create = mfpipe().arg("create").arg(&path).output().expect("create");
    assert!(create.status.success());

    let output = mfpipe()
        .arg("put")
        .arg(&path)
        .arg("--data")
        .arg("x")
        .arg("--timeout")
        .arg("200ms")
        .output()
        .expect("put should run");
    assert_eq!(output.status.code(), Some(124));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn empty_identifier_is_usage_error() {
    let output = mfpipe().arg("create").arg("").output().expect("create should run");
    assert_eq!(output.status.code(), Some(64));
}
