//! End-to-end tests against the built binary: signals and exit codes.
#![cfg(unix)]

use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};

const BIN: &str = env!("CARGO_BIN_EXE_rag-service");

fn spawn(args: &[&str]) -> Child {
    Command::new(BIN)
        .args(args)
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn rag-service")
}

/// Read stdout lines until one contains `needle`; returns everything read.
fn read_until(reader: &mut impl BufRead, needle: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    while reader.read_line(&mut line).unwrap() > 0 {
        let done = line.contains(needle);
        lines.push(std::mem::take(&mut line));
        if done {
            break;
        }
    }
    lines
}

fn send(signal: &str, child: &Child) {
    let _ = Command::new("kill")
        .args([signal, &child.id().to_string()])
        .status();
}

fn count(lines: &[String], needle: &str) -> usize {
    lines.iter().filter(|l| l.contains(needle)).count()
}

#[test]
fn sigterm_shuts_down_cleanly() {
    let mut child = spawn(&["--port", "0"]);
    let mut stdout = BufReader::new(child.stdout.take().unwrap());

    let mut lines = read_until(&mut stdout, "server running at");
    assert_eq!(count(&lines, "server running at"), 1, "server never started: {:?}", lines);

    send("-TERM", &child);
    let status = child.wait().unwrap();
    lines.extend(stdout.lines().map(|l| l.unwrap()));

    assert_eq!(status.code(), Some(0), "logs: {:?}", lines);
    assert_eq!(count(&lines, "Received SIGTERM signal. Starting shutdown"), 1);
    assert_eq!(count(&lines, "rag server stopped"), 1);
    assert_eq!(count(&lines, "Shutdown complete with no errors"), 1);
}

#[test]
fn repeated_signals_start_shutdown_once() {
    let mut child = spawn(&["--port", "0"]);
    let mut stdout = BufReader::new(child.stdout.take().unwrap());

    let mut lines = read_until(&mut stdout, "server running at");
    send("-INT", &child);
    send("-TERM", &child);
    let status = child.wait().unwrap();
    lines.extend(stdout.lines().map(|l| l.unwrap()));

    assert_eq!(status.code(), Some(0), "logs: {:?}", lines);
    assert_eq!(count(&lines, "Starting shutdown ..."), 1);
    assert_eq!(count(&lines, "functions before completing the shutdown"), 1);
}

#[test]
fn bind_failure_exits_nonzero_after_shutdown() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port().to_string();

    let mut child = spawn(&["--port", &port]);
    let mut stdout = String::new();
    child.stdout.take().unwrap().read_to_string(&mut stdout).unwrap();
    let status = child.wait().unwrap();

    assert_eq!(status.code(), Some(1), "logs: {}", stdout);
    assert!(stdout.contains("Error during app execution"));
    assert!(stdout.contains("Shutdown complete with no errors"));
}

#[test]
fn strict_config_rejects_missing_file() {
    let output = Command::new(BIN)
        .args(["--config", "/nonexistent/rag.toml", "--strict-config"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("FATAL"));
}

#[test]
fn missing_config_falls_back_to_defaults() {
    let output = Command::new(BIN)
        .args(["--config", "/nonexistent/rag.toml", "--print-config"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    let rendered = String::from_utf8_lossy(&output.stdout);
    assert!(rendered.contains("port = 50051"));
    assert!(rendered.contains("hook_failure_policy = \"ignore\""));
}

#[test]
fn invalid_override_is_fatal() {
    let output = Command::new(BIN)
        .args(["--host", "not-an-ip", "--print-config"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not a valid IP address"));
}
