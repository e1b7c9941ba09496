//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};

use rag_service::config::{LifecycleConfig, ServerConfig};
use rag_service::lifecycle::{HookResult, LifecycleOrchestrator};
use tracing_subscriber::fmt::MakeWriter;

/// Orchestrator that never touches the terminal.
pub fn orchestrator() -> Arc<LifecycleOrchestrator> {
    LifecycleOrchestrator::new(LifecycleConfig {
        clear_terminal_line: false,
        poll_interval_ms: 5,
        ..LifecycleConfig::default()
    })
}

/// Loopback server config on an ephemeral port.
pub fn local_server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        max_workers: 4,
        max_shutdown_secs: 2,
    }
}

/// Records the order hooks ran in.
#[derive(Clone, Default)]
pub struct HookLog(Arc<Mutex<Vec<&'static str>>>);

impl HookLog {
    pub fn hook(&self, label: &'static str) -> impl FnOnce() -> HookResult + Send + 'static {
        let log = self.clone();
        move || {
            log.0.lock().unwrap().push(label);
            Ok(())
        }
    }

    pub fn failing_hook(&self, label: &'static str, message: &'static str) -> impl FnOnce() -> HookResult + Send + 'static {
        let log = self.clone();
        move || {
            log.0.lock().unwrap().push(label);
            Err(message.into())
        }
    }

    pub fn entries(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

/// In-memory sink for tracing output.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// A dispatcher writing plain-text events into this capture.
    pub fn dispatch(&self) -> tracing::Dispatch {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::Dispatch::new(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.contents().lines().filter(|line| line.contains(needle)).count()
    }
}

pub struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter(Arc::clone(&self.0))
    }
}
