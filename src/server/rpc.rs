//! RPC server resource.
//!
//! # Responsibilities
//! - Bind the listener and run the accept loop on the runtime
//! - Idempotent start/stop with warnings on misuse
//! - Controlled stop: stop accepting, let connections close, force after deadline
//!
//! # Design Decisions
//! - `start` returns as soon as the accept loop is spawned
//! - `stop` blocks the calling thread; call it from a shutdown hook or other
//!   non-async context, never from a runtime worker
//! - No protocol is served: connections are read until the peer closes them
//! - Stop only ends the accept loop; open connections get the drain window

use std::net::SocketAddr;
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use crate::config::ServerConfig;
use crate::lifecycle::{LifecycleError, LifecycleOrchestrator};
use crate::net::{ConnectionGuard, ConnectionPermit, ConnectionTracker, Listener, ListenerError};

/// Extra time `stop` waits beyond the drain deadline before aborting the loop.
const STOP_GRACE: Duration = Duration::from_secs(1);

/// Pause after a failed accept so persistent errors (e.g. EMFILE) don't spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Errors from the server's own lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("{service} serve loop did not exit within {timeout:?}; aborted")]
    StopTimeout { service: String, timeout: Duration },
}

/// How the serve loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServeExit {
    Drained,
    Forced { open_connections: usize },
}

struct Running {
    local_addr: SocketAddr,
    stop_tx: watch::Sender<bool>,
    exit_rx: mpsc::Receiver<ServeExit>,
    task: JoinHandle<()>,
}

/// Long-running network server managed by the lifecycle orchestrator.
pub struct RpcServer {
    service_name: String,
    config: ServerConfig,
    runtime: Handle,
    tracker: ConnectionTracker,
    running: Mutex<Option<Running>>,
}

impl RpcServer {
    pub fn new(service_name: impl Into<String>, config: ServerConfig, runtime: Handle) -> Self {
        Self {
            service_name: service_name.into(),
            config,
            runtime,
            tracker: ConnectionTracker::new(),
            running: Mutex::new(None),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_some()
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock().as_ref().map(|r| r.local_addr)
    }

    /// Connections currently open.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Start serving. A no-op with a warning if already running.
    pub fn start(&self) -> Result<(), ServerError> {
        let mut running = self.lock();
        if let Some(current) = running.as_ref() {
            tracing::warn!(
                service = %self.service_name,
                address = %current.local_addr,
                "{} server is already running at {}",
                self.service_name,
                current.local_addr
            );
            return Ok(());
        }

        let _guard = self.runtime.enter();
        let listener = Listener::bind(&self.config)?;
        let local_addr = listener.local_addr().map_err(|source| ListenerError::Bind {
            address: self.config.bind_address(),
            source,
        })?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let (exit_tx, exit_rx) = mpsc::channel();
        let task = self.runtime.spawn(serve(
            listener,
            self.tracker.clone(),
            stop_rx,
            self.drain_timeout(),
            exit_tx,
        ));

        *running = Some(Running {
            local_addr,
            stop_tx,
            exit_rx,
            task,
        });

        tracing::info!(
            service = %self.service_name,
            address = %local_addr,
            "{} server running at {}",
            self.service_name,
            local_addr
        );
        Ok(())
    }

    /// Stop serving. A no-op with a warning if not running.
    pub fn stop(&self) -> Result<(), ServerError> {
        let Some(running) = self.lock().take() else {
            tracing::warn!(service = %self.service_name, "{} server is not running", self.service_name);
            return Ok(());
        };

        tracing::info!(service = %self.service_name, "Starting controlled shutdown ...");
        let _ = running.stop_tx.send(true);

        let timeout = self.drain_timeout() + STOP_GRACE;
        match running.exit_rx.recv_timeout(timeout) {
            Ok(ServeExit::Drained) => {
                tracing::info!(service = %self.service_name, "{} server stopped", self.service_name);
                Ok(())
            }
            Ok(ServeExit::Forced { open_connections }) => {
                tracing::warn!(
                    service = %self.service_name,
                    open_connections,
                    "Timeout, forced close of {} connections",
                    open_connections
                );
                Ok(())
            }
            Err(_) => {
                running.task.abort();
                Err(ServerError::StopTimeout {
                    service: self.service_name.clone(),
                    timeout,
                })
            }
        }
    }

    /// Register `stop` as a shutdown hook named after the service.
    pub fn register_with(self: &Arc<Self>, orchestrator: &LifecycleOrchestrator) -> Result<usize, LifecycleError> {
        let server = Arc::clone(self);
        orchestrator.register_named_shutdown_hook(format!("{}-server", self.service_name), move || {
            server.stop()?;
            Ok(())
        })
    }

    fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.config.max_shutdown_secs)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for RpcServer {
    fn drop(&mut self) {
        if let Some(running) = self.lock().take() {
            let _ = running.stop_tx.send(true);
            running.task.abort();
        }
    }
}

async fn serve(
    listener: Listener,
    tracker: ConnectionTracker,
    mut stop_rx: watch::Receiver<bool>,
    drain_timeout: Duration,
    exit_tx: mpsc::Sender<ServeExit>,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            accepted = listener.accept() => match accepted {
                Ok((stream, peer, permit)) => {
                    let guard = tracker.track();
                    tracing::debug!(connection_id = %guard.id(), peer = %peer, "Serving connection");
                    connections.spawn(handle_connection(stream, permit, guard));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    if accept_backoff(&mut stop_rx).await {
                        break;
                    }
                }
            },
        }
    }

    // Stop accepting before draining.
    drop(listener);

    let drained = tokio::time::timeout(drain_timeout, async {
        while connections.join_next().await.is_some() {}
    })
    .await;

    let exit = match drained {
        Ok(()) => ServeExit::Drained,
        Err(_) => {
            let open_connections = connections.len();
            connections.shutdown().await;
            ServeExit::Forced { open_connections }
        }
    };
    let _ = exit_tx.send(exit);
}

/// Wait out `ACCEPT_BACKOFF`. Returns true if stop was signalled meanwhile.
async fn accept_backoff(stop_rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = stop_rx.changed() => true,
        _ = tokio::time::sleep(ACCEPT_BACKOFF) => false,
    }
}

/// Placeholder handler: reads and discards until the peer closes.
///
/// Stop does not cut it short; the serve loop's drain deadline does.
async fn handle_connection(mut stream: TcpStream, _permit: ConnectionPermit, _guard: ConnectionGuard) {
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn server(runtime: &tokio::runtime::Runtime) -> RpcServer {
        let config = ServerConfig {
            port: 0,
            max_shutdown_secs: 2,
            ..ServerConfig::default()
        };
        RpcServer::new("test", config, runtime.handle().clone())
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let server = server(&runtime);

        assert!(!server.is_running());
        server.stop().unwrap();

        server.start().unwrap();
        let addr = server.local_addr().unwrap();
        assert!(server.is_running());

        server.start().unwrap();
        assert_eq!(server.local_addr(), Some(addr));

        server.stop().unwrap();
        assert!(!server.is_running());
        assert_eq!(server.local_addr(), None);
        server.stop().unwrap();
    }

    #[test]
    fn can_restart_after_stop() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let server = server(&runtime);

        server.start().unwrap();
        server.stop().unwrap();
        server.start().unwrap();
        assert!(server.is_running());
        server.stop().unwrap();
    }

    #[tokio::test]
    async fn accept_backoff_pauses_unless_stopped() {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let started = Instant::now();
        assert!(!accept_backoff(&mut stop_rx).await);
        assert!(started.elapsed() >= ACCEPT_BACKOFF);

        stop_tx.send(true).unwrap();
        let started = Instant::now();
        assert!(accept_backoff(&mut stop_rx).await);
        assert!(started.elapsed() < ACCEPT_BACKOFF);
    }
}
