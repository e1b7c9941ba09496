//! Managed server tests: start/stop contract and teardown through the orchestrator.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rag_service::lifecycle::ShutdownState;
use rag_service::net::ListenerError;
use rag_service::server::{RpcServer, ServerError};

mod common;

use common::LogCapture;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn stop_hook_tears_down_server_on_shutdown() {
    let runtime = runtime();
    let _enter = runtime.enter();
    let orch = common::orchestrator();
    let server = Arc::new(RpcServer::new("rag", common::local_server_config(), runtime.handle().clone()));

    let outcome = orch.run_managed(|ctx| -> Result<(), ServerError> {
        server.register_with(ctx.orchestrator())?;
        server.start()?;
        assert!(server.is_running());
        ctx.orchestrator().request_shutdown();
        ctx.wait_for_shutdown();
        Ok(())
    });

    assert!(outcome.is_ok());
    assert!(!server.is_running());
    assert_eq!(orch.state(), ShutdownState::Completed);
    let report = orch.report().unwrap();
    assert_eq!(report.hooks_run, 1);
    assert!(report.is_clean());
}

#[test]
fn stop_waits_for_open_connections_to_close() {
    let runtime = runtime();
    let capture = LogCapture::default();
    let mut config = common::local_server_config();
    config.max_shutdown_secs = 3;
    let server = RpcServer::new("rag", config, runtime.handle().clone());
    server.start().unwrap();

    let mut client = TcpStream::connect(server.local_addr().unwrap()).unwrap();
    client.write_all(b"ping").unwrap();
    wait_until(|| server.active_connections() == 1);

    let closer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        drop(client);
    });

    let started = Instant::now();
    tracing::dispatcher::with_default(&capture.dispatch(), || server.stop().unwrap());
    let elapsed = started.elapsed();
    closer.join().unwrap();

    assert!(elapsed >= Duration::from_millis(250), "stop returned after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "stop returned after {:?}", elapsed);
    assert_eq!(server.active_connections(), 0);
    assert_eq!(capture.count("rag server stopped"), 1);
    assert_eq!(capture.count("forced close"), 0);
}

#[test]
fn stop_forces_close_after_drain_window() {
    let runtime = runtime();
    let capture = LogCapture::default();
    let mut config = common::local_server_config();
    config.max_shutdown_secs = 1;
    let server = RpcServer::new("rag", config, runtime.handle().clone());
    server.start().unwrap();

    let mut client = TcpStream::connect(server.local_addr().unwrap()).unwrap();
    client.set_read_timeout(Some(Duration::from_secs(3))).unwrap();
    wait_until(|| server.active_connections() == 1);

    let started = Instant::now();
    tracing::dispatcher::with_default(&capture.dispatch(), || server.stop().unwrap());
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(1), "stop returned after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(2), "stop returned after {:?}", elapsed);
    assert_eq!(server.active_connections(), 0);
    assert_eq!(capture.count("Timeout, forced close of 1 connections"), 1);
    assert_eq!(capture.count("rag server stopped"), 0);

    let mut buf = [0u8; 8];
    assert_eq!(client.read(&mut buf).unwrap(), 0);
}

#[test]
fn stopped_server_refuses_connections() {
    let runtime = runtime();
    let server = RpcServer::new("rag", common::local_server_config(), runtime.handle().clone());
    server.start().unwrap();
    let addr = server.local_addr().unwrap();
    server.stop().unwrap();

    assert!(TcpStream::connect(addr).is_err());
}

#[test]
fn bind_failure_surfaces_from_start_and_shutdown_still_runs() {
    let runtime = runtime();
    let _enter = runtime.enter();
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = common::local_server_config();
    config.port = taken.local_addr().unwrap().port();

    let orch = common::orchestrator();
    let server = Arc::new(RpcServer::new("rag", config, runtime.handle().clone()));

    let outcome = orch.run_managed(|ctx| -> Result<(), ServerError> {
        server.register_with(ctx.orchestrator())?;
        server.start()?;
        ctx.wait_for_shutdown();
        Ok(())
    });

    match outcome {
        Err(rag_service::lifecycle::ManagedError::Body(ServerError::Listener(ListenerError::Bind { .. }))) => {}
        other => panic!("expected bind failure, got {:?}", other.map(|_| ())),
    }
    assert!(!server.is_running());
    // The stop hook ran against a server that never started: a warning, not an error.
    let report = orch.report().unwrap();
    assert_eq!(report.hooks_run, 1);
    assert!(report.is_clean());
}
