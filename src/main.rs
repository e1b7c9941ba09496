//! RAG service (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!   rag-service process
//!   ┌──────────────────────────────────────────────────────────┐
//!   │  config ──▶ observability (tracing subscriber)           │
//!   │     │                                                    │
//!   │     ▼                                                    │
//!   │  LifecycleOrchestrator ◀── SIGINT / SIGTERM listener     │
//!   │     │  managed context                                   │
//!   │     ▼                                                    │
//!   │  RpcServer.start() ── wait_for_shutdown() ──┐            │
//!   │                                             ▼            │
//!   │  shutdown hooks (newest first): RpcServer.stop() ...     │
//!   │                                             │            │
//!   │                                     exit code            │
//!   └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use rag_service::config::{self, validation::validate_config, ServiceConfig};
use rag_service::lifecycle::{ExitStatus, LifecycleOrchestrator, ManagedError};
use rag_service::observability::init_logging;
use rag_service::server::RpcServer;

#[derive(Parser, Debug)]
#[command(name = "rag-service")]
#[command(about = "RAG service process with graceful, ordered shutdown", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Exit instead of falling back to defaults when the config file fails to load.
    #[arg(long)]
    strict_config: bool,

    /// Override server.host.
    #[arg(long)]
    host: Option<String>,

    /// Override server.port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Override logging.level.
    #[arg(long)]
    log_level: Option<String>,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut ServiceConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (mut config, config_error) = config::load_or_default(cli.config.as_deref());
    if cli.strict_config {
        if let Some(e) = &config_error {
            eprintln!("FATAL: {}", e);
            return ExitStatus::Fatal.into();
        }
    }

    cli.apply_overrides(&mut config);
    if let Err(errors) = validate_config(&config) {
        for e in errors {
            eprintln!("FATAL: invalid configuration: {}", e);
        }
        return ExitStatus::Fatal.into();
    }

    if cli.print_config {
        return match toml::to_string_pretty(&config) {
            Ok(rendered) => {
                print!("{}", rendered);
                ExitStatus::Success.into()
            }
            Err(e) => {
                eprintln!("FATAL: failed to render configuration: {}", e);
                ExitStatus::Fatal.into()
            }
        };
    }

    let _logging = match init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("FATAL: {}", e);
            return ExitStatus::Fatal.into();
        }
    };

    if let Some(e) = config_error {
        tracing::warn!(error = %e, "Using default configuration: {}", e);
    }

    tracing::info!(
        service = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        "Starting"
    );

    let status = run(config);
    tracing::info!(code = status.code(), "Exiting");
    status.into()
}

fn run(config: ServiceConfig) -> ExitStatus {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .thread_name("rag-worker")
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build async runtime");
            return ExitStatus::Fatal;
        }
    };

    let policy = config.lifecycle.hook_failure_policy;
    let orchestrator = LifecycleOrchestrator::new(config.lifecycle.clone());
    let server = Arc::new(RpcServer::new(
        config.service.name.clone(),
        config.server.clone(),
        runtime.handle().clone(),
    ));

    let outcome = {
        let _enter = runtime.enter();
        orchestrator.run_managed(|ctx| -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            server.register_with(ctx.orchestrator())?;
            server.start()?;
            ctx.wait_for_shutdown();
            Ok(())
        })
    };

    let body_ok = match outcome {
        Ok(()) => true,
        Err(ManagedError::Lifecycle(e)) => {
            tracing::error!(error = %e, "Could not enter managed context");
            false
        }
        Err(ManagedError::Body(_)) => false,
    };

    drop(server);
    runtime.shutdown_timeout(Duration::from_secs(1));

    ExitStatus::resolve(body_ok, orchestrator.report().as_ref(), policy)
}
