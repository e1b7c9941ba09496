//! RAG service process runtime: lifecycle orchestration, configuration,
//! logging and the managed network server.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod server;

pub use config::schema::ServiceConfig;
pub use lifecycle::{LifecycleOrchestrator, ManagedContext};
pub use server::RpcServer;
