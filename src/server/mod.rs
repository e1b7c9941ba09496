//! Server subsystem.
//!
//! # Data Flow
//! ```text
//! main body:
//!     RpcServer::register_with(orchestrator)   → stop() queued as shutdown hook
//!     RpcServer::start()                       → bind, spawn accept loop, return
//!
//! shutdown routine:
//!     stop hook → signal accept loop → drain connections (bounded) → stopped
//! ```

pub mod rpc;

pub use rpc::{RpcServer, ServerError};
