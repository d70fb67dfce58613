//! Sockfwd Core - Configuration model shared by the forwarder crates
//!
//! Describes where to listen, where to connect, and how sessions are
//! scheduled, drained and shut down. Values are validated once here so the
//! rest of the workspace can assume a well-formed [`ForwardConfig`].

pub mod config;
pub mod error;

pub use config::{Concurrency, DrainMode, ForwardConfig, ShutdownMode, TransportKind};
pub use error::{Error, Result};
