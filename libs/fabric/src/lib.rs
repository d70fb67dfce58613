//! Sockfwd Fabric - Socket plumbing for the forwarder
//!
//! Opens raw byte-stream connections over TCP, Unix domain sockets and
//! Linux abstract-namespace sockets, and binds the listeners that accept
//! them. Nothing here looks at the bytes.
//!
//! # Example
//!
//! ```no_run
//! use sockfwd_core::TransportKind;
//! use sockfwd_fabric::{listen, Acceptor, Target};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let acceptor = listen(TransportKind::Tcp, "127.0.0.1:8080").await?;
//! let (inbound, peer) = acceptor.accept().await?;
//!
//! let target = Target::parse("abstract", "webview")?;
//! let outbound = target.dial().await?;
//! # let _ = (inbound, peer, outbound);
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod transport;

// Re-exports for convenience
pub use connection::{Connection, Endpoint};
pub use error::{Error, Result};
pub use transport::{abstract_name, listen, Acceptor, Target};
