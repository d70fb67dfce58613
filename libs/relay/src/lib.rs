//! Sockfwd Relay - Accept, dial and splice
//!
//! A [`Forwarder`] owns one listener. For every inbound connection it dials
//! the configured target and copies bytes both ways until the session is
//! over, either inline or on its own task.
//!
//! # Example
//!
//! ```no_run
//! use sockfwd_core::{ForwardConfig, TransportKind};
//! use sockfwd_relay::{Forwarder, Shutdown};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ForwardConfig::new(TransportKind::Tcp, ":12347", TransportKind::Abstract, "webview");
//! let shutdown = Shutdown::new();
//! let forwarder = Forwarder::bind(config, shutdown.signal()).await?;
//!
//! let handle = tokio::spawn(forwarder.run());
//! tokio::signal::ctrl_c().await?;
//! shutdown.trigger();
//! let summary = handle.await?;
//! println!("handled {} connections", summary.accepted);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod relay;
pub mod server;
pub mod shutdown;

// Re-exports for convenience
pub use error::{Error, Result};
pub use relay::{relay, CopyStatus, DirectionOutcome, RelayOutcome};
pub use server::{Forwarder, RunSummary};
pub use shutdown::{Shutdown, ShutdownSignal};
