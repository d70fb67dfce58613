//! sockfwd - Forward data between different socket types
//!
//! # Usage
//!
//! ```bash
//! sockfwd --listen-type tcp --listen-addr :12347 --connect-type abstract --connect-addr webview
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use sockfwd_core::{Concurrency, DrainMode, Error, ForwardConfig, ShutdownMode};
use sockfwd_relay::{Forwarder, Shutdown};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EXAMPLES: &str = "\
Examples:
  sockfwd --listen-type tcp --listen-addr :12347 --connect-type abstract --connect-addr webview
  sockfwd --listen-type tcp --listen-addr :8080 --connect-type unix --connect-addr /tmp/socket
  sockfwd --listen-type unix --listen-addr /tmp/listen.sock --connect-type tcp --connect-addr localhost:9090";

#[derive(Parser, Debug)]
#[command(name = "sockfwd", version)]
#[command(about = "Socket Forwarder - Forward data between different socket types")]
#[command(after_help = EXAMPLES)]
struct Args {
    /// Listen type: tcp, unix
    #[arg(long, default_value = "tcp")]
    listen_type: String,

    /// Listen address
    #[arg(long, default_value = "")]
    listen_addr: String,

    /// Connect type: tcp, unix, abstract
    #[arg(long, default_value = "unix")]
    connect_type: String,

    /// Connect address
    #[arg(long, default_value = "")]
    connect_addr: String,

    /// Handle one connection at a time instead of forking a task per connection
    #[arg(long)]
    no_fork: bool,

    /// Wait for both directions to finish instead of closing on the first EOF
    #[arg(long)]
    full_duplex: bool,

    /// On shutdown, wait for in-flight connections to finish
    #[arg(long)]
    wait_sessions: bool,

    /// Seconds to wait for the target to accept a connection
    #[arg(long, default_value_t = 10.0)]
    connect_timeout: f64,

    /// JSON config file; replaces all other options
    #[arg(long, short)]
    config: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> sockfwd_core::Result<ForwardConfig> {
        if let Some(path) = self.config {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| Error::config(format!("failed to read {}: {}", path.display(), e)))?;
            return serde_json::from_str(&text)
                .map_err(|e| Error::config(format!("failed to parse {}: {}", path.display(), e)));
        }

        let connect_timeout = Duration::try_from_secs_f64(self.connect_timeout)
            .map_err(|e| Error::config(format!("invalid connect timeout: {}", e)))?;

        let concurrency = if self.no_fork {
            Concurrency::Serialized
        } else {
            Concurrency::Concurrent
        };
        let drain = if self.full_duplex {
            DrainMode::FullDuplex
        } else {
            DrainMode::HalfDuplex
        };
        let shutdown = if self.wait_sessions {
            ShutdownMode::Wait
        } else {
            ShutdownMode::Detach
        };

        Ok(ForwardConfig::new(
            self.listen_type.parse()?,
            self.listen_addr,
            self.connect_type.parse()?,
            self.connect_addr,
        )
        .concurrency(concurrency)
        .drain(drain)
        .shutdown(shutdown)
        .connect_timeout(connect_timeout))
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.config.is_none() && (args.listen_addr.is_empty() || args.connect_addr.is_empty()) {
        let _ = Args::command().print_help();
        return ExitCode::FAILURE;
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = match args.into_config().and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "Failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    rt.block_on(run(config))
}

async fn run(config: ForwardConfig) -> ExitCode {
    let shutdown = Shutdown::new();

    let forwarder = match Forwarder::bind(config, shutdown.signal()).await {
        Ok(forwarder) => forwarder,
        Err(e) => {
            error!(error = %e, "Forwarder error");
            return ExitCode::FAILURE;
        }
    };

    let handle = tokio::spawn(forwarder.run());

    wait_for_signal().await;
    info!("Received shutdown signal");
    shutdown.trigger();

    match handle.await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Accept loop failed");
            ExitCode::FAILURE
        }
    }
}

/// Resolve on Ctrl-C or SIGTERM
#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use sockfwd_core::TransportKind;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("sockfwd").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_listen_tcp_connect_unix() {
        let config = parse(&["--listen-addr", ":8080", "--connect-addr", "/tmp/socket"])
            .into_config()
            .unwrap();
        assert_eq!(config.listen_kind, TransportKind::Tcp);
        assert_eq!(config.connect_kind, TransportKind::Unix);
        assert_eq!(config.concurrency, Concurrency::Concurrent);
        assert_eq!(config.drain, DrainMode::HalfDuplex);
        assert_eq!(config.shutdown, ShutdownMode::Detach);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn mode_flags_are_applied() {
        let config = parse(&[
            "--listen-type",
            "unix",
            "--listen-addr",
            "/tmp/listen.sock",
            "--connect-type",
            "tcp",
            "--connect-addr",
            "localhost:9090",
            "--no-fork",
            "--full-duplex",
            "--wait-sessions",
            "--connect-timeout",
            "0.5",
        ])
        .into_config()
        .unwrap();
        assert_eq!(config.listen_kind, TransportKind::Unix);
        assert_eq!(config.concurrency, Concurrency::Serialized);
        assert_eq!(config.drain, DrainMode::FullDuplex);
        assert_eq!(config.shutdown, ShutdownMode::Wait);
        assert_eq!(config.connect_timeout, Duration::from_millis(500));
    }

    #[test]
    fn unknown_connect_type_is_a_config_error() {
        let result = parse(&[
            "--listen-addr",
            ":8080",
            "--connect-type",
            "bogus",
            "--connect-addr",
            "x",
        ])
        .into_config();
        assert!(matches!(result, Err(Error::UnsupportedTransport(kind)) if kind == "bogus"));
    }

    #[test]
    fn negative_timeout_is_rejected() {
        let result = parse(&[
            "--listen-addr",
            ":8080",
            "--connect-addr",
            "/tmp/socket",
            "--connect-timeout=-1",
        ])
        .into_config();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn config_file_replaces_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sockfwd.json");
        std::fs::write(
            &path,
            r#"{"listen_kind":"tcp","listen_addr":":12347","connect_kind":"abstract","connect_addr":"webview"}"#,
        )
        .unwrap();

        let config = parse(&["--config", path.to_str().unwrap()])
            .into_config()
            .unwrap();
        assert_eq!(config.listen_addr, ":12347");
        assert_eq!(config.connect_kind, TransportKind::Abstract);
    }
}
