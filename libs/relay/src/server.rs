use std::time::Duration;

use sockfwd_core::{Concurrency, DrainMode, ForwardConfig, ShutdownMode};
use sockfwd_fabric::{listen, Acceptor, Connection, Endpoint, Target};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::relay::{relay, CopyStatus, DirectionOutcome, RelayOutcome};
use crate::shutdown::ShutdownSignal;

/// Pause after a failed accept so a persistent fault (e.g. out of file
/// descriptors) does not turn into a busy loop
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Counters reported when the accept loop stops
///
/// `sessions` and `dial_failures` only include sessions that finished while
/// the loop was still watching them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Inbound connections accepted
    pub accepted: u64,
    /// Sessions that dialed the target and finished relaying
    pub sessions: u64,
    /// Inbound connections dropped because the target could not be dialed
    pub dial_failures: u64,
    /// Failed accept calls
    pub accept_errors: u64,
}

enum SessionOutcome {
    DialFailed,
    Relayed,
}

/// Accept loop pairing every inbound connection with a freshly dialed
/// target connection
pub struct Forwarder {
    acceptor: Box<dyn Acceptor>,
    target: Target,
    concurrency: Concurrency,
    drain: DrainMode,
    shutdown_mode: ShutdownMode,
    shutdown: ShutdownSignal,
}

impl Forwarder {
    /// Validate the config and bind the listener
    ///
    /// Errors here are fatal: the forwarder cannot run without its listener.
    pub async fn bind(config: ForwardConfig, shutdown: ShutdownSignal) -> Result<Self> {
        config.validate()?;

        info!(
            listen = %format!("{}:{}", config.listen_kind, config.listen_addr),
            target = %format!("{}:{}", config.connect_kind, config.connect_addr),
            "Starting socket forwarder"
        );

        let acceptor = listen(config.listen_kind, &config.listen_addr).await?;
        let target =
            Target::new(config.connect_kind, config.connect_addr).connect_timeout(config.connect_timeout);

        info!(
            listen = %format!("{}:{}", config.listen_kind, config.listen_addr),
            "Listening"
        );

        Ok(Self {
            acceptor,
            target,
            concurrency: config.concurrency,
            drain: config.drain,
            shutdown_mode: config.shutdown,
            shutdown,
        })
    }

    /// Where the listener is bound
    pub fn local_endpoint(&self) -> Result<Endpoint> {
        Ok(self.acceptor.local_endpoint()?)
    }

    /// Accept connections until shutdown is signalled
    ///
    /// In serialized mode a running session is never interrupted, so shutdown
    /// takes effect once it finishes.
    pub async fn run(self) -> RunSummary {
        let Forwarder {
            acceptor,
            target,
            concurrency,
            drain,
            shutdown_mode,
            mut shutdown,
        } = self;

        let mut summary = RunSummary::default();
        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                result = acceptor.accept() => {
                    match result {
                        Ok((inbound, peer)) => {
                            summary.accepted += 1;
                            let id = summary.accepted;
                            info!(session = id, peer = %peer, "New connection");

                            let session = run_session(id, inbound, peer, target.clone(), drain);
                            match concurrency {
                                Concurrency::Concurrent => {
                                    sessions.spawn(session);
                                }
                                Concurrency::Serialized => {
                                    record(&mut summary, session.await);
                                }
                            }
                        }
                        Err(e) => {
                            summary.accept_errors += 1;
                            error!(error = %e, "Accept error");
                            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        }
                    }
                }
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    reap(&mut summary, joined);
                }
                _ = shutdown.recv() => {
                    break;
                }
            }
        }

        // Stop listening before anything else
        drop(acceptor);

        match shutdown_mode {
            ShutdownMode::Detach => {
                if !sessions.is_empty() {
                    info!(in_flight = sessions.len(), "Leaving in-flight sessions running");
                }
                sessions.detach_all();
            }
            ShutdownMode::Wait => {
                if !sessions.is_empty() {
                    info!(in_flight = sessions.len(), "Waiting for in-flight sessions");
                }
                while let Some(joined) = sessions.join_next().await {
                    reap(&mut summary, joined);
                }
            }
        }

        info!(
            accepted = summary.accepted,
            sessions = summary.sessions,
            dial_failures = summary.dial_failures,
            accept_errors = summary.accept_errors,
            "Shutting down"
        );

        summary
    }
}

fn record(summary: &mut RunSummary, outcome: SessionOutcome) {
    match outcome {
        SessionOutcome::DialFailed => summary.dial_failures += 1,
        SessionOutcome::Relayed => summary.sessions += 1,
    }
}

fn reap(summary: &mut RunSummary, joined: std::result::Result<SessionOutcome, tokio::task::JoinError>) {
    match joined {
        Ok(outcome) => record(summary, outcome),
        Err(e) => error!(error = %e, "Session task failed"),
    }
}

/// Dial the target for one accepted connection and relay until done
async fn run_session(
    id: u64,
    inbound: Connection,
    peer: Endpoint,
    target: Target,
    drain: DrainMode,
) -> SessionOutcome {
    // Dropping `inbound` on failure closes the client connection
    let outbound = match target.dial().await {
        Ok(outbound) => outbound,
        Err(e) => {
            warn!(session = id, target = %target, error = %e, "Failed to connect to target");
            return SessionOutcome::DialFailed;
        }
    };

    debug!(session = id, target = %target, "Connected to target");

    let outcome = relay(inbound, outbound, drain).await;
    log_outcome(id, &outcome);

    info!(session = id, peer = %peer, "Connection closed");
    SessionOutcome::Relayed
}

fn log_outcome(id: u64, outcome: &RelayOutcome) {
    log_direction(id, "client->target", &outcome.inbound_to_outbound);
    log_direction(id, "target->client", &outcome.outbound_to_inbound);
}

fn log_direction(id: u64, direction: &str, outcome: &DirectionOutcome) {
    match &outcome.status {
        CopyStatus::Eof => {
            info!(session = id, direction, bytes = outcome.bytes, "Bytes forwarded")
        }
        CopyStatus::Error(e) => {
            warn!(session = id, direction, bytes = outcome.bytes, error = %e, "Copy error")
        }
        CopyStatus::Abandoned => {
            debug!(session = id, direction, bytes = outcome.bytes, "Direction cut off")
        }
    }
}
