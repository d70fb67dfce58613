use std::fmt;
use std::time::Duration;

use sockfwd_core::config::DEFAULT_CONNECT_TIMEOUT;
use sockfwd_core::TransportKind;

use crate::connection::{Connection, Endpoint};
use crate::error::Result;

pub mod tcp;
pub mod unix;

pub use self::tcp::{TcpTransportBuilder, TcpTransportListener};
pub use self::unix::{UnixAddress, UnixTransportBuilder, UnixTransportListener};

/// Leading character that marks a name in the abstract socket namespace
pub const ABSTRACT_PREFIX: char = '@';

/// Source of inbound connections
///
/// Each acceptor owns one bound socket. Dropping it stops listening.
#[async_trait::async_trait]
pub trait Acceptor: Send + Sync {
    /// Wait for the next inbound connection
    async fn accept(&self) -> Result<(Connection, Endpoint)>;

    /// Where this acceptor is bound
    fn local_endpoint(&self) -> Result<Endpoint>;
}

/// Bind an acceptor for the given transport
///
/// Abstract-namespace sockets are only ever dialed, so listening on one is
/// rejected before anything is bound.
pub async fn listen(kind: TransportKind, address: &str) -> Result<Box<dyn Acceptor>> {
    match kind {
        TransportKind::Tcp => Ok(Box::new(TcpTransportListener::bind(address).await?)),
        TransportKind::Unix => Ok(Box::new(UnixTransportListener::bind(address).await?)),
        TransportKind::Abstract => {
            Err(sockfwd_core::Error::UnsupportedTransport(format!("{} (listen side)", kind)).into())
        }
    }
}

/// Normalize a name for the abstract namespace so it starts with `@`
///
/// Idempotent: `"webview"` and `"@webview"` both give `"@webview"`.
pub fn abstract_name(name: &str) -> String {
    if name.starts_with(ABSTRACT_PREFIX) {
        name.to_string()
    } else {
        format!("{}{}", ABSTRACT_PREFIX, name)
    }
}

/// Where outbound connections go
///
/// A target dials once per call with a bounded connect time and never
/// retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    kind: TransportKind,
    address: String,
    connect_timeout: Duration,
}

impl Target {
    /// Create a target with the default 10 second connect timeout
    pub fn new(kind: TransportKind, address: impl Into<String>) -> Self {
        let address = address.into();
        let address = match kind {
            TransportKind::Abstract => abstract_name(&address),
            _ => address,
        };
        Self {
            kind,
            address,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Create a target from a transport name such as `"tcp"`
    ///
    /// Unknown names fail here, before any socket is touched.
    pub fn parse(kind: &str, address: impl Into<String>) -> Result<Self> {
        let kind: TransportKind = kind.parse()?;
        Ok(Self::new(kind, address))
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Address as it will be dialed, after normalization
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Open one connection to the target
    pub async fn dial(&self) -> Result<Connection> {
        match self.kind {
            TransportKind::Tcp => {
                TcpTransportBuilder::new()
                    .address(&self.address)
                    .connect_timeout(self.connect_timeout)
                    .connect()
                    .await
            }
            TransportKind::Unix => {
                UnixTransportBuilder::new()
                    .path(&self.address)
                    .connect_timeout(self.connect_timeout)
                    .connect()
                    .await
            }
            TransportKind::Abstract => {
                UnixTransportBuilder::new()
                    .abstract_name(&self.address)
                    .connect_timeout(self.connect_timeout)
                    .connect()
                    .await
            }
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.address)
    }
}

/// Run a connect future under an optional deadline
pub(crate) async fn with_connect_timeout<F, T>(timeout: Option<Duration>, connect_op: F) -> Result<T>
where
    F: std::future::Future<Output = std::io::Result<T>>,
{
    match timeout {
        Some(timeout) => Ok(tokio::time::timeout(timeout, connect_op)
            .await
            .map_err(|_| crate::error::Error::ConnectTimeout(timeout))??),
        None => Ok(connect_op.await?),
    }
}
