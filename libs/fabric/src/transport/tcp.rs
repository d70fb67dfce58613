use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

use crate::connection::{Connection, Endpoint};
use crate::error::{Error, Result};
use crate::transport::{with_connect_timeout, Acceptor};

/// Expand the `:port` shorthand into a full `host:port`
fn expand_host(address: &str, default_host: &str) -> String {
    if address.starts_with(':') {
        format!("{}{}", default_host, address)
    } else {
        address.to_string()
    }
}

/// TCP listener for accepting incoming connections
pub struct TcpTransportListener {
    listener: TcpListener,
}

impl TcpTransportListener {
    /// Bind to a `host:port` address
    ///
    /// A bare `:port` listens on all IPv4 interfaces.
    pub async fn bind(address: &str) -> Result<Self> {
        let address = expand_host(address, "0.0.0.0");
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| Error::listen(address, e))?;
        Ok(Self { listener })
    }

    /// Get the local address this listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(Into::into)
    }
}

#[async_trait::async_trait]
impl Acceptor for TcpTransportListener {
    async fn accept(&self) -> Result<(Connection, Endpoint)> {
        let (stream, addr) = self.listener.accept().await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %addr, error = %e, "failed to disable Nagle on inbound stream");
        }
        Ok((Connection::Tcp(stream), Endpoint::Tcp(addr)))
    }

    fn local_endpoint(&self) -> Result<Endpoint> {
        Ok(Endpoint::Tcp(self.local_addr()?))
    }
}

/// Builder for outbound TCP connections
#[derive(Default)]
pub struct TcpTransportBuilder {
    address: Option<String>,
    connect_timeout: Option<Duration>,
}

impl TcpTransportBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `host:port` to connect to
    ///
    /// A bare `:port` connects to the loopback interface.
    pub fn address(mut self, address: impl AsRef<str>) -> Self {
        self.address = Some(expand_host(address.as_ref(), "127.0.0.1"));
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Connect with the configured settings
    pub async fn connect(self) -> Result<Connection> {
        let address = self
            .address
            .ok_or_else(|| Error::InvalidAddress("Address not set".to_string()))?;

        let stream =
            with_connect_timeout(self.connect_timeout, TcpStream::connect(address.as_str())).await?;
        stream.set_nodelay(true)?;

        Ok(Connection::Tcp(stream))
    }
}
