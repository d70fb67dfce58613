use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, warn};

use crate::connection::{Connection, Endpoint};
use crate::error::{Error, Result};
use crate::transport::{with_connect_timeout, Acceptor, ABSTRACT_PREFIX};

/// Unix socket listener for accepting incoming connections
pub struct UnixTransportListener {
    listener: UnixListener,
    path: PathBuf,
}

impl UnixTransportListener {
    /// Bind to a Unix socket path
    ///
    /// Anything already at the path is assumed to be a socket left behind by
    /// a previous instance and is removed first. Removal is best-effort; a
    /// real conflict shows up as a bind error.
    pub async fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if std::fs::symlink_metadata(&path).is_ok() {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed stale socket file"),
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove stale socket file"),
            }
        }

        let listener =
            UnixListener::bind(&path).map_err(|e| Error::listen(path.display().to_string(), e))?;
        Ok(Self { listener, path })
    }

    /// Get the path this listener is bound to
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UnixTransportListener {
    fn drop(&mut self) {
        // Clean up socket file on drop
        let _ = std::fs::remove_file(&self.path);
    }
}

#[async_trait::async_trait]
impl Acceptor for UnixTransportListener {
    async fn accept(&self) -> Result<(Connection, Endpoint)> {
        let (stream, addr) = self.listener.accept().await?;
        let peer = Endpoint::Unix(addr.as_pathname().map(Path::to_path_buf));
        Ok((Connection::Unix(stream), peer))
    }

    fn local_endpoint(&self) -> Result<Endpoint> {
        Ok(Endpoint::Unix(Some(self.path.clone())))
    }
}

/// Address of a Unix socket to connect to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnixAddress {
    /// Socket file on the filesystem
    Path(PathBuf),
    /// Name in the Linux abstract namespace, with or without the leading `@`
    Abstract(String),
}

/// Builder for outbound Unix socket connections
#[derive(Default)]
pub struct UnixTransportBuilder {
    address: Option<UnixAddress>,
    connect_timeout: Option<Duration>,
}

impl UnixTransportBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the socket path to connect to
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.address = Some(UnixAddress::Path(path.as_ref().to_path_buf()));
        self
    }

    /// Set an abstract-namespace name to connect to
    pub fn abstract_name(mut self, name: impl Into<String>) -> Self {
        self.address = Some(UnixAddress::Abstract(name.into()));
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
            .ok_or_else(|| Error::InvalidAddress("Path not set".to_string()))?;

        let stream = match address {
            UnixAddress::Path(path) => {
                with_connect_timeout(self.connect_timeout, UnixStream::connect(path)).await?
            }
            UnixAddress::Abstract(name) => {
                let name = name.strip_prefix(ABSTRACT_PREFIX).unwrap_or(&name);
                connect_abstract(name, self.connect_timeout).await?
            }
        };

        Ok(Connection::Unix(stream))
    }
}

#[cfg(target_os = "linux")]
async fn connect_abstract(name: &str, timeout: Option<Duration>) -> Result<UnixStream> {
    use std::os::linux::net::SocketAddrExt;

    let addr = std::os::unix::net::SocketAddr::from_abstract_name(name.as_bytes())?;

    // std has no async connect for abstract addresses, and a Unix connect only
    // blocks while the listener's backlog is full. A timed-out connect leaves
    // its blocking thread running until the kernel gives up; that is accepted.
    let connect_op = async move {
        let stream = tokio::task::spawn_blocking(move || {
            std::os::unix::net::UnixStream::connect_addr(&addr)
        })
        .await
        .map_err(std::io::Error::other)??;
        stream.set_nonblocking(true)?;
        UnixStream::from_std(stream)
    };

    with_connect_timeout(timeout, connect_op).await
}

#[cfg(not(target_os = "linux"))]
async fn connect_abstract(name: &str, _timeout: Option<Duration>) -> Result<UnixStream> {
    Err(Error::Unsupported(format!(
        "abstract socket {}{} requires Linux",
        ABSTRACT_PREFIX, name
    )))
}
