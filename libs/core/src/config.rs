use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upper bound on establishing an outbound connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Socket family used on either side of the forwarder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Stream socket addressed as `host:port`
    Tcp,
    /// Unix domain socket addressed by filesystem path
    Unix,
    /// Linux abstract-namespace Unix socket addressed by bare name
    Abstract,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Unix => "unix",
            Self::Abstract => "abstract",
        }
    }
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tcp" => Ok(Self::Tcp),
            "unix" => Ok(Self::Unix),
            "abstract" => Ok(Self::Abstract),
            other => Err(Error::UnsupportedTransport(other.to_string())),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How accepted connections are dispatched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concurrency {
    /// Every session runs on its own task
    #[default]
    Concurrent,
    /// The accept loop waits for each session before accepting the next
    Serialized,
}

/// When a session counts as finished
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainMode {
    /// Close both connections as soon as either direction ends.
    ///
    /// A reverse transfer still in flight is cut off.
    #[default]
    HalfDuplex,
    /// Forward the half-close to the peer and wait for both directions
    FullDuplex,
}

/// What the accept loop does with in-flight sessions once it is told to stop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownMode {
    /// Stop accepting and return immediately, sessions keep running
    #[default]
    Detach,
    /// Stop accepting, then wait until every session has finished
    Wait,
}

/// Forwarder configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardConfig {
    pub listen_kind: TransportKind,
    pub listen_addr: String,
    pub connect_kind: TransportKind,
    pub connect_addr: String,
    #[serde(default)]
    pub concurrency: Concurrency,
    #[serde(default)]
    pub drain: DrainMode,
    #[serde(default)]
    pub shutdown: ShutdownMode,
    #[serde(default = "default_connect_timeout", with = "duration_secs")]
    pub connect_timeout: Duration,
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

impl ForwardConfig {
    /// Create a config with default scheduling, draining and timeouts
    pub fn new(
        listen_kind: TransportKind,
        listen_addr: impl Into<String>,
        connect_kind: TransportKind,
        connect_addr: impl Into<String>,
    ) -> Self {
        Self {
            listen_kind,
            listen_addr: listen_addr.into(),
            connect_kind,
            connect_addr: connect_addr.into(),
            concurrency: Concurrency::default(),
            drain: DrainMode::default(),
            shutdown: ShutdownMode::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Set the session dispatch mode
    pub fn concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the session completion policy
    pub fn drain(mut self, drain: DrainMode) -> Self {
        self.drain = drain;
        self
    }

    /// Set the shutdown behaviour for in-flight sessions
    pub fn shutdown(mut self, shutdown: ShutdownMode) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Set the outbound connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Check the invariants the forwarder relies on
    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.is_empty() {
            return Err(Error::config("listen address is empty"));
        }
        if self.connect_addr.is_empty() {
            return Err(Error::config("connect address is empty"));
        }
        if self.listen_kind == TransportKind::Abstract {
            return Err(Error::UnsupportedTransport(format!(
                "{} (listen side)",
                self.listen_kind
            )));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect timeout must be non-zero"));
        }
        Ok(())
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
