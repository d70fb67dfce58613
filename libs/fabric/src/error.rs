use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] sockfwd_core::Error),

    #[error("Unsupported on this platform: {0}")]
    Unsupported(String),

    #[error("Connect timeout exceeded after {0:?}")]
    ConnectTimeout(Duration),

    #[error("Address already in use: {0}")]
    AddressInUse(String),

    #[error("Failed to listen on {address}: {source}")]
    Listen {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

impl Error {
    /// Map a bind failure, singling out an address that is already taken
    pub(crate) fn listen(address: impl Into<String>, source: std::io::Error) -> Self {
        let address = address.into();
        if source.kind() == std::io::ErrorKind::AddrInUse {
            Self::AddressInUse(address)
        } else {
            Self::Listen { address, source }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
