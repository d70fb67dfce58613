use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported transport: {0}")]
    UnsupportedTransport(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
