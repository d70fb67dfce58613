use thiserror::Error;

/// Errors that stop the forwarder from starting
///
/// Anything that goes wrong once the forwarder is running is confined to the
/// session it happened in and only logged.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] sockfwd_core::Error),

    #[error(transparent)]
    Fabric(#[from] sockfwd_fabric::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
