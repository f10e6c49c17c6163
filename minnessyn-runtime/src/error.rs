use thiserror::Error;

use crate::connection::ConnectionState;
use crate::transport::TransportError;
use minnessyn_core::CoreError;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("configuration error: {0}")]
    Core(#[from] CoreError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("session already initialized")]
    AlreadyInitialized,

    #[error("session not initialized")]
    NotInitialized,

    #[error("cannot wait for a viewer while the connection is {from:?}")]
    InvalidTransition { from: ConnectionState },
}
