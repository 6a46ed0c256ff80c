//! Protocol errors

use thiserror::Error;

use crate::transport::TransportError;

/// Errors that can occur while talking to the air-supply controller
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed parameter: {0}")]
    MalformedParameter(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Response timeout")]
    Timeout,

    #[error("Response abandoned after a read failure")]
    ResponseAbandoned,

    #[error("Response reader is not running")]
    ReaderStopped,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
