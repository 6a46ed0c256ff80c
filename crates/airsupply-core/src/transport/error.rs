//! Transport errors

use std::io::ErrorKind;
use thiserror::Error;

/// Errors raised by the serial transport
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("Transport closed")]
    Closed,

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serialport::Error> for TransportError {
    fn from(e: serialport::Error) -> Self {
        match e.kind() {
            serialport::ErrorKind::Io(kind) => TransportError::IoError(std::io::Error::new(kind, e)),
            _ => TransportError::SerialError(e.to_string()),
        }
    }
}

impl TransportError {
    /// True when the stream is gone for good (port closed, device unplugged).
    ///
    /// The background reader stops on these; anything else only costs the
    /// current read attempt.
    pub fn is_disconnect(&self) -> bool {
        match self {
            TransportError::Closed => true,
            TransportError::IoError(e) => matches!(
                e.kind(),
                ErrorKind::BrokenPipe
                    | ErrorKind::NotConnected
                    | ErrorKind::UnexpectedEof
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::ConnectionReset
            ),
            TransportError::SerialError(_) => false,
        }
    }
}
