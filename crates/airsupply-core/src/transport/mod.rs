//! Serial transport
//!
//! Owns the serial byte stream and exposes it as newline-delimited UTF-8
//! text. Knows nothing about commands or responses.

mod error;
pub mod link;
pub mod serial;
mod session;

pub use error::TransportError;
pub use link::{SerialChannel, SerialLink};
pub use serial::{configure_port, list_ports, open_port, PortInfo};
pub use session::{LineReader, LineWriter, TransportSession};

/// Default baud rate of the controller firmware
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default idle timeout for a single line read in milliseconds
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;

/// Byte that ends every line in both directions
pub const LINE_TERMINATOR: u8 = b'\n';

/// Longest line kept before it is flushed without a terminator
pub const MAX_LINE_LENGTH: usize = 4096;
