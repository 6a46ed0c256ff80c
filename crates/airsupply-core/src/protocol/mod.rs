//! Air-supply command protocol
//!
//! Plain text over the serial line: one command per line out, any number of
//! reply lines back, closed by a line reading `OK`.

mod channel;
pub mod commands;
mod error;
mod response;

pub use channel::{ChannelState, CommandChannel};
pub use commands::{AirCommand, Command, Parameter};
pub use error::ProtocolError;
pub use response::{Response, ResponseAssembler};

/// Line that ends every reply
pub const TERMINATOR: &str = "OK";

/// Default bound on waiting for a reply in milliseconds
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 5000;
