//! # Air Supply Core
//!
//! Serial command bridge for microcontroller-driven air-supply controllers.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - A line-oriented transport session over a serial port
//! - A command channel that frames `OK`-terminated replies on a background
//!   reader thread and hands them to waiting callers
//! - The controller's command vocabulary (`OPEN`, `CLOSE`, `GET_PRESSURE`,
//!   `SET KEY=VALUE`, ...)
//! - Connection configuration and a `tracing`-backed diagnostic sink
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use airsupply_core::prelude::*;
//!
//! let config = ChannelConfig::for_port("/dev/ttyACM0");
//! let mut channel = CommandChannel::open(&config, Arc::new(TracingSink))?;
//!
//! channel.execute(&AirCommand::Open).await?;
//! channel.set_parameter("ref_pres", "10")?;
//! if let Some(reply) = channel.execute(&AirCommand::GetPressure).await? {
//!     println!("pressure: {:?}", reply.field("P"));
//! }
//! ```

pub mod config;
pub mod diagnostics;
pub mod protocol;
pub mod transport;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ChannelConfig, ConfigError};
    pub use crate::diagnostics::{DiagnosticSink, TracingSink};
    pub use crate::protocol::{
        AirCommand, ChannelState, Command, CommandChannel, Parameter, ProtocolError, Response,
    };
    pub use crate::transport::{TransportError, TransportSession};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
