//! Diagnostic reporting
//!
//! Every sent command, received line, completed response and error is handed
//! to a [`DiagnosticSink`]. The sink is passed explicitly into the transport
//! session and the command channel; there is no global logger inside the
//! library. [`TracingSink`] forwards everything to `tracing`.

use crate::protocol::Response;

/// Receiver for traffic and error reports
pub trait DiagnosticSink: Send + Sync {
    /// A command line was written to the device
    fn command_sent(&self, command: &str);

    /// A non-blank line arrived from the device
    fn line_received(&self, line: &str);

    /// A terminator closed the response of an issued command
    fn response_complete(&self, response: &Response);

    /// A terminated response arrived while no command was outstanding
    fn unsolicited_response(&self, lines: &[String]);

    /// Received bytes were not valid UTF-8 and were replaced
    fn decode_warning(&self, line: &str);

    /// An operation failed; `context` names the operation
    fn error(&self, context: &str, error: &dyn std::error::Error);
}

/// Sink that emits `tracing` events under the `airsupply` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn command_sent(&self, command: &str) {
        tracing::debug!(target: "airsupply", "Sent: {}", command);
    }

    fn line_received(&self, line: &str) {
        tracing::debug!(target: "airsupply", "Received: {}", line);
    }

    fn response_complete(&self, response: &Response) {
        tracing::debug!(
            target: "airsupply",
            cycle = response.cycle,
            "Full Response:\n{}",
            response.lines.join("\n")
        );
    }

    fn unsolicited_response(&self, lines: &[String]) {
        tracing::warn!(
            target: "airsupply",
            "Unsolicited response ({} lines):\n{}",
            lines.len(),
            lines.join("\n")
        );
    }

    fn decode_warning(&self, line: &str) {
        tracing::warn!(target: "airsupply", "Invalid UTF-8 replaced in line: {}", line);
    }

    fn error(&self, context: &str, error: &dyn std::error::Error) {
        tracing::error!(target: "airsupply", "Error {}: {}", context, error);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Sink that records every report for assertions
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        events: Mutex<Vec<(&'static str, String)>>,
    }

    impl RecordingSink {
        fn record(&self, kind: &'static str, text: String) {
            self.events.lock().unwrap().push((kind, text));
        }

        fn of_kind(&self, kind: &str) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|(k, _)| *k == kind)
                .map(|(_, text)| text.clone())
                .collect()
        }

        pub(crate) fn completed(&self) -> Vec<String> {
            self.of_kind("complete")
        }

        pub(crate) fn unsolicited(&self) -> Vec<String> {
            self.of_kind("unsolicited")
        }

        pub(crate) fn decode_warnings(&self) -> Vec<String> {
            self.of_kind("decode")
        }
    }

    impl DiagnosticSink for RecordingSink {
        fn command_sent(&self, command: &str) {
            self.record("sent", command.to_string());
        }

        fn line_received(&self, line: &str) {
            self.record("received", line.to_string());
        }

        fn response_complete(&self, response: &Response) {
            self.record("complete", response.lines.join("|"));
        }

        fn unsolicited_response(&self, lines: &[String]) {
            self.record("unsolicited", lines.join("|"));
        }

        fn decode_warning(&self, line: &str) {
            self.record("decode", line.to_string());
        }

        fn error(&self, context: &str, error: &dyn std::error::Error) {
            self.record("error", format!("{}: {}", context, error));
        }
    }
}
