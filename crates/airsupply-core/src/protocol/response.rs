//! Response framing
//!
//! A reply is any number of text lines closed by a line reading `OK`.

use serde::{Deserialize, Serialize};

use super::TERMINATOR;

/// A complete reply to one issued command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// 1-based sequence number of the command this answers
    pub cycle: u64,
    /// Reply lines in arrival order, blank lines and the terminator excluded
    pub lines: Vec<String>,
}

impl Response {
    /// Look up `KEY=VALUE` style fields in the reply (e.g. `P=101`)
    pub fn field(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| {
            let (k, v) = line.split_once('=')?;
            (k.trim() == key).then(|| v.trim())
        })
    }
}

/// Accumulates lines until the terminator shows up
#[derive(Debug, Default)]
pub struct ResponseAssembler {
    buffer: Vec<String>,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one received line.
    ///
    /// Returns the finished reply body when `line` is the terminator; the
    /// internal buffer is empty again afterwards.
    pub fn push_line(&mut self, line: &str) -> Option<Vec<String>> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if line == TERMINATOR {
            return Some(std::mem::take(&mut self.buffer));
        }
        self.buffer.push(line.to_string());
        None
    }

    /// Drop a half-received reply, returning how many lines were discarded
    pub fn abandon(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        dropped
    }

    /// Lines collected since the last terminator
    pub fn pending_lines(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pressure_reply() {
        let mut assembler = ResponseAssembler::new();
        assert_eq!(assembler.push_line("P=101"), None);
        assert_eq!(assembler.push_line("T=22"), None);
        assert_eq!(
            assembler.push_line("OK"),
            Some(vec!["P=101".to_string(), "T=22".to_string()])
        );
        assert_eq!(assembler.pending_lines(), 0);
    }

    #[test]
    fn test_blank_lines_dropped() {
        let mut assembler = ResponseAssembler::new();
        assembler.push_line("");
        assembler.push_line("   ");
        assembler.push_line("A");
        assert_eq!(assembler.pending_lines(), 1);
        assert_eq!(assembler.push_line("OK"), Some(vec!["A".to_string()]));
    }

    #[test]
    fn test_terminator_matched_after_trim() {
        let mut assembler = ResponseAssembler::new();
        assert_eq!(assembler.push_line(" OK \r"), Some(vec![]));
        // Only an exact match terminates
        assert_eq!(assembler.push_line("OK!"), None);
        assert_eq!(assembler.push_line("ok"), None);
        assert_eq!(assembler.pending_lines(), 2);
    }

    #[test]
    fn test_consecutive_replies_are_independent() {
        let mut assembler = ResponseAssembler::new();
        assembler.push_line("first");
        assert_eq!(assembler.push_line("OK"), Some(vec!["first".to_string()]));
        assembler.push_line("second");
        assert_eq!(assembler.push_line("OK"), Some(vec!["second".to_string()]));
    }

    #[test]
    fn test_abandon() {
        let mut assembler = ResponseAssembler::new();
        assembler.push_line("P=1");
        assembler.push_line("T=");
        assert_eq!(assembler.abandon(), 2);
        assert_eq!(assembler.push_line("OK"), Some(vec![]));
    }

    #[test]
    fn test_response_field() {
        let response = Response {
            cycle: 1,
            lines: vec!["P=101".to_string(), "T = 22".to_string(), "mode simple".to_string()],
        };
        assert_eq!(response.field("P"), Some("101"));
        assert_eq!(response.field("T"), Some("22"));
        assert_eq!(response.field("mode"), None);
    }
}
