//! Protocol commands
//!
//! The controller understands a handful of uppercase keywords, one per line,
//! plus `SET <KEY>=<VALUE>` for tuning parameters.

use std::fmt;
use std::str::FromStr;

use super::ProtocolError;

/// A single command line, sent verbatim to the controller
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command(String);

impl Command {
    /// Create a command, rejecting text that would span several lines
    pub fn new(text: impl Into<String>) -> Result<Self, ProtocolError> {
        let text = text.into();
        if text.contains(['\n', '\r']) {
            return Err(ProtocolError::InvalidCommand(format!(
                "embedded line break in {:?}",
                text
            )));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<&str> for Command {
    type Error = ProtocolError;

    fn try_from(text: &str) -> Result<Self, Self::Error> {
        Command::new(text)
    }
}

impl TryFrom<String> for Command {
    type Error = ProtocolError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Command::new(text)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated `KEY=VALUE` pair for the `SET` command.
///
/// The key is stored upper-cased. Neither side may contain `=` or a line
/// break, so the rendered body always has exactly one separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    key: String,
    value: String,
}

impl Parameter {
    /// Build a parameter from a key and a literal value
    pub fn new(key: &str, value: &str) -> Result<Self, ProtocolError> {
        if key.is_empty() {
            return Err(ProtocolError::MalformedParameter("empty key".to_string()));
        }
        if key.contains('=') || key.chars().any(char::is_whitespace) {
            return Err(ProtocolError::MalformedParameter(format!(
                "invalid key {:?}",
                key
            )));
        }
        if value.contains(['=', '\n', '\r']) {
            return Err(ProtocolError::MalformedParameter(format!(
                "invalid value {:?} for {}",
                value, key
            )));
        }

        Ok(Self {
            key: key.to_uppercase(),
            value: value.to_string(),
        })
    }

    /// Parse the literal `key=value` form
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        // A second '=' ends up in the value, which `new` rejects
        let (key, value) = text.split_once('=').ok_or_else(|| {
            ProtocolError::MalformedParameter(format!("expected KEY=VALUE, got {:?}", text))
        })?;
        Self::new(key.trim(), value.trim())
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// The `SET KEY=VALUE` command line
    pub fn to_command(&self) -> Command {
        // Both halves were checked for line breaks in `new`
        Command(format!("SET {}={}", self.key, self.value))
    }
}

impl FromStr for Parameter {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Parameter::parse(s)
    }
}

/// Operations exposed by the air-supply controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AirCommand {
    /// List the controller's commands ("HELP")
    Help,

    /// Open the valve ("OPEN")
    Open,

    /// Close the valve ("CLOSE")
    Close,

    /// Report supply pressure ("GET_PRESSURE")
    GetPressure,

    /// Switch to pulsed output ("PULSE_MODE")
    PulseMode,

    /// Switch to continuous output ("SIMPLE_MODE")
    SimpleMode,

    /// Change a tuning parameter ("SET KEY=VALUE")
    Set(Parameter),
}

impl AirCommand {
    /// Operation names with a short description, in menu order
    pub const CATALOG: &'static [(&'static str, &'static str)] = &[
        ("HELP", "Show available commands"),
        ("OPEN", "Open valve"),
        ("CLOSE", "Close valve"),
        ("GET_PRESSURE", "Read supply pressure"),
        ("PULSE_MODE", "Set to pulse mode"),
        ("SIMPLE_MODE", "Set to simple mode"),
        ("SET", "Set parameter (SET key=value)"),
    ];

    /// Protocol keyword of this operation
    pub fn keyword(&self) -> &'static str {
        match self {
            AirCommand::Help => "HELP",
            AirCommand::Open => "OPEN",
            AirCommand::Close => "CLOSE",
            AirCommand::GetPressure => "GET_PRESSURE",
            AirCommand::PulseMode => "PULSE_MODE",
            AirCommand::SimpleMode => "SIMPLE_MODE",
            AirCommand::Set(_) => "SET",
        }
    }

    /// Check if the caller needs the body of the reply
    pub fn expects_response(&self) -> bool {
        matches!(self, AirCommand::Help | AirCommand::GetPressure)
    }

    /// The command line sent on the wire
    pub fn to_command(&self) -> Command {
        match self {
            AirCommand::Set(param) => param.to_command(),
            other => Command(other.keyword().to_string()),
        }
    }
}

impl FromStr for AirCommand {
    type Err = ProtocolError;

    /// Parse an operation name, case-insensitively (`open`, `set ref_pres=10`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, rest) = match s.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (s, ""),
        };

        let name = name.to_ascii_uppercase();
        let command = match name.as_str() {
            "SET" => return Parameter::parse(rest).map(AirCommand::Set),
            "HELP" | "HELP_AIR" => AirCommand::Help,
            "OPEN" => AirCommand::Open,
            "CLOSE" => AirCommand::Close,
            "GET_PRESSURE" => AirCommand::GetPressure,
            "PULSE_MODE" => AirCommand::PulseMode,
            "SIMPLE_MODE" => AirCommand::SimpleMode,
            _ => return Err(ProtocolError::UnknownOperation(s.to_string())),
        };

        if !rest.is_empty() {
            return Err(ProtocolError::InvalidCommand(format!(
                "{} takes no arguments",
                name
            )));
        }
        Ok(command)
    }
}
