//! Driver targets and run modes.
//!
//! A target is the id of a driver registered with the server. The run mode
//! tells the server how to treat the driver process:
//! - `oneshot` - the process exits after a command and is restarted on the next one
//! - `keepalive` - the process stays up; its exit ends the session

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The id of the driver a session attaches to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetId(String);

impl TargetId {
    /// Create a target id, rejecting empty ids and control characters.
    pub fn new(id: impl Into<String>) -> Result<Self, TargetParseError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TargetParseError::Empty);
        }
        if id.chars().any(char::is_control) {
            return Err(TargetParseError::ControlCharacter(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TargetId {
    type Err = TargetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TargetId {
    type Error = TargetParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<TargetId> for String {
    fn from(id: TargetId) -> Self {
        id.0
    }
}

/// Error parsing a target id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetParseError {
    #[error("target id cannot be empty")]
    Empty,
    #[error("target id contains control characters: {0:?}")]
    ControlCharacter(String),
}

/// How the server runs the driver process for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Oneshot,
    Keepalive,
}

impl RunMode {
    /// The wire spelling (`oneshot` or `keepalive`).
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Oneshot => "oneshot",
            RunMode::Keepalive => "keepalive",
        }
    }

    /// Whether a process exit ends the session.
    pub fn is_keepalive(&self) -> bool {
        matches!(self, RunMode::Keepalive)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = RunModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "oneshot" => Ok(RunMode::Oneshot),
            "keepalive" => Ok(RunMode::Keepalive),
            other => Err(RunModeParseError(other.to_string())),
        }
    }
}

/// Error parsing a run mode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("run mode must be 'oneshot' or 'keepalive', got: {0}")]
pub struct RunModeParseError(pub String);
