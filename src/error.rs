//! Error types for tone verification

use std::fmt;
use thiserror::Error;

/// Result type for verification operations
pub type Result<T> = std::result::Result<T, VerifyError>;

/// A single failed check on one test channel.
///
/// Rendered as `Channel <n>: <message>` so that an aggregated failure still
/// names the channel and the check behind every message.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ChannelError {
    pub channel: usize,
    pub message: String,
}

impl ChannelError {
    pub fn new(channel: usize, message: impl Into<String>) -> Self {
        Self {
            channel,
            message: message.into(),
        }
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Channel {}: {}", self.channel, self.message)
    }
}

/// Errors that can occur while verifying a recording
#[derive(Error, Debug)]
pub enum VerifyError {
    /// Raw buffer does not match the declared data format
    #[error("Failed to decode audio: {0}")]
    Decode(String),

    /// Channel map refers to channels or golden frequencies that don't exist
    #[error("Invalid channel map: {0}")]
    InvalidChannelMap(String),

    /// A criteria field or expectation is outside its valid range
    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),

    /// One or more channel checks failed
    #[error("{}", join_errors(.errors))]
    Failed { errors: Vec<ChannelError> },

    /// Criteria or report (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VerifyError {
    /// Every individual message carried by a verification failure.
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Failed { errors } => errors.iter().map(ToString::to_string).collect(),
            other => vec![other.to_string()],
        }
    }
}

fn join_errors(errors: &[ChannelError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
