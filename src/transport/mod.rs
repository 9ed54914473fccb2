//! Outbound transport to the generation API
//!
//! A [`Transport`] performs exactly one network attempt for an
//! [`Operation`]. Retries, timeouts and error normalization live in the
//! invoker, so tests can swap in a scripted transport.

mod openai;

pub use openai::{DEFAULT_BASE_URL, OpenAiTransport};

use std::time::Duration;

use async_trait::async_trait;

use crate::request::{Operation, ToolCall};
use crate::{Error, Result};

/// Outcome of a generation call
///
/// Exactly one variant is populated. Transports only produce the success
/// variants; [`GenerationResult::Failure`] is created by the invoker when
/// the retry policy gives up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResult {
    /// Text content (chat, vision, transcription)
    Text(String),
    /// Binary content (image, speech) with a suggested file extension
    Binary { bytes: Vec<u8>, extension: String },
    /// The model asked for local functions to be executed
    ToolCalls(Vec<ToolCall>),
    /// The call failed; the message is suitable for display
    Failure(String),
}

impl GenerationResult {
    /// Whether this is the failure variant
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Extract text content
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generation`] for failures and non-text variants
    pub fn into_text(self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Failure(message) => Err(Error::Generation(message)),
            Self::Binary { .. } => Err(Error::Generation(
                "expected text, got binary content".to_string(),
            )),
            Self::ToolCalls(_) => Err(Error::Generation(
                "expected text, got tool calls".to_string(),
            )),
        }
    }
}

/// Failure of a single transport attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection, DNS or timeout failure
    Network(String),
    /// Non-success HTTP status
    Status {
        status: u16,
        body: String,
        /// Server-provided backoff hint
        retry_after: Option<Duration>,
    },
    /// The response could not be understood
    Decode(String),
}

impl TransportError {
    /// Server-provided backoff hint, if any
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Status { retry_after, .. } => *retry_after,
            Self::Network(_) | Self::Decode(_) => None,
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Status { status, body, .. } => write!(f, "API error {status}: {body}"),
            Self::Decode(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Status {
                status: status.as_u16(),
                body: e.to_string(),
                retry_after: None,
            }
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Network(msg) => Self::Transport(msg),
            TransportError::Status { status, body, .. } if crate::retry::is_recoverable(status) => {
                Self::Transport(format!("{status}: {body}"))
            }
            TransportError::Status { status, body, .. } => Self::Api {
                status,
                message: body,
            },
            TransportError::Decode(msg) => Self::Api {
                status: 0,
                message: msg,
            },
        }
    }
}

/// One network attempt against the generation API
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the operation once
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] describing why the attempt failed
    async fn send(&self, operation: &Operation) -> std::result::Result<GenerationResult, TransportError>;

    /// Transport name for logging
    fn name(&self) -> &'static str;
}
