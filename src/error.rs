//! Error types for the oracle gateway

use thiserror::Error;

/// Result type alias for oracle operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the oracle gateway
#[derive(Debug, Error)]
pub enum Error {
    /// No API key could be resolved from any source
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// Local validation failed before any network call
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Network-level failure (connect, timeout, 5xx, rate limit)
    #[error("transport error: {0}")]
    Transport(String),

    /// The API rejected the request and retrying will not help
    #[error("api error {status}: {message}")]
    Api {
        /// HTTP status returned by the API
        status: u16,
        /// Response body or parse failure detail
        message: String,
    },

    /// A generation call ended in failure after the retry policy gave up
    #[error("generation failed: {0}")]
    Generation(String),

    /// A chain step failed and the chain was stopped
    #[error("chain aborted after {completed} step(s): {message}")]
    ChainAborted {
        /// Number of history entries recorded, including the failed one
        completed: usize,
        /// Failure reported by the step
        message: String,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Persona not found
    #[error("persona not found: {0}")]
    PersonaNotFound(String),

    /// Audio recording or playback error
    #[error("audio error: {0}")]
    Audio(String),

    /// Tool execution error
    #[error("tool error: {0}")]
    Tool(String),

    /// Local disk failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
