//! Oracle Gateway - orchestration for novelty AI oracles
//!
//! This library drives a family of small "oracle" experiences against an
//! OpenAI-compatible generation API:
//! - Credential resolution and request assembly
//! - Invocation with per-attempt timeout and bounded retry
//! - Materializing results as text, audio and image files
//! - A synthesis cache and a bounded generate/interpret chain
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Experiences                       │
//! │  Chat │ Telephone │ Past life │ Weather │ HTTP API   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                      Oracle                          │
//! │  Request builder │ Invoker │ Materializer │ Cache    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              Transport (chat, image, speech, STT)    │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod cache;
pub mod chain;
pub mod config;
pub mod credentials;
pub mod error;
pub mod experiences;
pub mod invoker;
pub mod materialize;
pub mod oracle;
pub mod persona;
pub mod request;
pub mod retry;
pub mod tools;
pub mod transport;
pub mod voice;

pub use cache::{AudioCache, CacheKeyPolicy};
pub use chain::{
    ChainDriver, ChainEntry, ChainOutcome, ChainStop, StepFailure, StepOutput, is_exit_sentinel,
};
pub use config::Config;
pub use credentials::{Credential, CredentialResolver, CredentialSource};
pub use error::{Error, Result};
pub use invoker::ApiInvoker;
pub use materialize::{Artifact, ArtifactKind, Materializer, OutputDirs, TimestampResolution};
pub use oracle::Oracle;
pub use persona::{Persona, VoiceSettings};
pub use request::{ConversationTurn, GenerationOptions, Operation, Role, Task};
pub use retry::RetryPolicy;
pub use tools::{Tool, ToolRegistry};
pub use transport::{GenerationResult, Transport, TransportError};
