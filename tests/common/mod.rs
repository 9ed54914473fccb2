//! Shared test utilities

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use oracle_gateway::config::{RetryConfig, VoiceConfig};
use oracle_gateway::materialize::OutputDirs;
use oracle_gateway::{Config, GenerationResult, Operation, Oracle, Transport, TransportError};

type Reply = Box<dyn Fn(usize, &Operation) -> Result<GenerationResult, TransportError> + Send + Sync>;

/// Transport answering from a closure and recording every operation
pub struct FakeTransport {
    reply: Reply,
    sent: Mutex<Vec<Operation>>,
}

impl FakeTransport {
    /// Fake whose reply depends on the call index (0-based) and operation
    pub fn new(
        reply: impl Fn(usize, &Operation) -> Result<GenerationResult, TransportError>
        + Send
        + Sync
        + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            reply: Box::new(reply),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Fake answering every chat with `text` and every other call with a small file
    pub fn answering(text: &'static str) -> Arc<Self> {
        Self::new(move |_, operation| Ok(canned(operation, text)))
    }

    /// Operations sent so far
    pub fn sent(&self) -> Vec<Operation> {
        self.sent.lock().expect("lock poisoned").clone()
    }

    /// Operations of one kind sent so far
    pub fn sent_of(&self, kind: &str) -> Vec<Operation> {
        self.sent().into_iter().filter(|op| op.kind() == kind).collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, operation: &Operation) -> Result<GenerationResult, TransportError> {
        let index = {
            let mut sent = self.sent.lock().expect("lock poisoned");
            sent.push(operation.clone());
            sent.len() - 1
        };
        (self.reply)(index, operation)
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Default reply for an operation: `text` for chat and transcription,
/// placeholder bytes for files
pub fn canned(operation: &Operation, text: &str) -> GenerationResult {
    match operation {
        Operation::Chat(_) | Operation::Transcription(_) => GenerationResult::Text(text.to_string()),
        Operation::Image(_) => GenerationResult::Binary {
            bytes: b"\x89PNG fake".to_vec(),
            extension: "png".to_string(),
        },
        Operation::Speech(_) => GenerationResult::Binary {
            bytes: b"ID3 fake".to_vec(),
            extension: "mp3".to_string(),
        },
    }
}

/// Config writing under `root`, retrying without delay and without playback
pub fn test_config(root: &std::path::Path) -> Config {
    Config {
        output: OutputDirs::under(root),
        retry: RetryConfig {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..RetryConfig::default()
        },
        voice: VoiceConfig {
            player: None,
            ..VoiceConfig::default()
        },
        ..Config::default()
    }
}

/// Oracle over `transport` writing into `root`
pub fn test_oracle(root: &std::path::Path, transport: Arc<FakeTransport>) -> Oracle {
    Oracle::with_transport(&test_config(root), transport)
}
