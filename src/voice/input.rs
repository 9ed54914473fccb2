//! Where user input comes from
//!
//! Sources are tried in order by [`FallbackInput`]; the first one that
//! yields non-empty text wins.

use std::sync::Arc;

use async_trait::async_trait;

use super::capture::Recorder;
use crate::{Error, Result};

/// A way of obtaining one line of user input
#[async_trait]
pub trait InputSource: Send + Sync {
    /// Read one input, showing `prompt` where that makes sense
    ///
    /// # Errors
    ///
    /// Returns an error if this source cannot produce input right now
    async fn read(&self, prompt: &str) -> Result<String>;

    /// Source name for logging
    fn name(&self) -> &'static str;
}

/// Converts recorded audio to text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe `audio` whose format is implied by `file_name`
    ///
    /// # Errors
    ///
    /// Returns an error if transcription fails
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<String>;
}

/// Spoken input: record a clip, then transcribe it
pub struct MicrophoneInput {
    recorder: Recorder,
    transcriber: Arc<dyn Transcriber>,
}

impl MicrophoneInput {
    /// Microphone input using `recorder` and `transcriber`
    #[must_use]
    pub fn new(recorder: Recorder, transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            recorder,
            transcriber,
        }
    }
}

#[async_trait]
impl InputSource for MicrophoneInput {
    async fn read(&self, prompt: &str) -> Result<String> {
        println!("{prompt} (speak now)");
        let recording = self.recorder.record().await?;
        let text = self
            .transcriber
            .transcribe(recording.bytes, &recording.file_name)
            .await?;
        println!("You said: {text}");
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "microphone"
    }
}

/// Typed input on the terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct TypedInput;

#[async_trait]
impl InputSource for TypedInput {
    async fn read(&self, prompt: &str) -> Result<String> {
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || {
            dialoguer::Input::<String>::new()
                .with_prompt(prompt)
                .allow_empty(true)
                .interact_text()
                .map_err(|e| Error::InvalidInput(format!("could not read input: {e}")))
        })
        .await
        .map_err(|e| Error::InvalidInput(e.to_string()))?
    }

    fn name(&self) -> &'static str {
        "typed"
    }
}

/// Ordered list of sources
///
/// A source that errors or returns blank text is skipped. Fails only when
/// every source does.
pub struct FallbackInput {
    sources: Vec<Box<dyn InputSource>>,
}

impl FallbackInput {
    /// Try `sources` in order
    #[must_use]
    pub fn new(sources: Vec<Box<dyn InputSource>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl InputSource for FallbackInput {
    async fn read(&self, prompt: &str) -> Result<String> {
        let mut last_error = None;

        for source in &self.sources {
            match source.read(prompt).await {
                Ok(text) if !text.trim().is_empty() => return Ok(text.trim().to_string()),
                Ok(_) => {
                    tracing::debug!(source = source.name(), "input source returned nothing");
                }
                Err(e) => {
                    tracing::warn!(source = source.name(), error = %e, "input source failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::InvalidInput("no input received".to_string())))
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}
