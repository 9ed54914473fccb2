//! High-level oracle operations
//!
//! [`Oracle`] wires the request builders, the invoker, the materializer and
//! the audio cache together. Every method is a full round trip: build,
//! invoke, interpret.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;

use crate::cache::AudioCache;
use crate::config::Config;
use crate::credentials::Credential;
use crate::invoker::ApiInvoker;
use crate::materialize::{Artifact, ArtifactKind, Materializer};
use crate::persona::{Persona, VoiceSettings};
use crate::request::{self, ConversationTurn, Operation};
use crate::tools::ToolRegistry;
use crate::transport::{GenerationResult, OpenAiTransport, Transport};
use crate::voice::Transcriber;
use crate::{Error, Result};

/// Upper bound on model/tool exchanges for one question
pub const MAX_TOOL_ROUNDS: usize = 4;

/// Client for every oracle experience
#[derive(Clone)]
pub struct Oracle {
    invoker: ApiInvoker,
    materializer: Materializer,
    cache: Arc<AudioCache>,
    image_model: String,
    transcription_model: String,
}

impl Oracle {
    /// Oracle over an arbitrary invoker
    #[must_use]
    pub fn new(invoker: ApiInvoker, materializer: Materializer, cache: Arc<AudioCache>) -> Self {
        Self {
            invoker,
            materializer,
            cache,
            image_model: "dall-e-2".to_string(),
            transcription_model: "whisper-1".to_string(),
        }
    }

    /// Oracle talking to the configured API with `credential`
    #[must_use]
    pub fn from_config(config: &Config, credential: &Credential) -> Self {
        let transport: Arc<dyn Transport> =
            Arc::new(OpenAiTransport::new(&config.base_url, credential.secret()));
        Self::with_transport(config, transport)
    }

    /// Oracle configured from `config` over a given transport
    #[must_use]
    pub fn with_transport(config: &Config, transport: Arc<dyn Transport>) -> Self {
        let invoker = ApiInvoker::new(transport)
            .with_policy(config.retry_policy())
            .with_timeout(config.timeout);
        let cache = Arc::new(AudioCache::new(config.cache_key_policy));
        Self::new(invoker, config.materializer(), cache)
            .with_models(&config.image_model, &config.voice.transcription_model)
    }

    /// Override the image and transcription models
    #[must_use]
    pub fn with_models(mut self, image_model: &str, transcription_model: &str) -> Self {
        self.image_model = image_model.to_string();
        self.transcription_model = transcription_model.to_string();
        self
    }

    /// Materializer used for artifacts
    #[must_use]
    pub const fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    /// Shared audio cache
    #[must_use]
    pub fn cache(&self) -> &AudioCache {
        &self.cache
    }

    /// Ask `persona` a question in the context of `history`
    ///
    /// The persona's fixed instructions precede `history`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] before any call for bad input and
    /// [`Error::Generation`] if the call fails
    pub async fn ask(
        &self,
        persona: &Persona,
        input: &str,
        history: &[ConversationTurn],
    ) -> Result<String> {
        let request = build_chat(persona, input, history)?;
        self.invoker.invoke(&Operation::Chat(request)).await.into_text()
    }

    /// Ask with local tools available to the model
    ///
    /// Requested tool calls are executed and their results sent back until
    /// the model answers in text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generation`] if a call fails or the model keeps
    /// requesting tools past [`MAX_TOOL_ROUNDS`]
    pub async fn ask_with_tools(
        &self,
        persona: &Persona,
        input: &str,
        tools: &ToolRegistry,
    ) -> Result<String> {
        let mut request = build_chat(persona, input, &[])?.with_tools(tools.specs());

        for round in 1..=MAX_TOOL_ROUNDS {
            match self.invoker.invoke(&Operation::Chat(request.clone())).await {
                GenerationResult::ToolCalls(calls) => {
                    tracing::debug!(round, calls = calls.len(), "model requested tools");
                    let mut results = Vec::with_capacity(calls.len());
                    for call in &calls {
                        let output = tools.execute(call).await;
                        results.push(ConversationTurn::tool(call.id.clone(), output));
                    }
                    request.messages.push(ConversationTurn::assistant_tool_calls(calls));
                    request.messages.extend(results);
                }
                other => return other.into_text(),
            }
        }

        Err(Error::Generation(format!(
            "no answer after {MAX_TOOL_ROUNDS} tool rounds"
        )))
    }

    /// Synthesize `text` to an audio file, reusing earlier synthesis
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or writing the file fails
    pub async fn speak(&self, text: &str, voice: &VoiceSettings, name_hint: &str) -> Result<PathBuf> {
        self.cache
            .get_or_create(text, |text| async move {
                let request = request::speech(&text, &voice.model, &voice.voice, voice.speed)?;
                let result = self.invoker.invoke(&Operation::Speech(request)).await;
                file_path(self.materializer.materialize(result, ArtifactKind::Audio, name_hint)?)
            })
            .await
    }

    /// Generate an image from `prompt` and save it
    ///
    /// # Errors
    ///
    /// Returns error if generation or writing the file fails
    pub async fn imagine(&self, prompt: &str, size: &str, name_hint: &str) -> Result<PathBuf> {
        let request = request::image(prompt, &self.image_model, size)?;
        let result = self.invoker.invoke(&Operation::Image(request)).await;
        file_path(self.materializer.materialize(result, ArtifactKind::Image, name_hint)?)
    }

    /// Have `persona` describe the image at `image`
    ///
    /// `image` is a local file path or an `http(s)` URL.
    ///
    /// # Errors
    ///
    /// Returns error if the image cannot be read or the call fails
    pub async fn describe(&self, persona: &Persona, instruction: &str, image: &str) -> Result<String> {
        let image_url = if image.starts_with("http://")
            || image.starts_with("https://")
            || image.starts_with("data:")
        {
            image.to_string()
        } else {
            data_url(Path::new(image)).await?
        };

        let request = request::vision(&persona.system_prompt, instruction, &image_url, &persona.options)?;
        self.invoker.invoke(&Operation::Chat(request)).await.into_text()
    }

    /// Transcribe recorded speech
    ///
    /// # Errors
    ///
    /// Returns error if the audio is empty or the call fails
    pub async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<String> {
        let request = request::transcription(audio, file_name, &self.transcription_model)?;
        let text = self
            .invoker
            .invoke(&Operation::Transcription(request))
            .await
            .into_text()?;
        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl Transcriber for Oracle {
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<String> {
        Self::transcribe(self, audio, file_name).await
    }
}

fn build_chat(
    persona: &Persona,
    input: &str,
    history: &[ConversationTurn],
) -> Result<request::ChatRequest> {
    let mut turns = persona.instructions.clone();
    turns.extend_from_slice(history);
    request::build(&persona.system_prompt, input, &turns, &persona.options, persona.task)
}

fn file_path(artifact: Artifact) -> Result<PathBuf> {
    match artifact {
        Artifact::File { path, .. } => Ok(path),
        Artifact::Text(_) => Err(Error::Generation("expected a file artifact".to_string())),
    }
}

/// Inline a local image as a `data:` URL
async fn data_url(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    };
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{mime};base64,{encoded}"))
}
