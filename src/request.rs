//! Request construction for the generation API
//!
//! Everything in this module is pure: no I/O, no clock, no environment.
//! Builders validate their input and return [`Error::InvalidInput`] before
//! anything reaches the network.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    /// Wire name of the role
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// Image reference inside a multimodal turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// `https://` URL or `data:<mime>;base64,` inline payload
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// One fragment of a multimodal turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

/// Content of a turn: plain text or text plus images
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A function call requested by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier echoed back in the tool turn
    pub id: String,
    /// Name of the local function
    pub name: String,
    /// JSON-encoded arguments, as produced by the model
    pub arguments: String,
}

/// Declaration of a local function the model may call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: serde_json::Value,
}

/// One role-tagged message of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ConversationTurn {
    fn text_turn(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(MessageContent::Text(text.into())),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// System (persona) turn
    pub fn system(text: impl Into<String>) -> Self {
        Self::text_turn(Role::System, text)
    }

    /// User turn
    pub fn user(text: impl Into<String>) -> Self {
        Self::text_turn(Role::User, text)
    }

    /// Assistant turn
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text_turn(Role::Assistant, text)
    }

    /// Assistant turn that only requests tool calls
    #[must_use]
    pub const fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls: calls,
            tool_call_id: None,
        }
    }

    /// Tool result answering the call with `call_id`
    pub fn tool(call_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(MessageContent::Text(text.into())),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }

    /// User turn carrying an instruction and an image
    pub fn user_with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_url.into(),
                        detail: None,
                    },
                },
            ])),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// First text fragment of the turn, if any
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self.content.as_ref()? {
            MessageContent::Text(text) => Some(text),
            MessageContent::Parts(parts) => parts.iter().find_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::ImageUrl { .. } => None,
            }),
        }
    }
}

/// Generation parameters shared by chat requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationOptions {
    pub model: String,
    /// Sampling temperature in `[0, 2]`
    pub temperature: f32,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            temperature: 0.9,
            max_tokens: 300,
        }
    }
}

impl GenerationOptions {
    /// Check model name, temperature range and token bound
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when a parameter is out of range
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(Error::InvalidInput("model name is empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::InvalidInput(format!(
                "temperature {} outside [0, 2]",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(Error::InvalidInput("max_tokens must be positive".to_string()));
        }
        Ok(())
    }
}

/// Whether the user input is required for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    /// Dialogue: the user must say something
    #[default]
    Conversation,
    /// Pure generation from the persona and history; input may be empty
    Generation,
}

/// Chat completion request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    /// Never empty; order is the dialogue order
    pub messages: Vec<ConversationTurn>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub tools: Vec<ToolSpec>,
}

impl ChatRequest {
    /// Offer local functions to the model
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }
}

/// Image synthesis request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    /// Size such as `1024x1024`
    pub size: String,
}

/// Speech synthesis request
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub model: String,
    pub voice: String,
    pub input: String,
    pub speed: f32,
}

/// Speech transcription request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionRequest {
    pub model: String,
    pub audio: Vec<u8>,
    /// File name reported to the API; its extension selects the decoder
    pub file_name: String,
}

/// Everything the invoker knows how to send
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Chat(ChatRequest),
    Image(ImageRequest),
    Speech(SpeechRequest),
    Transcription(TranscriptionRequest),
}

impl Operation {
    /// Short label for logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Chat(_) => "chat",
            Self::Image(_) => "image",
            Self::Speech(_) => "speech",
            Self::Transcription(_) => "transcription",
        }
    }
}

/// Assemble a chat request: persona, then history, then the user turn
///
/// An empty `persona_prompt` contributes no system turn. With
/// [`Task::Generation`] an empty `user_input` contributes no user turn.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for empty input in a conversation, for
/// out-of-range options, or when the resulting message list would be empty
pub fn build(
    persona_prompt: &str,
    user_input: &str,
    history: &[ConversationTurn],
    options: &GenerationOptions,
    task: Task,
) -> Result<ChatRequest> {
    options.validate()?;

    let input_empty = user_input.trim().is_empty();
    if input_empty && task == Task::Conversation {
        return Err(Error::InvalidInput("user input is empty".to_string()));
    }

    let mut messages = Vec::with_capacity(history.len() + 2);
    if !persona_prompt.trim().is_empty() {
        messages.push(ConversationTurn::system(persona_prompt));
    }
    messages.extend(history.iter().cloned());
    if !input_empty {
        messages.push(ConversationTurn::user(user_input));
    }

    if messages.is_empty() {
        return Err(Error::InvalidInput(
            "request has no persona, history or input".to_string(),
        ));
    }

    Ok(ChatRequest {
        model: options.model.clone(),
        messages,
        temperature: options.temperature,
        max_tokens: options.max_tokens,
        tools: Vec::new(),
    })
}

/// Assemble a vision request asking the model to describe an image
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the instruction or image URL is empty
pub fn vision(
    persona_prompt: &str,
    instruction: &str,
    image_url: &str,
    options: &GenerationOptions,
) -> Result<ChatRequest> {
    options.validate()?;
    if instruction.trim().is_empty() {
        return Err(Error::InvalidInput("vision instruction is empty".to_string()));
    }
    if image_url.trim().is_empty() {
        return Err(Error::InvalidInput("image reference is empty".to_string()));
    }

    let mut messages = Vec::with_capacity(2);
    if !persona_prompt.trim().is_empty() {
        messages.push(ConversationTurn::system(persona_prompt));
    }
    messages.push(ConversationTurn::user_with_image(instruction, image_url));

    Ok(ChatRequest {
        model: options.model.clone(),
        messages,
        temperature: options.temperature,
        max_tokens: options.max_tokens,
        tools: Vec::new(),
    })
}

/// Assemble an image synthesis request
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the prompt is empty
pub fn image(prompt: &str, model: &str, size: &str) -> Result<ImageRequest> {
    if prompt.trim().is_empty() {
        return Err(Error::InvalidInput("image prompt is empty".to_string()));
    }
    Ok(ImageRequest {
        model: model.to_string(),
        prompt: prompt.to_string(),
        size: size.to_string(),
    })
}

/// Assemble a speech synthesis request
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the text is empty or the speed is
/// outside `[0.25, 4.0]`
pub fn speech(text: &str, model: &str, voice: &str, speed: f32) -> Result<SpeechRequest> {
    if text.trim().is_empty() {
        return Err(Error::InvalidInput("speech text is empty".to_string()));
    }
    if !(0.25..=4.0).contains(&speed) {
        return Err(Error::InvalidInput(format!("speech speed {speed} outside [0.25, 4]")));
    }
    Ok(SpeechRequest {
        model: model.to_string(),
        voice: voice.to_string(),
        input: text.to_string(),
        speed,
    })
}

/// Assemble a transcription request
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if there is no audio
pub fn transcription(audio: Vec<u8>, file_name: &str, model: &str) -> Result<TranscriptionRequest> {
    if audio.is_empty() {
        return Err(Error::InvalidInput("audio is empty".to_string()));
    }
    Ok(TranscriptionRequest {
        model: model.to_string(),
        audio,
        file_name: file_name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(request: &ChatRequest) -> Vec<Role> {
        request.messages.iter().map(|m| m.role).collect()
    }

    #[test]
    fn test_build_orders_persona_history_user() {
        let history = vec![
            ConversationTurn::user("first question"),
            ConversationTurn::assistant("first answer"),
        ];
        let request = build(
            "You are an oracle.",
            "second question",
            &history,
            &GenerationOptions::default(),
            Task::Conversation,
        )
        .unwrap();

        assert_eq!(
            roles(&request),
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(request.messages[0].text(), Some("You are an oracle."));
        assert_eq!(request.messages[1].text(), Some("first question"));
        assert_eq!(request.messages[2].text(), Some("first answer"));
        assert_eq!(request.messages[3].text(), Some("second question"));
    }

    #[test]
    fn test_build_rejects_empty_conversation_input() {
        let err = build(
            "persona",
            "   ",
            &[],
            &GenerationOptions::default(),
            Task::Conversation,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_build_generation_allows_empty_input() {
        let history = vec![ConversationTurn::assistant("Cite a proverb.")];
        let request = build(
            "You are Pythia.",
            "",
            &history,
            &GenerationOptions::default(),
            Task::Generation,
        )
        .unwrap();
        assert_eq!(roles(&request), vec![Role::System, Role::Assistant]);
    }

    #[test]
    fn test_build_never_produces_empty_request() {
        let err = build("", "", &[], &GenerationOptions::default(), Task::Generation).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_options_validation() {
        let mut options = GenerationOptions {
            temperature: 2.5,
            ..GenerationOptions::default()
        };
        assert!(options.validate().is_err());

        options.temperature = 2.0;
        assert!(options.validate().is_ok());

        options.max_tokens = 0;
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_vision_request_has_image_part() {
        let request = vision(
            "You are a kid playing telephone.",
            "Describe this image.",
            "data:image/png;base64,AAAA",
            &GenerationOptions::default(),
        )
        .unwrap();

        let last = request.messages.last().unwrap();
        match last.content.as_ref().unwrap() {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(parts[1], ContentPart::ImageUrl { .. }));
            }
            MessageContent::Text(_) => panic!("expected multimodal content"),
        }
    }

    #[test]
    fn test_content_part_wire_shape() {
        let part = ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: "https://example.com/a.png".to_string(),
                detail: None,
            },
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "image_url");
        assert_eq!(json["image_url"]["url"], "https://example.com/a.png");
    }

    #[test]
    fn test_speech_rejects_bad_speed() {
        assert!(speech("hello", "tts-1", "onyx", 5.0).is_err());
        assert!(speech("", "tts-1", "onyx", 1.0).is_err());
        assert!(speech("hello", "tts-1", "onyx", 1.1).is_ok());
    }

    #[test]
    fn test_transcription_rejects_empty_audio() {
        assert!(transcription(Vec::new(), "audio.wav", "whisper-1").is_err());
    }
}
