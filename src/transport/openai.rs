//! `OpenAI`-compatible HTTP transport

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::RETRY_AFTER;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{GenerationResult, Transport, TransportError};
use crate::request::{
    ChatRequest, ConversationTurn, ImageRequest, MessageContent, Operation, SpeechRequest,
    ToolCall, ToolSpec, TranscriptionRequest,
};
use crate::retry::parse_retry_after;

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

type SendResult = std::result::Result<GenerationResult, TransportError>;

/// Transport speaking the `OpenAI` REST API
pub struct OpenAiTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl OpenAiTransport {
    /// Create a transport against `base_url` authenticated with `api_key`
    #[must_use]
    pub fn new(base_url: &str, api_key: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.endpoint(path))
            .bearer_auth(self.api_key.expose_secret())
    }

    async fn chat(&self, request: &ChatRequest) -> SendResult {
        let tools: Vec<WireTool<'_>> = request.tools.iter().map(WireTool::from).collect();
        let body = WireChatRequest {
            model: &request.model,
            messages: request.messages.iter().map(WireMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            tool_choice: if tools.is_empty() { None } else { Some("auto") },
            tools,
        };

        let response = checked(self.post("chat/completions").json(&body).send().await?).await?;
        let parsed: WireChatResponse = response.json().await?;

        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| TransportError::Decode("response has no choices".to_string()))?;

        if !message.tool_calls.is_empty() {
            let calls = message
                .tool_calls
                .into_iter()
                .map(|c| ToolCall {
                    id: c.id,
                    name: c.function.name,
                    arguments: c.function.arguments,
                })
                .collect();
            return Ok(GenerationResult::ToolCalls(calls));
        }

        message
            .content
            .map(GenerationResult::Text)
            .ok_or_else(|| TransportError::Decode("response has no content".to_string()))
    }

    async fn image(&self, request: &ImageRequest) -> SendResult {
        #[derive(Serialize)]
        struct Body<'a> {
            model: &'a str,
            prompt: &'a str,
            n: u8,
            size: &'a str,
        }

        let body = Body {
            model: &request.model,
            prompt: &request.prompt,
            n: 1,
            size: &request.size,
        };

        let response = checked(self.post("images/generations").json(&body).send().await?).await?;
        let parsed: WireImageResponse = response.json().await?;
        let image = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::Decode("response has no image".to_string()))?;

        let bytes = if let Some(b64) = image.b64_json {
            base64::engine::general_purpose::STANDARD
                .decode(b64)
                .map_err(|e| TransportError::Decode(e.to_string()))?
        } else if let Some(url) = image.url {
            tracing::debug!("downloading generated image");
            let download = checked(self.client.get(url).send().await?).await?;
            download.bytes().await?.to_vec()
        } else {
            return Err(TransportError::Decode(
                "image has neither url nor b64_json".to_string(),
            ));
        };

        Ok(GenerationResult::Binary {
            bytes,
            extension: "png".to_string(),
        })
    }

    async fn speech(&self, request: &SpeechRequest) -> SendResult {
        #[derive(Serialize)]
        struct Body<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let body = Body {
            model: &request.model,
            input: &request.input,
            voice: &request.voice,
            speed: request.speed,
        };

        let response = checked(self.post("audio/speech").json(&body).send().await?).await?;
        let audio = response.bytes().await?;

        Ok(GenerationResult::Binary {
            bytes: audio.to_vec(),
            extension: "mp3".to_string(),
        })
    }

    async fn transcription(&self, request: &TranscriptionRequest) -> SendResult {
        #[derive(Deserialize)]
        struct WhisperResponse {
            text: String,
        }

        tracing::debug!(audio_bytes = request.audio.len(), "starting transcription");

        let part = reqwest::multipart::Part::bytes(request.audio.clone())
            .file_name(request.file_name.clone())
            .mime_str(mime_for(&request.file_name))
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", request.model.clone());

        let response =
            checked(self.post("audio/transcriptions").multipart(form).send().await?).await?;
        let parsed: WhisperResponse = response.json().await?;

        Ok(GenerationResult::Text(parsed.text))
    }
}

#[async_trait]
impl Transport for OpenAiTransport {
    async fn send(&self, operation: &Operation) -> SendResult {
        match operation {
            Operation::Chat(request) => self.chat(request).await,
            Operation::Image(request) => self.image(request).await,
            Operation::Speech(request) => self.speech(request).await,
            Operation::Transcription(request) => self.transcription(request).await,
        }
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Turn a non-success response into [`TransportError::Status`]
async fn checked(response: reqwest::Response) -> std::result::Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let body = response.text().await.unwrap_or_default();

    Err(TransportError::Status {
        status: status.as_u16(),
        body,
        retry_after,
    })
}

fn mime_for(file_name: &str) -> &'static str {
    let extension = std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("ogg") => "audio/ogg",
        Some("webm") => "audio/webm",
        Some("m4a") => "audio/mp4",
        _ => "application/octet-stream",
    }
}

#[derive(Serialize)]
struct WireChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a MessageContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

impl<'a> From<&'a ConversationTurn> for WireMessage<'a> {
    fn from(turn: &'a ConversationTurn) -> Self {
        Self {
            role: turn.role.as_str(),
            content: turn.content.as_ref(),
            tool_calls: turn
                .tool_calls
                .iter()
                .map(|c| WireToolCall {
                    id: c.id.clone(),
                    kind: "function".to_string(),
                    function: WireFunctionCall {
                        name: c.name.clone(),
                        arguments: c.arguments.clone(),
                    },
                })
                .collect(),
            tool_call_id: turn.tool_call_id.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

#[derive(Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

impl<'a> From<&'a ToolSpec> for WireTool<'a> {
    fn from(spec: &'a ToolSpec) -> Self {
        Self {
            kind: "function",
            function: WireFunction {
                name: &spec.name,
                description: &spec.description,
                parameters: &spec.parameters,
            },
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct WireChatResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireImageResponse {
    data: Vec<WireImage>,
}

#[derive(Deserialize)]
struct WireImage {
    url: Option<String>,
    b64_json: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{self, GenerationOptions, Task};

    #[test]
    fn test_chat_wire_shape_with_tools() {
        let request = request::build(
            "You are a helpful weather assistant.",
            "What's the weather in Paris?",
            &[],
            &GenerationOptions::default(),
            Task::Conversation,
        )
        .unwrap()
        .with_tools(vec![ToolSpec {
            name: "getWeather".to_string(),
            description: "Get the weather".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        }]);

        let tools: Vec<WireTool<'_>> = request.tools.iter().map(WireTool::from).collect();
        let body = WireChatRequest {
            model: &request.model,
            messages: request.messages.iter().map(WireMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            tool_choice: Some("auto"),
            tools,
        };
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "What's the weather in Paris?");
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["function"]["name"], "getWeather");
        assert_eq!(json["tool_choice"], "auto");
    }

    #[test]
    fn test_tool_turns_on_the_wire() {
        let call = ToolCall {
            id: "call_1".to_string(),
            name: "getWeather".to_string(),
            arguments: r#"{"location":"Paris"}"#.to_string(),
        };
        let assistant = ConversationTurn::assistant_tool_calls(vec![call]);
        let tool = ConversationTurn::tool("call_1", "sunny");

        let json = serde_json::to_value(WireMessage::from(&assistant)).unwrap();
        assert!(json.get("content").is_none());
        assert_eq!(json["tool_calls"][0]["type"], "function");
        assert_eq!(json["tool_calls"][0]["function"]["arguments"], r#"{"location":"Paris"}"#);

        let json = serde_json::to_value(WireMessage::from(&tool)).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_1");
    }

    #[test]
    fn test_parse_tool_call_response() {
        let raw = r#"{"choices":[{"message":{"content":null,"tool_calls":[
            {"id":"call_9","type":"function","function":{"name":"getWeather","arguments":"{}"}}
        ]}}]}"#;
        let parsed: WireChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.tool_calls[0].function.name, "getWeather");
        assert!(parsed.choices[0].message.content.is_none());
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for("recording.WAV"), "audio/wav");
        assert_eq!(mime_for("speech.mp3"), "audio/mpeg");
        assert_eq!(mime_for("blob"), "application/octet-stream");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let transport = OpenAiTransport::new("http://localhost:8080/v1/", SecretString::from("k"));
        assert_eq!(transport.endpoint("audio/speech"), "http://localhost:8080/v1/audio/speech");
    }
}
