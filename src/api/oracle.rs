//! Oracle endpoints: ask the served persona, speak text aloud

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::Error;
use crate::request::Task;

/// Build oracle router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/oracle", post(ask))
        .route("/speak", post(speak))
        .with_state(state)
}

/// Body accepted by both endpoints
#[derive(Debug, Default, Deserialize)]
pub struct TextRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TextResponse {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SpeakResponse {
    pub path: String,
}

/// Ask the served persona
///
/// Generation personas accept an empty body.
async fn ask(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<TextResponse>, OracleError> {
    let text = parse_text(&body)?;
    if text.is_none() && state.persona.task == Task::Conversation {
        return Err(OracleError::BadRequest("No text provided".to_string()));
    }

    let answer = state
        .oracle
        .ask(&state.persona, text.as_deref().unwrap_or_default(), &[])
        .await?;

    Ok(Json(TextResponse { text: answer }))
}

/// Synthesize speech for the given text
async fn speak(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<SpeakResponse>, OracleError> {
    let text = parse_text(&body)?
        .ok_or_else(|| OracleError::BadRequest("No text provided".to_string()))?;

    let path = state
        .oracle
        .speak(&text, &state.voice, "oracle_response")
        .await?;

    Ok(Json(SpeakResponse {
        path: path.to_string_lossy().into_owned(),
    }))
}

/// Extract non-blank `text` from an optional JSON body
fn parse_text(body: &[u8]) -> Result<Option<String>, OracleError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let request: TextRequest = serde_json::from_slice(body)
        .map_err(|e| OracleError::BadRequest(format!("invalid JSON body: {e}")))?;

    Ok(request
        .text
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty()))
}

/// Oracle API errors
#[derive(Debug)]
pub enum OracleError {
    BadRequest(String),
    Upstream(String),
    Internal(String),
}

impl From<Error> for OracleError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidInput(msg) => Self::BadRequest(msg),
            Error::Generation(_) | Error::Transport(_) | Error::Api { .. } => {
                tracing::warn!(error = %err, "upstream call failed");
                Self::Upstream(err.to_string())
            }
            other => {
                tracing::error!(error = %other, "request failed");
                Self::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for OracleError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Upstream(msg) => (StatusCode::BAD_GATEWAY, "upstream_failed", msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_empty_body() {
        assert!(parse_text(b"").unwrap().is_none());
        assert!(parse_text(b"  \n").unwrap().is_none());
    }

    #[test]
    fn test_parse_text_blank_field() {
        assert!(parse_text(br#"{"text": "   "}"#).unwrap().is_none());
        assert!(parse_text(b"{}").unwrap().is_none());
    }

    #[test]
    fn test_parse_text_trims() {
        let text = parse_text(br#"{"text": "  will it rain?  "}"#).unwrap();
        assert_eq!(text.as_deref(), Some("will it rain?"));
    }

    #[test]
    fn test_parse_text_rejects_garbage() {
        assert!(matches!(
            parse_text(b"not json"),
            Err(OracleError::BadRequest(_))
        ));
    }
}
