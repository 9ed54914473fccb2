//! HTTP API server for the oracle gateway

pub mod health;
pub mod oracle;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::oracle::Oracle;
use crate::persona::{Persona, VoiceSettings};
use crate::Result;

/// Shared state for API handlers
pub struct ApiState {
    pub oracle: Oracle,
    /// Persona answering `/oracle`
    pub persona: Persona,
    /// Voice used by `/speak`
    pub voice: VoiceSettings,
}

impl ApiState {
    /// State serving `persona`, speaking with its voice
    #[must_use]
    pub fn new(oracle: Oracle, persona: Persona) -> Self {
        let voice = persona.voice_or_default();
        Self {
            oracle,
            persona,
            voice,
        }
    }
}

/// Full application router over `state`
pub fn router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(oracle::router(state))
        .merge(health::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Builder for the API server
pub struct ApiServerBuilder {
    oracle: Oracle,
    persona: Persona,
    voice: Option<VoiceSettings>,
    host: String,
    port: u16,
}

impl ApiServerBuilder {
    /// Create a new builder with the required parts
    #[must_use]
    pub fn new(oracle: Oracle, persona: Persona) -> Self {
        let defaults = ServerConfig::default();
        Self {
            oracle,
            persona,
            voice: None,
            host: defaults.host,
            port: defaults.port,
        }
    }

    /// Listen address from configuration
    #[must_use]
    pub fn server(mut self, server: &ServerConfig) -> Self {
        self.host.clone_from(&server.host);
        self.port = server.port;
        self
    }

    /// Listen on `port` instead of the configured one
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the persona's voice for `/speak`
    #[must_use]
    pub fn voice(mut self, voice: VoiceSettings) -> Self {
        self.voice = Some(voice);
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let mut state = ApiState::new(self.oracle, self.persona);
        if let Some(voice) = self.voice {
            state.voice = voice;
        }

        ApiServer {
            state: Arc::new(state),
            host: self.host,
            port: self.port,
        }
    }
}

/// HTTP API server
pub struct ApiServer {
    state: Arc<ApiState>,
    host: String,
    port: u16,
}

impl ApiServer {
    /// Address the server binds to
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if the server fails to bind or serve
    pub async fn run(self) -> Result<()> {
        let addr = self.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(
            addr = %addr,
            persona = %self.state.persona.id,
            "API server listening"
        );

        axum::serve(listener, router(self.state))
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }
}
