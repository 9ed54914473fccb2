//! Configuration management for the oracle gateway
//!
//! Values come from defaults, then environment variables, then an optional
//! TOML file (see [`file`]).

pub mod file;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheKeyPolicy;
use crate::credentials::CredentialResolver;
use crate::materialize::{Materializer, OutputDirs, TimestampResolution};
use crate::retry::{RetryPolicy, is_retryable};
use crate::transport::DEFAULT_BASE_URL;
use crate::voice::{Player, Recorder};
use crate::{Error, Result};

use self::file::OracleConfigFile;

/// Oracle gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API key from the config file; the environment is consulted later
    pub api_key: Option<String>,

    /// Base URL of the generation API
    pub base_url: String,

    /// Per-attempt timeout
    pub timeout: Duration,

    /// Retry settings
    pub retry: RetryConfig,

    /// Artifact directories
    pub output: OutputDirs,

    /// Timestamp granularity in artifact names
    pub timestamp: TimestampResolution,

    /// Audio cache key derivation
    pub cache_key_policy: CacheKeyPolicy,

    /// Recording and playback
    pub voice: VoiceConfig,

    /// Image synthesis model
    pub image_model: String,

    /// Directory overriding embedded personas
    pub personas_dir: Option<PathBuf>,

    /// HTTP API server configuration
    pub server: ServerConfig,
}

/// Retry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Voice configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceConfig {
    /// Recorder executable
    pub recorder: String,
    /// Length of each recording
    pub record_duration: Duration,
    /// Player executable; `None` disables playback
    pub player: Option<String>,
    pub player_args: Vec<String>,
    /// Speech-to-text model
    pub transcription_model: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            recorder: "arecord".to_string(),
            record_duration: Duration::from_secs(5),
            player: Some("mpg123".to_string()),
            player_args: vec!["-q".to_string()],
            transcription_model: "whisper-1".to_string(),
        }
    }
}

/// HTTP API server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: crate::invoker::DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
            output: OutputDirs::default(),
            timestamp: TimestampResolution::default(),
            cache_key_policy: CacheKeyPolicy::default(),
            voice: VoiceConfig::default(),
            image_model: "dall-e-2".to_string(),
            personas_dir: None,
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the environment and a TOML file
    ///
    /// `path`, or `ORACLE_CONFIG` when `path` is `None`, must point to a
    /// readable file. Without either, the default locations are searched.
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config file is unreadable or a value is
    /// malformed
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let lookup = |name: &str| std::env::var(name).ok();

        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| lookup("ORACLE_CONFIG").map(PathBuf::from));
        let file = match explicit {
            Some(path) => file::read_config_file(&path)?,
            None => file::discover_config_file(),
        };

        Self::from_sources(lookup, file)
    }

    /// Build configuration from an environment lookup and a parsed file
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a value is malformed
    pub fn from_sources(
        lookup: impl Fn(&str) -> Option<String>,
        file: OracleConfigFile,
    ) -> Result<Self> {
        let mut config = Self::default();

        // Environment
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            config.base_url = url;
        }
        if let Some(secs) = parse_env::<u64>(&lookup, "ORACLE_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = parse_env::<u32>(&lookup, "ORACLE_MAX_ATTEMPTS")? {
            config.retry.max_attempts = attempts;
        }
        if let Some(root) = lookup("ORACLE_OUTPUT_DIR") {
            config.output = OutputDirs::under(root);
        }
        if let Some(recorder) = lookup("ORACLE_RECORDER") {
            config.voice.recorder = recorder;
        }
        if let Some(player) = lookup("ORACLE_PLAYER") {
            config.voice.player = non_empty(player);
        }
        if let Some(model) = lookup("ORACLE_IMAGE_MODEL") {
            config.image_model = model;
        }
        if let Some(dir) = lookup("ORACLE_PERSONAS_DIR") {
            config.personas_dir = Some(PathBuf::from(dir));
        }
        if let Some(host) = lookup("ORACLE_API_HOST") {
            config.server.host = host;
        }
        if let Some(port) = parse_env::<u16>(&lookup, "ORACLE_API_PORT")? {
            config.server.port = port;
        }

        config.apply_file(file);
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: OracleConfigFile) {
        if let Some(dir) = file.personas_dir {
            self.personas_dir = Some(PathBuf::from(dir));
        }

        if let Some(key) = file.api.key {
            self.api_key = Some(key);
        }
        if let Some(url) = file.api.base_url {
            self.base_url = url;
        }
        if let Some(secs) = file.api.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }

        if let Some(attempts) = file.retry.max_attempts {
            self.retry.max_attempts = attempts;
        }
        if let Some(ms) = file.retry.base_delay_ms {
            self.retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = file.retry.max_delay_ms {
            self.retry.max_delay = Duration::from_millis(ms);
        }

        if let Some(dir) = file.output.audio_dir {
            self.output.audio = PathBuf::from(dir);
        }
        if let Some(dir) = file.output.image_dir {
            self.output.image = PathBuf::from(dir);
        }
        if let Some(dir) = file.output.log_dir {
            self.output.log = PathBuf::from(dir);
        }
        if let Some(resolution) = file.output.timestamp {
            self.timestamp = resolution;
        }

        if let Some(recorder) = file.voice.recorder {
            self.voice.recorder = recorder;
        }
        if let Some(secs) = file.voice.record_seconds {
            self.voice.record_duration = Duration::from_secs(secs);
        }
        if let Some(player) = file.voice.player {
            self.voice.player = non_empty(player);
        }
        if let Some(args) = file.voice.player_args {
            self.voice.player_args = args;
        }
        if let Some(model) = file.voice.transcription_model {
            self.voice.transcription_model = model;
        }

        if let Some(model) = file.images.model {
            self.image_model = model;
        }
        if let Some(policy) = file.cache.key_policy {
            self.cache_key_policy = policy;
        }
        if let Some(host) = file.server.host {
            self.server.host = host;
        }
        if let Some(port) = file.server.port {
            self.server.port = port;
        }
    }

    fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid base URL {}: {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "base URL must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be positive".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Retry policy built from [`RetryConfig`]
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: self.retry.base_delay,
            max_delay: self.retry.max_delay,
            retryable: is_retryable,
        }
    }

    /// Credential resolver seeded with the configured key
    #[must_use]
    pub fn credential_resolver(&self, interactive: bool) -> CredentialResolver {
        CredentialResolver::new()
            .with_explicit(self.api_key.clone())
            .interactive(interactive)
    }

    /// Materializer over the configured directories
    #[must_use]
    pub fn materializer(&self) -> Materializer {
        Materializer::new(self.output.clone(), self.timestamp)
    }

    /// Recorder for microphone input
    #[must_use]
    pub fn recorder(&self) -> Recorder {
        Recorder::new(self.voice.recorder.clone(), self.voice.record_duration)
    }

    /// Audio player, unless playback is disabled
    #[must_use]
    pub fn player(&self) -> Option<Player> {
        self.voice
            .player
            .as_ref()
            .map(|program| Player::new(program.clone(), self.voice.player_args.clone()))
    }
}

fn parse_env<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>> {
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| Error::Config(format!("{name} has invalid value {raw:?}")))
        })
        .transpose()
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(no_env, OracleConfigFile::default()).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.output.image, PathBuf::from("oracle_symbols"));
        assert_eq!(config.output.audio, PathBuf::from("output_audio"));
        assert_eq!(config.output.log, PathBuf::from("telephone_game"));
        assert_eq!(config.voice.recorder, "arecord");
        assert_eq!(config.voice.player.as_deref(), Some("mpg123"));
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_environment_overrides_defaults() {
        let env = |name: &str| match name {
            "OPENAI_BASE_URL" => Some("http://localhost:9000/v1".to_string()),
            "ORACLE_MAX_ATTEMPTS" => Some("5".to_string()),
            "ORACLE_OUTPUT_DIR" => Some("/tmp/oracle".to_string()),
            "ORACLE_PLAYER" => Some(String::new()),
            _ => None,
        };
        let config = Config::from_sources(env, OracleConfigFile::default()).unwrap();
        assert_eq!(config.base_url, "http://localhost:9000/v1");
        assert_eq!(config.retry_policy().max_attempts, 5);
        assert_eq!(config.output.audio, PathBuf::from("/tmp/oracle/output_audio"));
        assert!(config.player().is_none());
    }

    #[test]
    fn test_file_overlays_environment() {
        let env = |name: &str| (name == "ORACLE_API_PORT").then(|| "7000".to_string());
        let file: OracleConfigFile = toml::from_str(
            r#"
            [api]
            key = "sk-file"
            timeout_secs = 10

            [server]
            port = 8000
            "#,
        )
        .unwrap();

        let config = Config::from_sources(env, file).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.api_key.as_deref(), Some("sk-file"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let env = |name: &str| (name == "ORACLE_TIMEOUT_SECS").then(|| "soon".to_string());
        assert!(matches!(
            Config::from_sources(env, OracleConfigFile::default()),
            Err(Error::Config(_))
        ));

        let env = |name: &str| (name == "OPENAI_BASE_URL").then(|| "not a url".to_string());
        assert!(Config::from_sources(env, OracleConfigFile::default()).is_err());

        let env = |name: &str| (name == "OPENAI_BASE_URL").then(|| "ftp://example.com".to_string());
        assert!(Config::from_sources(env, OracleConfigFile::default()).is_err());
    }
}
