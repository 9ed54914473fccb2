//! TOML configuration file loading
//!
//! Looks for `oracle.toml` in the working directory, then in the user
//! config directory (`~/.config/oracle-gateway/oracle.toml` on Linux).
//! Every field is optional; the file overlays environment and defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::cache::CacheKeyPolicy;
use crate::materialize::TimestampResolution;
use crate::{Error, Result};

/// File name searched for when no path is given
pub const CONFIG_FILE_NAME: &str = "oracle.toml";

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct OracleConfigFile {
    /// Directory of persona JSON files overriding the embedded ones
    pub personas_dir: Option<String>,

    #[serde(default)]
    pub api: ApiFileConfig,

    #[serde(default)]
    pub retry: RetryFileConfig,

    #[serde(default)]
    pub output: OutputFileConfig,

    #[serde(default)]
    pub voice: VoiceFileConfig,

    #[serde(default)]
    pub images: ImagesFileConfig,

    #[serde(default)]
    pub cache: CacheFileConfig,

    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Generation API settings
#[derive(Debug, Default, Deserialize)]
pub struct ApiFileConfig {
    /// API key; takes precedence over `OPENAI_API_KEY`
    pub key: Option<String>,
    /// Base URL of an `OpenAI`-compatible API
    pub base_url: Option<String>,
    /// Per-attempt timeout in seconds
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RetryFileConfig {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

/// Where artifacts are written
#[derive(Debug, Default, Deserialize)]
pub struct OutputFileConfig {
    pub audio_dir: Option<String>,
    pub image_dir: Option<String>,
    pub log_dir: Option<String>,
    pub timestamp: Option<TimestampResolution>,
}

/// Recording, playback and speech models
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Recorder executable (e.g. "arecord")
    pub recorder: Option<String>,
    /// Seconds recorded per question
    pub record_seconds: Option<u64>,
    /// Player executable (e.g. "mpg123"); empty disables playback
    pub player: Option<String>,
    pub player_args: Option<Vec<String>>,
    /// STT model (e.g. "whisper-1")
    pub transcription_model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImagesFileConfig {
    pub model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CacheFileConfig {
    pub key_policy: Option<CacheKeyPolicy>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Parse a config file at an explicit path
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn read_config_file(path: &Path) -> Result<OracleConfigFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
    let config = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Load the first config file found in the default locations
///
/// A broken file is reported and ignored.
pub fn discover_config_file() -> OracleConfigFile {
    let Some(path) = default_config_paths().into_iter().find(|p| p.exists()) else {
        return OracleConfigFile::default();
    };

    match read_config_file(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            OracleConfigFile::default()
        }
    }
}

/// Candidate config file locations, in priority order
#[must_use]
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(dirs) = directories::ProjectDirs::from("dev", "oracle", "oracle-gateway") {
        paths.push(dirs.config_dir().join(CONFIG_FILE_NAME));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_file() {
        let config: OracleConfigFile = toml::from_str(
            r#"
            personas_dir = "./my-personas"

            [api]
            base_url = "http://localhost:8080/v1"

            [output]
            timestamp = "millis"

            [cache]
            key_policy = "trimmed"
            "#,
        )
        .unwrap();

        assert_eq!(config.personas_dir.as_deref(), Some("./my-personas"));
        assert_eq!(config.api.base_url.as_deref(), Some("http://localhost:8080/v1"));
        assert!(config.api.key.is_none());
        assert_eq!(config.output.timestamp, Some(TimestampResolution::Millis));
        assert_eq!(config.cache.key_policy, Some(CacheKeyPolicy::Trimmed));
        assert!(config.server.port.is_none());
    }

    #[test]
    fn test_read_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oracle.toml");
        std::fs::write(&path, "[api\nkey = ").unwrap();
        assert!(matches!(read_config_file(&path), Err(Error::Toml(_))));
    }

    #[test]
    fn test_read_missing_file() {
        assert!(matches!(
            read_config_file(Path::new("/nonexistent/oracle.toml")),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_default_paths_start_with_working_dir() {
        assert_eq!(default_config_paths()[0], PathBuf::from("oracle.toml"));
    }
}
