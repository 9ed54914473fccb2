//! Oracle personas
//!
//! A persona is the fixed instruction text and generation settings behind
//! an experience. Personas ship embedded in the binary; a directory of
//! JSON files can override them.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::request::{ConversationTurn, GenerationOptions, Task};
use crate::{Error, Result};

/// Identity and behavior of an oracle
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    /// Unique identifier, also the file stem
    pub id: String,

    /// Display name
    pub name: String,

    /// Short descriptive phrase
    pub tagline: Option<String>,

    /// System prompt sent first in every request
    pub system_prompt: String,

    /// Whether user input is required
    #[serde(default)]
    pub task: Task,

    /// Model and sampling settings
    #[serde(default)]
    pub options: GenerationOptions,

    /// Fixed turns sent after the system prompt and before any history
    #[serde(default)]
    pub instructions: Vec<ConversationTurn>,

    /// Speech synthesis settings
    pub voice: Option<VoiceSettings>,
}

/// Speech synthesis settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VoiceSettings {
    pub model: String,
    pub voice: String,
    pub speed: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            model: "tts-1".to_string(),
            voice: "onyx".to_string(),
            speed: 1.0,
        }
    }
}

impl Persona {
    /// Embedded personas compiled into the binary
    const EMBEDDED: &[(&str, &str)] = &[
        ("emoji-oracle", include_str!("../personas/emoji-oracle.json")),
        ("pythia", include_str!("../personas/pythia.json")),
        ("telephone-kid", include_str!("../personas/telephone-kid.json")),
        ("grandmother-helper", include_str!("../personas/grandmother-helper.json")),
        ("mother-in-law", include_str!("../personas/mother-in-law.json")),
        ("past-life", include_str!("../personas/past-life.json")),
        ("storyteller", include_str!("../personas/storyteller.json")),
        ("weather", include_str!("../personas/weather.json")),
    ];

    /// Load a persona, preferring `override_dir` over embedded data
    ///
    /// # Errors
    ///
    /// Returns [`Error::PersonaNotFound`] if no source has the persona, or
    /// [`Error::Config`] if a file exists but cannot be parsed
    pub fn load(persona_id: &str, override_dir: Option<&Path>) -> Result<Self> {
        if let Some(dir) = override_dir {
            if dir.exists() {
                match Self::load_from_dir(dir, persona_id) {
                    Ok(persona) => {
                        tracing::info!(persona_id, path = %dir.display(), "loaded persona from directory");
                        return Ok(persona);
                    }
                    Err(Error::PersonaNotFound(_)) => {
                        tracing::debug!(persona_id, "persona not in override directory, using embedded");
                    }
                    Err(e) => return Err(e),
                }
            } else {
                tracing::warn!(path = %dir.display(), "personas directory does not exist");
            }
        }

        Self::load_embedded(persona_id)
    }

    /// Load `<dir>/<persona_id>.json`
    ///
    /// # Errors
    ///
    /// Returns [`Error::PersonaNotFound`] if the file is absent
    pub fn load_from_dir(dir: &Path, persona_id: &str) -> Result<Self> {
        let path = dir.join(format!("{persona_id}.json"));
        if !path.exists() {
            return Err(Error::PersonaNotFound(persona_id.to_string()));
        }
        let content = std::fs::read_to_string(&path)?;
        Self::parse(persona_id, &content)
    }

    /// Load a persona compiled into the binary
    ///
    /// # Errors
    ///
    /// Returns [`Error::PersonaNotFound`] if the id is unknown
    pub fn load_embedded(persona_id: &str) -> Result<Self> {
        let (_, json) = Self::EMBEDDED
            .iter()
            .find(|(id, _)| *id == persona_id)
            .ok_or_else(|| Error::PersonaNotFound(persona_id.to_string()))?;
        Self::parse(persona_id, json)
    }

    /// Identifiers of the embedded personas
    pub fn embedded_ids() -> impl Iterator<Item = &'static str> {
        Self::EMBEDDED.iter().map(|(id, _)| *id)
    }

    fn parse(persona_id: &str, json: &str) -> Result<Self> {
        let persona: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("failed to parse persona {persona_id}: {e}")))?;
        persona.options.validate()?;
        Ok(persona)
    }

    /// Voice settings, falling back to defaults
    #[must_use]
    pub fn voice_or_default(&self) -> VoiceSettings {
        self.voice.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Role;

    #[test]
    fn test_all_embedded_personas_parse() {
        for id in Persona::embedded_ids() {
            let persona = Persona::load_embedded(id).unwrap();
            assert_eq!(persona.id, id);
            assert!(!persona.system_prompt.is_empty());
        }
    }

    #[test]
    fn test_pythia_is_generation_with_instruction() {
        let persona = Persona::load_embedded("pythia").unwrap();
        assert_eq!(persona.task, Task::Generation);
        assert_eq!(persona.instructions.len(), 1);
        assert_eq!(persona.instructions[0].role, Role::User);
        assert!((persona.options.temperature - 0.77).abs() < f32::EPSILON);
    }

    #[test]
    fn test_unknown_persona() {
        assert!(matches!(
            Persona::load_embedded("nobody"),
            Err(Error::PersonaNotFound(_))
        ));
    }

    #[test]
    fn test_override_dir_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("pythia.json"),
            r#"{"id":"pythia","name":"Local Pythia","systemPrompt":"Be brief."}"#,
        )
        .unwrap();

        let persona = Persona::load("pythia", Some(dir.path())).unwrap();
        assert_eq!(persona.name, "Local Pythia");
        assert_eq!(persona.task, Task::Conversation);
        assert_eq!(persona.options, GenerationOptions::default());

        let fallback = Persona::load("weather", Some(dir.path())).unwrap();
        assert_eq!(fallback.name, "Weather Assistant");
    }

    #[test]
    fn test_invalid_override_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pythia.json"), "{").unwrap();
        assert!(matches!(
            Persona::load("pythia", Some(dir.path())),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_voice_defaults() {
        let persona = Persona::load_embedded("emoji-oracle").unwrap();
        assert_eq!(persona.voice_or_default().voice, "onyx");
        let past_life = Persona::load_embedded("past-life").unwrap();
        assert!((past_life.voice_or_default().speed - 1.1).abs() < f32::EPSILON);
    }
}
