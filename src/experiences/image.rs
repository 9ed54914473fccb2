//! Image oracles: sacred symbols and photo readings

use std::path::PathBuf;

use crate::oracle::Oracle;
use crate::persona::Persona;
use crate::{Error, Result};

const SYMBOL_SIZE: &str = "1024x1024";

fn symbol_prompt(name: &str) -> String {
    format!(
        "Generate a unique, sacred symbol that represents a personal cosmic message for {name}. \
         The glyph should resemble ancient runes, celestial diagrams, or alchemical sigils, \
         with layered, intersecting lines and geometric symmetry. \
         Use a dark background with luminous, glowing lines in gold, silver, or ethereal blue."
    )
}

/// Generate a sacred symbol for `name`
///
/// Saved as `<image dir>/<name>_sacred_symbol_<ts>.png`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for an empty name, or the generation error
pub async fn sacred_symbol(oracle: &Oracle, name: &str) -> Result<PathBuf> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("name is empty".to_string()));
    }

    tracing::info!(name, "generating sacred symbol");
    oracle
        .imagine(&symbol_prompt(name), SYMBOL_SIZE, &format!("{name}_sacred_symbol"))
        .await
}

/// Have `persona` read the image at `image` (path or URL)
///
/// # Errors
///
/// Returns error if the image cannot be loaded or the call fails
pub async fn describe_image(
    oracle: &Oracle,
    persona: &Persona,
    image: &str,
    question: Option<&str>,
) -> Result<String> {
    let instruction = question
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .unwrap_or("What's in this image?");
    oracle.describe(persona, instruction, image).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_prompt_mentions_name() {
        assert!(symbol_prompt("Ada").contains("cosmic message for Ada"));
    }
}
