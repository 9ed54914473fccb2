//! The image telephone game
//!
//! Prompt to image, image to description, description to the next image.

use std::path::PathBuf;
use std::time::Duration;

use crate::chain::{ChainDriver, ChainOutcome, ChainStop, StepFailure, StepOutput};
use crate::materialize::{Artifact, ArtifactKind};
use crate::oracle::Oracle;
use crate::persona::Persona;
use crate::{Error, Result};

const IMAGE_SIZE: &str = "1024x1024";
const DESCRIBE_INSTRUCTION: &str = "Describe this image in detail. What do you see?";

/// Result of a telephone game
#[derive(Debug, Clone)]
pub struct TelephoneReport {
    pub outcome: ChainOutcome,
    /// Game log, when it could be written
    pub log_path: Option<PathBuf>,
}

/// Play `cycles` rounds starting from `seed`
///
/// Stops at the first failed image or description. The game log is opened
/// before the first cycle and extended after each one, so an interrupted
/// game still leaves the cycles played so far.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for an empty seed or zero cycles
pub async fn run_telephone(
    oracle: &Oracle,
    persona: &Persona,
    seed: &str,
    cycles: usize,
    pause: Duration,
) -> Result<TelephoneReport> {
    if seed.trim().is_empty() {
        return Err(Error::InvalidInput("initial prompt is empty".to_string()));
    }
    if cycles == 0 {
        return Err(Error::InvalidInput("cycles must be positive".to_string()));
    }

    println!("Starting with prompt: '{seed}'");

    let materializer = oracle.materializer();
    let header = header_lines(seed, chrono::Local::now());
    let log_path = match materializer.write_log("game_log", &header) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!(error = %e, "failed to create game log");
            None
        }
    };
    let log = log_path.as_deref();
    let record = |lines: &[String]| {
        if let Some(path) = log
            && let Err(e) = materializer.append_log(path, lines)
        {
            tracing::warn!(path = %path.display(), error = %e, "failed to extend game log");
        }
    };

    let outcome = ChainDriver::new()
        .with_pause(pause)
        .run(seed.trim(), cycles, |cycle, prompt| async move {
            println!("\n--- Cycle {cycle} of {cycles} ---");
            let result = play_cycle(oracle, persona, &prompt).await;
            record(&cycle_lines(cycle, cycles, &prompt, &result));
            result
        })
        .await?;

    record(&footer_lines(&outcome, chrono::Local::now()));
    if let Some(path) = log {
        println!("\nTelephone game finished. Log saved to {}", path.display());
    }

    Ok(TelephoneReport { outcome, log_path })
}

/// Draw `prompt`, then have `persona` describe the drawing
async fn play_cycle(
    oracle: &Oracle,
    persona: &Persona,
    prompt: &str,
) -> std::result::Result<StepOutput, StepFailure> {
    let image = oracle.imagine(prompt, IMAGE_SIZE, "image").await?;
    println!("Image saved to {}", image.display());

    let description = match oracle
        .describe(persona, DESCRIBE_INSTRUCTION, &image.to_string_lossy())
        .await
    {
        Ok(description) => description,
        Err(e) => {
            return Err(StepFailure::with_artifact(
                e,
                Artifact::File {
                    kind: ArtifactKind::Image,
                    path: image,
                },
            ));
        }
    };
    println!("Description: {description}");

    Ok(StepOutput {
        artifact: Some(Artifact::File {
            kind: ArtifactKind::Image,
            path: image,
        }),
        output: description,
    })
}

fn header_lines(seed: &str, started: chrono::DateTime<chrono::Local>) -> Vec<String> {
    vec![
        "=== AI Telephone Game with Images ===".to_string(),
        format!("Start Time: {}", started.format("%Y-%m-%d %H:%M:%S")),
        format!("Initial Prompt: {seed}"),
        String::new(),
    ]
}

fn cycle_lines(
    cycle: usize,
    cycles: usize,
    prompt: &str,
    result: &std::result::Result<StepOutput, StepFailure>,
) -> Vec<String> {
    let mut lines = vec![
        format!("--- Cycle {cycle} of {cycles} ---"),
        format!("Prompt: {prompt}"),
    ];
    let artifact = match result {
        Ok(step) => step.artifact.as_ref(),
        Err(failure) => failure.artifact.as_ref(),
    };
    if let Some(path) = artifact.and_then(Artifact::path) {
        lines.push(format!("Image Path: {}", path.display()));
    }
    match result {
        Ok(step) => lines.push(format!("Description: {}", step.output)),
        Err(failure) => lines.push(format!("Failed: {}", failure.error)),
    }
    lines.push(String::new());
    lines
}

fn footer_lines(outcome: &ChainOutcome, finished: chrono::DateTime<chrono::Local>) -> Vec<String> {
    let mut lines = Vec::new();
    if outcome.stop == ChainStop::Error {
        lines.push(format!("Game stopped after cycle {}.", outcome.iterations()));
    }
    lines.push(format!("Game completed at: {}", finished.format("%Y-%m-%d %H:%M:%S")));
    lines
}
