//! Voice-driven past life reading

use std::path::PathBuf;
use std::sync::Mutex;

use crate::chain::{ChainDriver, ChainOutcome, ChainStop, StepFailure, StepOutput, is_exit_sentinel};
use crate::materialize::Artifact;
use crate::oracle::Oracle;
use crate::persona::Persona;
use crate::voice::{InputSource, Player};
use crate::{Error, Result};

use super::play_best_effort;

const WELCOME: &str = "Welcome to the Past Life Oracle. I will reveal how you looked in your past life \
                       and tell your story. Please say your name clearly.";
const ASK_QUESTION: &str =
    "You can now ask questions about your past life or say exit to end the session.";
const FAREWELL: &str = "Thank you for consulting the Past Life Oracle. Farewell!";

/// Knobs for a past life session
#[derive(Debug, Clone)]
pub struct PastLifeSettings {
    /// Questions allowed after the story
    pub max_questions: usize,
    /// Generate a portrait alongside the story
    pub portrait: bool,
}

impl Default for PastLifeSettings {
    fn default() -> Self {
        Self {
            max_questions: 5,
            portrait: true,
        }
    }
}

/// What happened in a past life session
#[derive(Debug, Clone, Default)]
pub struct PastLifeReport {
    pub name: String,
    pub story: String,
    pub portrait: Option<PathBuf>,
    /// Question and answer pairs, in order
    pub answers: Vec<(String, String)>,
    /// Spoken narration files, in order
    pub audio: Vec<PathBuf>,
    /// The follow-up questions, absent when none were allowed
    pub followups: Option<ChainOutcome>,
}

/// Tell the user who they were, then answer questions about it
///
/// The name is read from `input` unless `name` carries one. Questions run
/// as a chain that ends on an exit word, a failed read, or after
/// `max_questions`. Speech and portrait failures are reported and skipped;
/// a failed story ends the session.
///
/// # Errors
///
/// Returns error if no name is given or the story cannot be generated
pub async fn run_past_life(
    oracle: &Oracle,
    storyteller: &Persona,
    seer: &Persona,
    name: Option<&str>,
    input: &dyn InputSource,
    player: Option<&Player>,
    settings: &PastLifeSettings,
) -> Result<PastLifeReport> {
    let audio = Mutex::new(Vec::new());

    println!("{WELCOME}");
    narrate(oracle, storyteller, WELCOME, "welcome", player, &audio).await;

    let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => input.read("Your name").await?.trim().to_string(),
    };
    if name.is_empty() {
        return Err(Error::InvalidInput("name is empty".to_string()));
    }

    println!("\nGenerating your past life details...");
    let story = oracle.ask(storyteller, &story_prompt(&name), &[]).await?;
    println!("\n{story}");
    narrate(oracle, storyteller, &story, "oracle_response", player, &audio).await;

    let portrait = if settings.portrait {
        println!("\nGenerating your past life appearance...");
        match oracle
            .imagine(&portrait_prompt(&name), "512x512", &format!("{name}_past_life"))
            .await
        {
            Ok(path) => {
                println!("Portrait saved to {}", path.display());
                Some(path)
            }
            Err(e) => {
                tracing::warn!(error = %e, "portrait generation failed");
                None
            }
        }
    } else {
        None
    };

    let followups = if settings.max_questions == 0 {
        None
    } else {
        println!("\n{ASK_QUESTION}");
        narrate(oracle, seer, ASK_QUESTION, "ask_question", player, &audio).await;

        let session = Session {
            oracle,
            seer,
            name: &name,
            story: &story,
            input,
            player,
            audio: &audio,
            max_questions: settings.max_questions,
        };
        let outcome = ChainDriver::new()
            .run(story.as_str(), settings.max_questions, |asked, _| {
                session.follow_up(asked)
            })
            .await?;
        if outcome.stop == ChainStop::Normal {
            println!("\nYou've reached the maximum number of questions for this session.");
        }
        Some(outcome)
    };

    println!("\n{FAREWELL}");
    narrate(oracle, seer, FAREWELL, "farewell", player, &audio).await;

    let answers = followups
        .iter()
        .flat_map(|outcome| &outcome.history)
        .filter_map(|entry| {
            let answer = entry.artifact.as_ref().and_then(Artifact::text)?;
            Some((entry.output.clone()?, answer.to_string()))
        })
        .collect();

    Ok(PastLifeReport {
        name,
        story,
        portrait,
        answers,
        audio: audio.into_inner().unwrap_or_else(std::sync::PoisonError::into_inner),
        followups,
    })
}

/// Everything one follow-up question needs
#[derive(Clone, Copy)]
struct Session<'a> {
    oracle: &'a Oracle,
    seer: &'a Persona,
    name: &'a str,
    story: &'a str,
    input: &'a dyn InputSource,
    player: Option<&'a Player>,
    audio: &'a Mutex<Vec<PathBuf>>,
    max_questions: usize,
}

impl Session<'_> {
    /// Read question number `asked` and answer it
    ///
    /// The question is the step output, so an exit word ends the chain. The
    /// answer rides along as a text artifact.
    async fn follow_up(self, asked: usize) -> std::result::Result<StepOutput, StepFailure> {
        let remaining = self.max_questions - asked + 1;
        let question = self
            .input
            .read(&format!("Your question ({remaining} left, or 'exit' to quit)"))
            .await?;
        if is_exit_sentinel(&question) {
            return Ok(StepOutput::text(question));
        }

        match self
            .oracle
            .ask(self.seer, &question_prompt(self.name, self.story, &question), &[])
            .await
        {
            Ok(answer) => {
                println!("\n{answer}");
                narrate(self.oracle, self.seer, &answer, "oracle_response", self.player, self.audio)
                    .await;
                Ok(StepOutput {
                    artifact: Some(Artifact::Text(answer)),
                    output: question,
                })
            }
            Err(e) => {
                println!("The oracle is silent: {e}");
                Ok(StepOutput::text(question))
            }
        }
    }
}

/// Speak `text` through the cache and play it, recording the file
async fn narrate(
    oracle: &Oracle,
    persona: &Persona,
    text: &str,
    name_hint: &str,
    player: Option<&Player>,
    audio: &Mutex<Vec<PathBuf>>,
) {
    match oracle.speak(text, &persona.voice_or_default(), name_hint).await {
        Ok(path) => {
            play_best_effort(player, &path).await;
            audio
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(path);
        }
        Err(e) => tracing::warn!(error = %e, "speech synthesis failed, continuing in text"),
    }
}

fn story_prompt(name: &str) -> String {
    format!(
        "Create a brief, funny description (2-3 sentences) of who {name} was in their past life. \
         Start with 'You were...' and include their occupation and one amusing detail."
    )
}

fn question_prompt(name: &str, story: &str, question: &str) -> String {
    format!(
        "Based on this past life story about {name}:\n\n\"{story}\"\n\n\
         Answer this question about their past life: \"{question}\"\n\n\
         Be consistent with the story. Keep your answer to 1-3 sentences with a humorous detail."
    )
}

fn portrait_prompt(name: &str) -> String {
    format!("Portrait of {name} in past life, realistic face, period clothing, simple background.")
}
