//! Free-form chat with a persona

use crate::chain::is_exit_sentinel;
use crate::oracle::Oracle;
use crate::persona::Persona;
use crate::request::ConversationTurn;
use crate::voice::InputSource;
use crate::Result;

/// How a chat session went
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatSummary {
    /// Questions answered
    pub answered: usize,
    /// Questions that failed
    pub failed: usize,
    /// The conversation, oldest first
    pub history: Vec<ConversationTurn>,
}

/// Chat until the user says an exit word or `max_turns` questions are asked
///
/// A failed answer is reported and the session continues. Running out of
/// input ends the session.
///
/// # Errors
///
/// Currently never fails; the `Result` leaves room for setup errors
pub async fn run_chat(
    oracle: &Oracle,
    persona: &Persona,
    input: &dyn InputSource,
    max_turns: Option<usize>,
) -> Result<ChatSummary> {
    let mut summary = ChatSummary::default();
    println!("{} is listening. Type 'exit' or 'quit' to leave.", persona.name);

    loop {
        if max_turns.is_some_and(|max| summary.answered + summary.failed >= max) {
            break;
        }

        let question = match input.read("You").await {
            Ok(question) => question,
            Err(e) => {
                tracing::debug!(error = %e, "no more input");
                break;
            }
        };
        if is_exit_sentinel(&question) {
            println!("Goodbye!");
            break;
        }

        match oracle.ask(persona, &question, &summary.history).await {
            Ok(answer) => {
                println!("{}: {answer}", persona.name);
                summary.history.push(ConversationTurn::user(question));
                summary.history.push(ConversationTurn::assistant(answer));
                summary.answered += 1;
            }
            Err(e) => {
                println!("Error: {e}");
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}
