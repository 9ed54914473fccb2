//! Weather assistant using tool calls

use std::sync::Arc;

use crate::chain::is_exit_sentinel;
use crate::oracle::Oracle;
use crate::persona::Persona;
use crate::tools::{ToolRegistry, WeatherTool, expand_city_query};
use crate::voice::{InputSource, Player};
use crate::Result;

use super::play_best_effort;

/// Answer weather questions until the user leaves
///
/// Returns the answers given.
///
/// # Errors
///
/// Currently never fails; failed answers are printed and skipped
pub async fn run_weather(
    oracle: &Oracle,
    persona: &Persona,
    input: &dyn InputSource,
    player: Option<&Player>,
) -> Result<Vec<String>> {
    let tools = ToolRegistry::new().with(Arc::new(WeatherTool));
    let voice = persona.voice_or_default();
    let mut answers = Vec::new();

    println!("Ask about the weather, or just type a city name. Type 'exit' to quit.");

    loop {
        let Ok(line) = input.read("You").await else {
            break;
        };
        if is_exit_sentinel(&line) || line.trim().eq_ignore_ascii_case("bye") {
            println!("Goodbye!");
            break;
        }

        let question = expand_city_query(&line);
        match oracle.ask_with_tools(persona, &question, &tools).await {
            Ok(answer) => {
                println!("\nAssistant: {answer}");
                match oracle.speak(&answer, &voice, "weather_response").await {
                    Ok(path) => play_best_effort(player, &path).await,
                    Err(e) => tracing::warn!(error = %e, "speech synthesis failed"),
                }
                answers.push(answer);
            }
            Err(e) => println!("Error: {e}"),
        }
    }

    Ok(answers)
}
