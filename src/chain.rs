//! Bounded feedback loops where each output becomes the next input

use std::future::Future;
use std::time::Duration;

use crate::materialize::Artifact;
use crate::{Error, Result};

/// Words that end a chain when a step produces them
pub const EXIT_WORDS: [&str; 4] = ["exit", "quit", "stop", "end"];

/// Whether `text` is an exit sentinel
///
/// Case-insensitive; surrounding whitespace and trailing punctuation are
/// ignored. `"Quit!"` matches, `"stop the car"` does not.
#[must_use]
pub fn is_exit_sentinel(text: &str) -> bool {
    let word = text
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim();
    EXIT_WORDS.iter().any(|w| word.eq_ignore_ascii_case(w))
}

/// Why a chain stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStop {
    /// Reached the iteration bound
    Normal,
    /// A step failed
    Error,
    /// A step produced an exit sentinel
    UserExit,
}

/// What a successful step produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutput {
    /// Artifact materialized along the way, if any
    pub artifact: Option<Artifact>,
    /// Text fed into the next step
    pub output: String,
}

impl StepOutput {
    /// Output with no artifact
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            artifact: None,
            output: output.into(),
        }
    }
}

/// A failed step, with whatever it materialized before failing
#[derive(Debug)]
pub struct StepFailure {
    pub artifact: Option<Artifact>,
    pub error: Error,
}

impl StepFailure {
    /// Failure that still produced `artifact`
    #[must_use]
    pub fn with_artifact(error: Error, artifact: Artifact) -> Self {
        Self {
            artifact: Some(artifact),
            error,
        }
    }
}

impl From<Error> for StepFailure {
    fn from(error: Error) -> Self {
        Self {
            artifact: None,
            error,
        }
    }
}

/// One recorded iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEntry {
    pub input: String,
    pub artifact: Option<Artifact>,
    pub output: Option<String>,
    /// Set when the step failed
    pub error: Option<String>,
}

/// Result of running a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOutcome {
    pub history: Vec<ChainEntry>,
    pub stop: ChainStop,
    /// True unless the chain ran all iterations
    pub terminated_early: bool,
}

impl ChainOutcome {
    /// Number of iterations attempted
    #[must_use]
    pub fn iterations(&self) -> usize {
        self.history.len()
    }

    /// Convert an error stop into [`Error::ChainAborted`]
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChainAborted`] when the chain stopped on a failure
    pub fn into_result(self) -> Result<Self> {
        if self.stop != ChainStop::Error {
            return Ok(self);
        }
        let message = self
            .history
            .last()
            .and_then(|e| e.error.clone())
            .unwrap_or_default();
        Err(Error::ChainAborted {
            completed: self.history.len(),
            message,
        })
    }
}

/// Runs chains sequentially
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainDriver {
    pause: Duration,
}

impl ChainDriver {
    /// Driver with no pause between iterations
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pause: Duration::ZERO,
        }
    }

    /// Wait `pause` between iterations
    #[must_use]
    pub const fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Run `step` starting from `seed` for at most `max_iterations`
    ///
    /// `step` receives the 1-based iteration number and the current input.
    /// A failing step may hand back a partial artifact through
    /// [`StepFailure`]; it is kept in the failed entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `max_iterations` is zero. Step
    /// failures are reported through [`ChainStop::Error`], not as errors.
    pub async fn run<F, Fut>(
        &self,
        seed: impl Into<String>,
        max_iterations: usize,
        mut step: F,
    ) -> Result<ChainOutcome>
    where
        F: FnMut(usize, String) -> Fut,
        Fut: Future<Output = std::result::Result<StepOutput, StepFailure>>,
    {
        if max_iterations == 0 {
            return Err(Error::InvalidInput(
                "max_iterations must be positive".to_string(),
            ));
        }

        let mut input = seed.into();
        let mut history = Vec::new();

        for iteration in 1..=max_iterations {
            if iteration > 1 && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }

            tracing::debug!(iteration, max_iterations, "chain step");

            match step(iteration, input.clone()).await {
                Ok(StepOutput { artifact, output }) => {
                    let exit = is_exit_sentinel(&output);
                    history.push(ChainEntry {
                        input,
                        artifact,
                        output: Some(output.clone()),
                        error: None,
                    });
                    if exit {
                        tracing::info!(iteration, "chain stopped by exit word");
                        return Ok(ChainOutcome {
                            history,
                            stop: ChainStop::UserExit,
                            terminated_early: true,
                        });
                    }
                    input = output;
                }
                Err(StepFailure { artifact, error }) => {
                    tracing::warn!(iteration, error = %error, "chain step failed");
                    history.push(ChainEntry {
                        input,
                        artifact,
                        output: None,
                        error: Some(error.to_string()),
                    });
                    return Ok(ChainOutcome {
                        history,
                        stop: ChainStop::Error,
                        terminated_early: true,
                    });
                }
            }
        }

        Ok(ChainOutcome {
            history,
            stop: ChainStop::Normal,
            terminated_early: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materialize::ArtifactKind;

    #[test]
    fn test_exit_sentinel_matching() {
        assert!(is_exit_sentinel("exit"));
        assert!(is_exit_sentinel("  Quit! "));
        assert!(is_exit_sentinel("STOP."));
        assert!(is_exit_sentinel("end"));
        assert!(!is_exit_sentinel("stop the car"));
        assert!(!is_exit_sentinel("extended"));
        assert!(!is_exit_sentinel(""));
    }

    #[tokio::test]
    async fn test_runs_to_max_iterations() {
        let outcome = ChainDriver::new()
            .run("seed", 4, |i, input| async move {
                Ok(StepOutput::text(format!("{input}+{i}")))
            })
            .await
            .unwrap();

        assert_eq!(outcome.stop, ChainStop::Normal);
        assert!(!outcome.terminated_early);
        assert_eq!(outcome.iterations(), 4);
        assert_eq!(outcome.history[1].input, "seed+1");
        assert_eq!(outcome.history[3].output.as_deref(), Some("seed+1+2+3+4"));
    }

    #[tokio::test]
    async fn test_failure_on_step_k_stops_with_error() {
        let outcome = ChainDriver::new()
            .run("seed", 5, |i, input| async move {
                if i == 3 {
                    Err(StepFailure::from(Error::Generation("upstream down".into())))
                } else {
                    Ok(StepOutput::text(input))
                }
            })
            .await
            .unwrap();

        assert_eq!(outcome.stop, ChainStop::Error);
        assert!(outcome.terminated_early);
        assert_eq!(outcome.iterations(), 3);
        let failed = outcome.history.last().unwrap();
        assert_eq!(failed.input, "seed");
        assert!(failed.error.as_deref().unwrap().contains("upstream down"));

        let err = outcome.into_result().unwrap_err();
        assert!(matches!(err, Error::ChainAborted { completed: 3, .. }));
    }

    #[tokio::test]
    async fn test_exit_sentinel_on_step_k() {
        let outcome = ChainDriver::new()
            .run("seed", 10, |i, _| async move {
                Ok(StepOutput::text(if i == 2 { "Exit" } else { "go on" }))
            })
            .await
            .unwrap();

        assert_eq!(outcome.stop, ChainStop::UserExit);
        assert_eq!(outcome.iterations(), 2);
        assert!(outcome.into_result().is_ok());
    }

    #[tokio::test]
    async fn test_unbounded_iterations_exit_on_first_step() {
        let outcome = ChainDriver::new()
            .run("seed", usize::MAX, |_, _| async { Ok(StepOutput::text("exit")) })
            .await
            .unwrap();

        assert_eq!(outcome.stop, ChainStop::UserExit);
        assert_eq!(outcome.iterations(), 1);
    }

    #[tokio::test]
    async fn test_failed_step_keeps_partial_artifact() {
        let image = Artifact::File {
            kind: ArtifactKind::Image,
            path: std::path::PathBuf::from("telephone_game/image_1.png"),
        };
        let partial = image.clone();
        let outcome = ChainDriver::new()
            .run("seed", 3, move |_, _| {
                let partial = partial.clone();
                async move {
                    Err(StepFailure::with_artifact(
                        Error::Generation("vision down".into()),
                        partial,
                    ))
                }
            })
            .await
            .unwrap();

        assert_eq!(outcome.stop, ChainStop::Error);
        let failed = &outcome.history[0];
        assert_eq!(failed.artifact.as_ref(), Some(&image));
        assert!(failed.output.is_none());
    }

    #[tokio::test]
    async fn test_zero_iterations_rejected() {
        let result = ChainDriver::new()
            .run("seed", 0, |_, input| async move { Ok(StepOutput::text(input)) })
            .await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
