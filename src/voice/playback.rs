//! Audio playback through an external player

use std::path::Path;
use std::process::Stdio;

use tokio::process::{Child, Command};

use crate::{Error, Result};

/// Launches an audio player executable, e.g. `mpg123 -q <file>`
#[derive(Debug, Clone)]
pub struct Player {
    program: String,
    args: Vec<String>,
}

impl Player {
    /// Player running `program` with `args` followed by the file path
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Start playing `path`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Audio`] if the file is missing or the player cannot start
    pub fn play(&self, path: &Path) -> Result<PlaybackHandle> {
        if !path.exists() {
            return Err(Error::Audio(format!("no such audio file: {}", path.display())));
        }

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Audio(format!("failed to start player {}: {e}", self.program)))?;

        tracing::debug!(player = %self.program, path = %path.display(), "playback started");
        Ok(PlaybackHandle { child })
    }
}

/// A running playback
///
/// Dropping the handle stops the player.
#[derive(Debug)]
pub struct PlaybackHandle {
    child: Child,
}

impl PlaybackHandle {
    /// Wait for playback to finish
    ///
    /// # Errors
    ///
    /// Returns [`Error::Audio`] if the player exits unsuccessfully
    pub async fn wait(mut self) -> Result<()> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| Error::Audio(e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::Audio(format!("player exited with {status}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio_file() -> tempfile::NamedTempFile {
        let file = tempfile::Builder::new().suffix(".mp3").tempfile().unwrap();
        std::fs::write(file.path(), b"ID3").unwrap();
        file
    }

    #[tokio::test]
    async fn test_wait_for_successful_player() {
        let file = audio_file();
        let player = Player::new("sh", vec!["-c".into(), "exit 0".into()]);
        player.play(file.path()).unwrap().wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_player_is_reported() {
        let file = audio_file();
        let player = Player::new("sh", vec!["-c".into(), "exit 3".into()]);
        let err = player.play(file.path()).unwrap().wait().await.unwrap_err();
        assert!(matches!(err, Error::Audio(_)));
    }

    #[test]
    fn test_missing_file() {
        let player = Player::new("mpg123", vec!["-q".into()]);
        assert!(player.play(Path::new("/nonexistent/audio.mp3")).is_err());
    }
}
