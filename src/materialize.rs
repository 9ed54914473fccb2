//! Turning generation results into artifacts on disk

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::transport::GenerationResult;
use crate::{Error, Result};

/// Suffixed names tried before giving up on a crowded timestamp
const MAX_NAME_ATTEMPTS: u32 = 100;

/// What an artifact contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Text,
    Audio,
    Image,
    Log,
}

/// A materialized output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// Text returned as-is
    Text(String),
    /// Bytes written to disk
    File { kind: ArtifactKind, path: PathBuf },
}

impl Artifact {
    /// Path of a file artifact
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File { path, .. } => Some(path),
            Self::Text(_) => None,
        }
    }

    /// Content of a text artifact
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::File { .. } => None,
        }
    }
}

/// Granularity of the timestamp in generated file names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampResolution {
    /// Unix seconds
    #[default]
    Seconds,
    /// Unix milliseconds
    Millis,
}

impl TimestampResolution {
    fn now(self) -> i64 {
        let now = chrono::Utc::now();
        match self {
            Self::Seconds => now.timestamp(),
            Self::Millis => now.timestamp_millis(),
        }
    }
}

/// Output directories per artifact kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDirs {
    pub audio: PathBuf,
    pub image: PathBuf,
    pub log: PathBuf,
}

impl Default for OutputDirs {
    fn default() -> Self {
        Self {
            audio: PathBuf::from("output_audio"),
            image: PathBuf::from("oracle_symbols"),
            log: PathBuf::from("telephone_game"),
        }
    }
}

impl OutputDirs {
    /// All kinds under a single root
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            audio: root.join("output_audio"),
            image: root.join("oracle_symbols"),
            log: root.join("telephone_game"),
        }
    }

    fn for_kind(&self, kind: ArtifactKind) -> Option<&Path> {
        match kind {
            ArtifactKind::Audio => Some(&self.audio),
            ArtifactKind::Image => Some(&self.image),
            ArtifactKind::Log => Some(&self.log),
            ArtifactKind::Text => None,
        }
    }
}

/// Writes results to uniquely named files
#[derive(Debug, Clone, Default)]
pub struct Materializer {
    dirs: OutputDirs,
    resolution: TimestampResolution,
}

impl Materializer {
    /// Create a materializer over `dirs`
    #[must_use]
    pub const fn new(dirs: OutputDirs, resolution: TimestampResolution) -> Self {
        Self { dirs, resolution }
    }

    /// Configured output directories
    #[must_use]
    pub const fn dirs(&self) -> &OutputDirs {
        &self.dirs
    }

    /// Turn `result` into an artifact of `kind`
    ///
    /// Text results for [`ArtifactKind::Text`] are returned unchanged. Binary
    /// results are written to `<dir>/<hint>_<timestamp>.<ext>`. An existing
    /// file is never overwritten; a taken name gets a `_2`, `_3`, ... suffix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generation`] for a failed result, [`Error::InvalidInput`]
    /// when the result does not fit the kind, and [`Error::Io`] on disk failure
    pub fn materialize(
        &self,
        result: GenerationResult,
        kind: ArtifactKind,
        name_hint: &str,
    ) -> Result<Artifact> {
        match (result, kind) {
            (GenerationResult::Failure(message), _) => Err(Error::Generation(message)),
            (GenerationResult::Text(text), ArtifactKind::Text) => Ok(Artifact::Text(text)),
            (GenerationResult::Text(text), ArtifactKind::Log) => {
                let path = self.write_new(kind, name_hint, "txt", text.as_bytes())?;
                Ok(Artifact::File { kind, path })
            }
            (GenerationResult::Binary { bytes, extension }, ArtifactKind::Audio | ArtifactKind::Image) => {
                let path = self.write_new(kind, name_hint, &extension, &bytes)?;
                Ok(Artifact::File { kind, path })
            }
            (GenerationResult::ToolCalls(_), _) => Err(Error::InvalidInput(
                "tool calls cannot be materialized".to_string(),
            )),
            (other, kind) => Err(Error::InvalidInput(format!(
                "cannot materialize {} as {kind:?}",
                describe(&other)
            ))),
        }
    }

    /// Create a fresh log file named after `name_hint` and write `lines`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be created or written
    pub fn write_log(&self, name_hint: &str, lines: &[String]) -> Result<PathBuf> {
        let mut body = lines.join("\n");
        body.push('\n');
        self.write_new(ArtifactKind::Log, name_hint, "txt", body.as_bytes())
    }

    /// Append `lines` to an existing log file, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be opened or written
    pub fn append_log(&self, path: &Path, lines: &[String]) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        for line in lines {
            writeln!(file, "{line}")?;
        }
        Ok(())
    }

    fn write_new(
        &self,
        kind: ArtifactKind,
        name_hint: &str,
        extension: &str,
        bytes: &[u8],
    ) -> Result<PathBuf> {
        let dir = self
            .dirs
            .for_kind(kind)
            .ok_or_else(|| Error::InvalidInput(format!("{kind:?} artifacts have no directory")))?;
        std::fs::create_dir_all(dir)?;

        let stem = format!("{}_{}", sanitize(name_hint), self.resolution.now());
        let extension = extension.trim_start_matches('.');

        for attempt in 1..=MAX_NAME_ATTEMPTS {
            let file_name = if attempt == 1 {
                format!("{stem}.{extension}")
            } else {
                format!("{stem}_{attempt}.{extension}")
            };
            let path = dir.join(file_name);

            let mut file = match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };
            fill(&path, &mut file, bytes)?;

            tracing::debug!(path = %path.display(), bytes = bytes.len(), "artifact written");
            return Ok(path);
        }

        Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("no free file name for {stem}.{extension}"),
        )))
    }
}

/// Write `bytes` into the just-created `path`, removing it if the write fails
fn fill(path: &Path, writer: &mut impl Write, bytes: &[u8]) -> Result<()> {
    if let Err(e) = writer.write_all(bytes).and_then(|()| writer.flush()) {
        if let Err(remove) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %remove, "failed to remove partial artifact");
        }
        return Err(e.into());
    }
    Ok(())
}

/// Reduce a name hint to a safe file-name stem
///
/// Keeps ASCII alphanumerics, `-` and `_`; everything else becomes `_`.
/// An empty result becomes `artifact`.
#[must_use]
pub fn sanitize(hint: &str) -> String {
    let cleaned: String = hint
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        "artifact".to_string()
    } else {
        cleaned.to_string()
    }
}

const fn describe(result: &GenerationResult) -> &'static str {
    match result {
        GenerationResult::Text(_) => "text",
        GenerationResult::Binary { .. } => "binary",
        GenerationResult::ToolCalls(_) => "tool calls",
        GenerationResult::Failure(_) => "failure",
    }
}
