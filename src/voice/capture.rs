//! Microphone capture through an external recorder

use std::io::Cursor;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use crate::{Error, Result};

/// Sample rate requested from the recorder
pub const SAMPLE_RATE: u32 = 16000;

/// RMS below which a recording is treated as silence
const SILENCE_RMS: f32 = 0.005;

/// Recorded WAV audio ready for transcription
#[derive(Debug, Clone)]
pub struct Recording {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub stats: WavStats,
}

/// Summary of a WAV payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavStats {
    pub duration: Duration,
    /// Root mean square level in `[0, 1]`
    pub rms: f32,
}

impl WavStats {
    /// Whether the recording is too quiet to contain speech
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.duration.is_zero() || self.rms < SILENCE_RMS
    }
}

/// Records fixed-length clips with a command-line recorder
///
/// The default invocation is `arecord -q -f S16_LE -r 16000 -c 1 -d <secs> <file>`.
#[derive(Debug, Clone)]
pub struct Recorder {
    program: String,
    duration: Duration,
}

impl Recorder {
    /// Recorder running `program` for `duration` per clip
    #[must_use]
    pub fn new(program: impl Into<String>, duration: Duration) -> Self {
        Self {
            program: program.into(),
            duration,
        }
    }

    /// Record one clip
    ///
    /// # Errors
    ///
    /// Returns [`Error::Audio`] if the recorder cannot run, exits with an
    /// error, or captures only silence
    pub async fn record(&self) -> Result<Recording> {
        let file = tempfile::Builder::new()
            .prefix("oracle_input_")
            .suffix(".wav")
            .tempfile()?;

        tracing::debug!(program = %self.program, seconds = self.duration.as_secs(), "recording");
        self.run(file.path()).await?;

        let bytes = tokio::fs::read(file.path()).await?;
        let stats = inspect_wav(&bytes)?;
        if stats.is_silent() {
            return Err(Error::Audio("no speech detected".to_string()));
        }

        tracing::debug!(
            duration_ms = u64::try_from(stats.duration.as_millis()).unwrap_or(u64::MAX),
            rms = stats.rms,
            "recording captured"
        );

        Ok(Recording {
            bytes,
            file_name: "recording.wav".to_string(),
            stats,
        })
    }

    async fn run(&self, path: &Path) -> Result<()> {
        let seconds = self.duration.as_secs().max(1).to_string();
        let output = tokio::process::Command::new(&self.program)
            .args(["-q", "-f", "S16_LE", "-r", &SAMPLE_RATE.to_string(), "-c", "1", "-d", &seconds])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Audio(format!("failed to start recorder {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Audio(format!(
                "recorder exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Measure duration and loudness of 16-bit PCM WAV bytes
///
/// # Errors
///
/// Returns [`Error::Audio`] if the bytes are not a readable WAV file
#[allow(clippy::cast_precision_loss)]
pub fn inspect_wav(bytes: &[u8]) -> Result<WavStats> {
    let mut reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| Error::Audio(e.to_string()))?;
    let spec = reader.spec();

    let mut sum_squares = 0.0_f64;
    let mut count = 0_u64;
    for sample in reader.samples::<i16>() {
        let sample = sample.map_err(|e| Error::Audio(e.to_string()))?;
        let normalized = f64::from(sample) / f64::from(i16::MAX);
        sum_squares += normalized * normalized;
        count += 1;
    }

    let frames = count / u64::from(spec.channels.max(1));
    let duration = Duration::from_secs_f64(frames as f64 / f64::from(spec.sample_rate.max(1)));
    #[allow(clippy::cast_possible_truncation)]
    let rms = if count == 0 {
        0.0
    } else {
        (sum_squares / count as f64).sqrt() as f32
    };

    Ok(WavStats { duration, rms })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encode mono f32 samples in `[-1, 1]` as 16-bit WAV
    fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer =
                hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;
            for &sample in samples {
                #[allow(clippy::cast_possible_truncation)]
                let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer
                    .write_sample(sample_i16)
                    .map_err(|e| Error::Audio(e.to_string()))?;
            }
            writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
        }

        Ok(cursor.into_inner())
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn test_inspect_tone() {
        let samples: Vec<f32> = (0..SAMPLE_RATE)
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect();
        let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

        let stats = inspect_wav(&wav).unwrap();
        assert!((stats.duration.as_secs_f32() - 1.0).abs() < 0.01);
        assert!(stats.rms > 0.3);
        assert!(!stats.is_silent());
    }

    #[test]
    fn test_inspect_silence() {
        let wav = samples_to_wav(&vec![0.0; 8000], SAMPLE_RATE).unwrap();
        let stats = inspect_wav(&wav).unwrap();
        assert!(stats.is_silent());
    }

    #[test]
    fn test_inspect_garbage() {
        assert!(matches!(inspect_wav(b"not a wav"), Err(Error::Audio(_))));
    }

    #[tokio::test]
    async fn test_missing_recorder() {
        let recorder = Recorder::new("definitely-not-a-recorder-binary", Duration::from_secs(1));
        assert!(matches!(recorder.record().await, Err(Error::Audio(_))));
    }
}
