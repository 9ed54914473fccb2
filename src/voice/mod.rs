//! Voice input and output
//!
//! Recording and playback are delegated to external programs; speech
//! recognition and synthesis go through the generation API.

mod capture;
mod input;
mod playback;

pub use capture::{Recorder, Recording, SAMPLE_RATE, WavStats, inspect_wav};
pub use input::{FallbackInput, InputSource, MicrophoneInput, Transcriber, TypedInput};
pub use playback::{PlaybackHandle, Player};
