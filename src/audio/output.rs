//! Output-context seam between the player and whatever renders audio.

use crate::synth::tone::ScheduledTone;

/// Error type for audio operations.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("No audio output device found")]
    NoDevice,

    #[error("Device configuration error: {0}")]
    DeviceConfig(String),

    #[error("Unsupported sample format: {0}. Supported formats: F32, I16, U16")]
    UnsupportedFormat(String),

    #[error("Error in stream creation: {0}")]
    StreamBuild(String),

    #[error("Error starting stream: {0}")]
    StreamPlay(String),

    #[error("Audio command queue is full")]
    QueueFull,

    #[error("Audio stream failed")]
    StreamFailed,
}

/// Where the player sends clicks and tones.
///
/// Timing is expressed on the output's own clock: `current_time` is seconds of
/// rendered audio, and scheduled tones carry absolute times on that clock.
pub trait AudioOutput {
    /// Current time on the output clock, in seconds.
    fn current_time(&self) -> f64;

    /// Hand a tone to the renderer. It plays without further involvement.
    fn schedule_tone(&mut self, tone: ScheduledTone) -> Result<(), AudioError>;

    /// Rewind the click sample to its start and play it.
    fn trigger_click(&mut self) -> Result<(), AudioError>;

    /// Silence the click and rewind it.
    fn stop_click(&mut self) -> Result<(), AudioError>;
}
