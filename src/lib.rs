// Rhythm player - Library exports for the binary, tests and benchmarks

pub mod audio;
pub mod config;
pub mod connection;
pub mod messaging;
pub mod sequencer;
pub mod synth;

// Re-export commonly used types for convenience
pub use audio::engine::AudioEngine;
pub use audio::output::{AudioError, AudioOutput};
pub use audio::renderer::Renderer;
pub use audio::timing::AudioTiming;
pub use config::{ConfigError, ConfigSource, PlayerConfig};
pub use messaging::channels::{create_audio_command_channel, create_command_channel};
pub use messaging::command::{AudioCommand, Command, CommandError};
pub use sequencer::{RhythmPattern, RhythmPlayer, Tempo};
pub use synth::oscillator::{Oscillator, SimpleOscillator, WaveformType};
pub use synth::tone::{ScheduledTone, ToneSettings};
