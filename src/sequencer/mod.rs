// Sequencer module - Tempo, rhythm patterns, timers and the player loop

pub mod metronome;
pub mod pattern;
pub mod player;
pub mod scheduler;
pub mod timeline;

pub use metronome::{ClickPlayback, ClickSound, MetronomeLoop};
pub use pattern::{RhythmPattern, ToneEvent, pattern_durations, schedule_tones, total_duration};
pub use player::{PlayerTask, RhythmPlayer};
pub use scheduler::{CancellationToken, TimerId, TimerQueue};
pub use timeline::{BEATS_PER_MEASURE, Tempo};
