// Timeline - Tempo and the durations derived from it
// Every pattern and loop duration is a multiple of the quarter note at the current tempo

use std::fmt;

/// Quarter notes per measure. The sequence player loops once per measure.
pub const BEATS_PER_MEASURE: f64 = 4.0;

/// Rejected tempo value
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("BPM must be between 1 and 1000, got {0}")]
pub struct InvalidTempo(pub f64);

/// Tempo in BPM (Beats Per Minute)
/// One beat is one quarter note. Valid tempos lie in `MIN_BPM..=MAX_BPM`
/// (a quarter note between 60 ms and 60 s).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    /// Default tempo used when the player is constructed
    pub const DEFAULT_BPM: f64 = 80.0;
    pub const MIN_BPM: f64 = 1.0;
    pub const MAX_BPM: f64 = 1000.0;

    /// Creates a new tempo
    /// Rejects NaN and anything outside `MIN_BPM..=MAX_BPM`
    pub fn new(bpm: f64) -> Result<Self, InvalidTempo> {
        if (Self::MIN_BPM..=Self::MAX_BPM).contains(&bpm) {
            Ok(Self { bpm })
        } else {
            Err(InvalidTempo(bpm))
        }
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Duration of one quarter note in milliseconds (`60000 / bpm`)
    pub fn quarter_note_ms(&self) -> f64 {
        60_000.0 / self.bpm
    }

    /// Duration of one measure (four quarter notes) in milliseconds
    pub fn measure_ms(&self) -> f64 {
        self.quarter_note_ms() * BEATS_PER_MEASURE
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self {
            bpm: Self::DEFAULT_BPM,
        }
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}
