// Audio timing - The sample clock shared between the audio callback and the player

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared audio clock: counts frames rendered by the audio callback
#[derive(Clone, Debug)]
pub struct AudioTiming {
    /// Current sample position (incremented by audio callback)
    sample_position: Arc<AtomicU64>,
    /// Sample rate (for timestamp conversions)
    sample_rate: f64,
}

impl AudioTiming {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_position: Arc::new(AtomicU64::new(0)),
            sample_rate: sample_rate as f64,
        }
    }

    /// Get current sample position
    pub fn current_sample(&self) -> u64 {
        self.sample_position.load(Ordering::Relaxed)
    }

    /// Advance sample position (called from audio callback)
    pub fn advance(&self, frames: usize) {
        self.sample_position
            .fetch_add(frames as u64, Ordering::Relaxed);
    }

    /// Current position in seconds
    pub fn seconds(&self) -> f64 {
        self.samples_to_seconds(self.current_sample())
    }

    pub fn samples_to_seconds(&self, samples: u64) -> f64 {
        samples as f64 / self.sample_rate
    }

    /// Get sample rate
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate as f32
    }
}
