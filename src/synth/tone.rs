// Tone - A single short square-wave burst placed on the output clock
//
// Start/stop times are absolute seconds on the audio engine's sample clock and
// are handed to the renderer ahead of time; nothing in the player touches the
// tone again once it is scheduled.

/// Parameters shared by every pattern tone
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct ToneSettings {
    /// Pitch in Hz (middle C)
    pub frequency: f32,
    /// Gain held between the ramps
    pub gain: f32,
    /// Fraction of the requested duration that actually sounds
    pub length_ratio: f64,
    /// Length of the fade-in and fade-out ramps in milliseconds
    pub ramp_ms: f64,
}

impl Default for ToneSettings {
    fn default() -> Self {
        Self {
            frequency: 261.6256,
            gain: 0.1,
            length_ratio: 0.8,
            ramp_ms: 10.0,
        }
    }
}

/// A tone ready to be rendered
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledTone {
    /// Start time in seconds on the output clock
    pub start: f64,
    /// Stop time in seconds on the output clock
    pub stop: f64,
    /// Ramp length in seconds, at most half the sounded duration
    pub ramp: f64,
    pub frequency: f32,
    pub gain: f32,
}

impl ScheduledTone {
    /// Place a note `offset_ms` after `clock_now` (seconds).
    ///
    /// Only `length_ratio` of `duration_ms` sounds. Ramps longer than half the
    /// sounded duration are shortened so fade-in and fade-out meet in the
    /// middle instead of overlapping.
    pub fn new(clock_now: f64, offset_ms: f64, duration_ms: f64, settings: &ToneSettings) -> Self {
        let start = clock_now + offset_ms / 1000.0;
        let effective = (duration_ms / 1000.0 * settings.length_ratio).max(0.0);
        let ramp = (settings.ramp_ms / 1000.0).clamp(0.0, effective / 2.0);

        Self {
            start,
            stop: start + effective,
            ramp,
            frequency: settings.frequency,
            gain: settings.gain,
        }
    }

    /// Sounded duration in seconds
    pub fn effective_duration(&self) -> f64 {
        self.stop - self.start
    }

    /// Envelope gain at `time` (seconds on the output clock)
    pub fn gain_at(&self, time: f64) -> f32 {
        if time < self.start || time >= self.stop {
            return 0.0;
        }
        if self.ramp <= 0.0 {
            return self.gain;
        }

        let since_start = time - self.start;
        let until_stop = self.stop - time;

        if since_start < self.ramp {
            self.gain * (since_start / self.ramp) as f32
        } else if until_stop < self.ramp {
            self.gain * (until_stop / self.ramp) as f32
        } else {
            self.gain
        }
    }

    /// First sample index at or after `start`
    pub fn start_sample(&self, sample_rate: f64) -> u64 {
        (self.start * sample_rate).ceil().max(0.0) as u64
    }

    /// First sample index at or after `stop`
    pub fn stop_sample(&self, sample_rate: f64) -> u64 {
        (self.stop * sample_rate).ceil().max(0.0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_timing_from_offset() {
        let settings = ToneSettings::default();
        let tone = ScheduledTone::new(2.0, 375.0, 187.5, &settings);

        assert!((tone.start - 2.375).abs() < EPSILON);
        assert!((tone.effective_duration() - 0.15).abs() < EPSILON);
        assert!((tone.stop - 2.525).abs() < EPSILON);
        assert_eq!(tone.frequency, 261.6256);
        assert_eq!(tone.gain, 0.1);
    }

    #[test]
    fn test_effective_duration_is_80_percent() {
        let settings = ToneSettings::default();
        for duration_ms in [5.0, 20.0, 187.5, 375.0, 750.0, 1000.0] {
            let tone = ScheduledTone::new(0.0, 0.0, duration_ms, &settings);
            let expected = duration_ms / 1000.0 * 0.8;
            assert!((tone.effective_duration() - expected).abs() < EPSILON);
        }
    }

    #[test]
    fn test_envelope_shape() {
        let settings = ToneSettings::default();
        let tone = ScheduledTone::new(0.0, 0.0, 500.0, &settings); // sounds 0.4s

        assert_eq!(tone.gain_at(-0.001), 0.0);
        assert_eq!(tone.gain_at(0.0), 0.0);
        assert!((tone.gain_at(0.005) - 0.05).abs() < 1e-6);
        assert_eq!(tone.gain_at(0.01), 0.1);
        assert_eq!(tone.gain_at(0.2), 0.1);
        assert!((tone.gain_at(0.395) - 0.05).abs() < 1e-6);
        assert!(tone.gain_at(0.4) < 1e-6);
        assert_eq!(tone.gain_at(0.41), 0.0);
    }

    #[test]
    fn test_short_tone_ramps_are_clamped() {
        let settings = ToneSettings::default();
        // 10ms requested -> 8ms sounded -> 4ms ramps
        let tone = ScheduledTone::new(0.0, 0.0, 10.0, &settings);

        assert!((tone.ramp - 0.004).abs() < EPSILON);
        assert!(2.0 * tone.ramp <= tone.effective_duration() + EPSILON);

        // peak in the middle, never above the held gain
        let peak = tone.gain_at(0.004);
        assert!(peak <= 0.1 + 1e-6);
        assert!(peak > 0.09);
        for i in 0..80 {
            let g = tone.gain_at(i as f64 * 0.0001);
            assert!((0.0..=0.1 + 1e-6).contains(&g), "gain {} at step {}", g, i);
        }
    }

    #[test]
    fn test_zero_ramp_is_flat() {
        let settings = ToneSettings {
            ramp_ms: 0.0,
            ..ToneSettings::default()
        };
        let tone = ScheduledTone::new(0.0, 0.0, 100.0, &settings);
        assert_eq!(tone.gain_at(0.0), 0.1);
        assert_eq!(tone.gain_at(0.079), 0.1);
    }

    #[test]
    fn test_sample_bounds() {
        let settings = ToneSettings {
            length_ratio: 0.5,
            ..ToneSettings::default()
        };
        let tone = ScheduledTone::new(1.0, 0.0, 500.0, &settings); // 1.0s .. 1.25s
        assert_eq!(tone.start_sample(48000.0), 48000);
        assert_eq!(tone.stop_sample(48000.0), 60000);
    }
}
