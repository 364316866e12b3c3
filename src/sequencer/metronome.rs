// Metronome - Click sound, click playback and the timer-driven click loop
//
// The loop lives on the player side and asks the output to trigger the click
// once per quarter note. Playback of the click itself happens on the audio
// thread through `ClickPlayback`.

use std::path::Path;

use log::{error, info, warn};

use crate::audio::output::AudioOutput;
use crate::sequencer::player::PlayerTask;
use crate::sequencer::scheduler::{TimerId, TimerQueue};
use crate::sequencer::timeline::Tempo;
use crate::synth::oscillator::{Oscillator, SimpleOscillator, WaveformType};

/// Error loading a click sample from disk
#[derive(Debug, thiserror::Error)]
pub enum ClickSampleError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Click sample is empty")]
    Empty,
}

/// The click sample, mono, at the output sample rate
#[derive(Debug, Clone)]
pub struct ClickSound {
    samples: Vec<f32>,
}

impl ClickSound {
    /// Duration of the synthesized click
    const CLICK_DURATION_MS: f32 = 10.0;
    const CLICK_FREQUENCY: f32 = 1200.0;
    const CLICK_AMPLITUDE: f32 = 0.6;

    pub fn from_samples(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    /// Short sine burst with exponential decay
    pub fn synthesized(sample_rate: f32) -> Self {
        let num_samples = ((Self::CLICK_DURATION_MS / 1000.0) * sample_rate) as usize;
        let mut osc =
            SimpleOscillator::with_frequency(WaveformType::Sine, Self::CLICK_FREQUENCY, sample_rate);

        let samples = (0..num_samples)
            .map(|i| {
                let t = i as f32 / num_samples as f32;
                let envelope = (-t * 8.0).exp();
                osc.next_sample() * envelope * Self::CLICK_AMPLITUDE
            })
            .collect();

        Self { samples }
    }

    /// Load a WAV click. Multi-channel files are averaged down to mono.
    pub fn from_wav(path: &Path) -> Result<(Self, u32), ClickSampleError> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let scale = (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()?
            }
        };

        let samples: Vec<f32> = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        if samples.is_empty() {
            return Err(ClickSampleError::Empty);
        }

        Ok((Self { samples }, spec.sample_rate))
    }

    /// Use the configured WAV if it loads, otherwise fall back to the synthesized click
    pub fn load_or_synthesize(path: Option<&Path>, sample_rate: f32) -> Self {
        let Some(path) = path else {
            return Self::synthesized(sample_rate);
        };

        match Self::from_wav(path) {
            Ok((sound, file_rate)) => {
                if file_rate as f32 != sample_rate {
                    warn!(
                        "Click sample {} is {} Hz, output runs at {} Hz; playing unresampled",
                        path.display(),
                        file_rate,
                        sample_rate
                    );
                }
                info!("Loaded click sample {} ({} samples)", path.display(), sound.len());
                sound
            }
            Err(e) => {
                warn!(
                    "Could not load click sample {}: {}; using synthesized click",
                    path.display(),
                    e
                );
                Self::synthesized(sample_rate)
            }
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Click playback state on the audio thread
#[derive(Debug, Clone)]
pub struct ClickPlayback {
    sound: ClickSound,
    volume: f32,
    position: Option<usize>, // Current position in click buffer
}

impl ClickPlayback {
    pub fn new(sound: ClickSound, volume: f32) -> Self {
        Self {
            sound,
            volume: volume.clamp(0.0, 1.0),
            position: None,
        }
    }

    /// Rewind to the start and play. An unfinished click is cut, never doubled.
    pub fn trigger(&mut self) {
        self.position = Some(0);
    }

    /// Silence and rewind
    pub fn stop(&mut self) {
        self.position = None;
    }

    pub fn is_playing(&self) -> bool {
        self.position.is_some()
    }

    /// Process one sample of click output (0.0 when idle)
    pub fn process_sample(&mut self) -> f32 {
        if let Some(position) = self.position {
            if let Some(&sample) = self.sound.samples().get(position) {
                self.position = Some(position + 1);
                return sample * self.volume;
            }
            self.position = None;
        }

        0.0
    }
}

/// The recurring click.
///
/// Stopped → Running on `start`, Running → Stopped on `stop`. Starting while
/// running cancels the previous timer first, so only one click timer ever exists.
#[derive(Debug, Default)]
pub struct MetronomeLoop {
    timer: Option<TimerId>,
}

impl MetronomeLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Click now, then every quarter note at `tempo`
    pub fn start<O: AudioOutput>(
        &mut self,
        now_ms: f64,
        tempo: &Tempo,
        timers: &mut TimerQueue<PlayerTask>,
        output: &mut O,
    ) {
        let interval = tempo.quarter_note_ms();
        info!("Starting metronome at {} ({:.1} ms per click)", tempo, interval);

        self.tick(output);

        if let Some(previous) = self.timer.take() {
            timers.cancel(previous);
        }
        match timers.schedule_repeating(now_ms + interval, interval, PlayerTask::MetronomeTick) {
            Ok(timer) => self.timer = Some(timer),
            Err(e) => error!("Metronome not started: {}", e),
        }
    }

    /// One click. Failures are reported and the loop keeps going.
    pub fn tick<O: AudioOutput>(&self, output: &mut O) {
        if let Err(e) = output.trigger_click() {
            error!("Metronome playback failed: {}", e);
        }
    }

    pub fn stop<O: AudioOutput>(&mut self, timers: &mut TimerQueue<PlayerTask>, output: &mut O) {
        info!("Stopping metronome");
        if let Some(timer) = self.timer.take() {
            timers.cancel(timer);
        }
        if let Err(e) = output.stop_click() {
            error!("Metronome stop failed: {}", e);
        }
    }
}
