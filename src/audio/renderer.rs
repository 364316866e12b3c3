// Renderer - Audio-thread mix of scheduled tones and the metronome click
//
// Runs inside the audio callback: no allocation, no locks, no I/O. Voices are
// pre-allocated and tones arriving while all voices are busy are dropped.

use crate::audio::dsp_utils::{flush_denormals_to_zero, hard_clip};
use crate::messaging::command::AudioCommand;
use crate::sequencer::metronome::ClickPlayback;
use crate::synth::oscillator::{Oscillator, SimpleOscillator, WaveformType};
use crate::synth::tone::ScheduledTone;

/// Maximum number of tones pending or sounding at once
pub const MAX_VOICES: usize = 64;

/// One scheduled tone with its own oscillator
#[derive(Debug, Clone)]
struct ToneVoice {
    tone: ScheduledTone,
    oscillator: SimpleOscillator,
    start_sample: u64,
    stop_sample: u64,
}

#[derive(Debug, Clone)]
pub struct Renderer {
    sample_rate: f64,
    voices: Vec<ToneVoice>,
    click: ClickPlayback,
    master_volume: f32,
    dropped_tones: u64,
}

impl Renderer {
    pub fn new(sample_rate: f32, click: ClickPlayback, master_volume: f32) -> Self {
        Self {
            sample_rate: sample_rate as f64,
            voices: Vec::with_capacity(MAX_VOICES),
            click,
            master_volume: master_volume.clamp(0.0, 1.0),
            dropped_tones: 0,
        }
    }

    pub fn handle_command(&mut self, command: AudioCommand) {
        match command {
            AudioCommand::ScheduleTone(tone) => self.schedule_tone(tone),
            AudioCommand::TriggerClick => self.click.trigger(),
            AudioCommand::StopClick => self.click.stop(),
        }
    }

    fn schedule_tone(&mut self, tone: ScheduledTone) {
        if self.voices.len() >= MAX_VOICES {
            self.dropped_tones += 1;
            return;
        }

        let sample_rate = self.sample_rate as f32;
        self.voices.push(ToneVoice {
            tone,
            oscillator: SimpleOscillator::with_frequency(
                WaveformType::Square,
                tone.frequency,
                sample_rate,
            ),
            start_sample: tone.start_sample(self.sample_rate),
            stop_sample: tone.stop_sample(self.sample_rate),
        });
    }

    /// Mix for the frame at absolute sample index `sample_index`
    #[inline]
    pub fn process_frame(&mut self, sample_index: u64) -> f32 {
        let time = sample_index as f64 / self.sample_rate;
        let mut mix = self.click.process_sample();

        for voice in self.voices.iter_mut() {
            if sample_index >= voice.start_sample && sample_index < voice.stop_sample {
                mix += voice.oscillator.next_sample() * voice.tone.gain_at(time);
            }
        }

        hard_clip(flush_denormals_to_zero(mix * self.master_volume))
    }

    /// Drop voices that finished before `sample_index`
    pub fn retire_finished(&mut self, sample_index: u64) {
        self.voices.retain(|voice| voice.stop_sample > sample_index);
    }

    /// Render consecutive frames starting at `first_sample`
    pub fn render(&mut self, output: &mut [f32], first_sample: u64) {
        for (i, sample) in output.iter_mut().enumerate() {
            *sample = self.process_frame(first_sample + i as u64);
        }
        self.retire_finished(first_sample + output.len() as u64);
    }

    /// Tones pending or sounding
    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Tones dropped because every voice was busy
    pub fn dropped_tones(&self) -> u64 {
        self.dropped_tones
    }
}
