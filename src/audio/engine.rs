// Audio engine - Real-time CPAL callback
//
// # Format Support
//
// The device's preferred sample format is picked up from
// `default_output_config()`:
// - **F32**: native, no conversion
// - **I16**: common on Windows/WASAPI
// - **U16**: rare
//
// Everything is mixed in f32 and converted while writing the output buffer.
//
// # Stream Limitations
//
// On macOS (CoreAudio) the Stream is not Send, so the engine stays on the
// thread that created it. The error callback only flags the device status;
// there is no reconnection.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use log::{error, info};
use ringbuf::traits::{Consumer, Producer};

use crate::audio::format_conversion::write_mono_to_interleaved_frame;
use crate::audio::output::{AudioError, AudioOutput};
use crate::audio::renderer::Renderer;
use crate::audio::timing::AudioTiming;
use crate::config::PlayerConfig;
use crate::connection::status::{AtomicDeviceStatus, DeviceStatus};
use crate::messaging::channels::{
    AudioCommandConsumer, AudioCommandProducer, create_audio_command_channel,
};
use crate::messaging::command::AudioCommand;
use crate::sequencer::metronome::{ClickPlayback, ClickSound};
use crate::synth::tone::ScheduledTone;

pub struct AudioEngine {
    _device: Device,
    _stream: Stream,
    timing: AudioTiming,
    status: AtomicDeviceStatus,
    commands: AudioCommandProducer,
}

impl AudioEngine {
    pub fn new(config: &PlayerConfig) -> Result<Self, AudioError> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or(AudioError::NoDevice)?;

        info!(
            "Audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let supported_config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceConfig(e.to_string()))?;

        let sample_format = supported_config.sample_format();
        info!("Audio config: {:?}", supported_config);

        let sample_rate = supported_config.sample_rate().0 as f32;
        let channels = supported_config.channels() as usize;
        let stream_config: StreamConfig = supported_config.into();

        let click = ClickSound::load_or_synthesize(config.click_sample.as_deref(), sample_rate);
        let renderer = Renderer::new(
            sample_rate,
            ClickPlayback::new(click, config.click_volume),
            config.master_volume,
        );

        let timing = AudioTiming::new(sample_rate);
        let status = AtomicDeviceStatus::new(DeviceStatus::Connecting);
        let (commands, command_rx) = create_audio_command_channel(config.audio_queue_capacity);

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(
                &device,
                &stream_config,
                channels,
                renderer,
                command_rx,
                timing.clone(),
                status.clone(),
            )?,
            SampleFormat::I16 => Self::build_stream::<i16>(
                &device,
                &stream_config,
                channels,
                renderer,
                command_rx,
                timing.clone(),
                status.clone(),
            )?,
            SampleFormat::U16 => Self::build_stream::<u16>(
                &device,
                &stream_config,
                channels,
                renderer,
                command_rx,
                timing.clone(),
                status.clone(),
            )?,
            other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
        };

        stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))?;

        status.set(DeviceStatus::Connected);

        info!("Audio engine started: {} Hz, {} channels", timing.sample_rate(), channels);

        Ok(Self {
            _device: device,
            _stream: stream,
            timing,
            status,
            commands,
        })
    }

    /// Build an output stream for any sample type (f32, i16, u16).
    /// The callback mixes in f32 and converts while writing.
    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        channels: usize,
        mut renderer: Renderer,
        mut command_rx: AudioCommandConsumer,
        timing: AudioTiming,
        status: AtomicDeviceStatus,
    ) -> Result<Stream, AudioError>
    where
        T: SizedSample + FromSample<f32> + Send + 'static,
    {
        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    // ========== SACRED ZONE ==========
                    // No allocations, No I/O, No blocking locks

                    while let Some(command) = command_rx.try_pop() {
                        renderer.handle_command(command);
                    }

                    let first_sample = timing.current_sample();
                    let mut frames = 0;

                    for frame in data.chunks_mut(channels) {
                        let sample = renderer.process_frame(first_sample + frames as u64);
                        write_mono_to_interleaved_frame(sample, frame);
                        frames += 1;
                    }

                    renderer.retire_finished(first_sample + frames as u64);
                    timing.advance(frames);
                    // ========== SACRED ZONE END ==========
                },
                move |err| {
                    // Runs outside the audio callback, I/O is fine here
                    error!("Audio stream error: {}", err);
                    status.set(DeviceStatus::Error);
                },
                None,
            )
            .map_err(|e| AudioError::StreamBuild(e.to_string()))
    }

    fn send(&mut self, command: AudioCommand) -> Result<(), AudioError> {
        self.commands
            .try_push(command)
            .map_err(|_| AudioError::QueueFull)
    }
}

impl AudioOutput for AudioEngine {
    fn current_time(&self) -> f64 {
        self.timing.seconds()
    }

    fn schedule_tone(&mut self, tone: ScheduledTone) -> Result<(), AudioError> {
        self.send(AudioCommand::ScheduleTone(tone))
    }

    fn trigger_click(&mut self) -> Result<(), AudioError> {
        if self.status.get() == DeviceStatus::Error {
            return Err(AudioError::StreamFailed);
        }
        self.send(AudioCommand::TriggerClick)
    }

    fn stop_click(&mut self) -> Result<(), AudioError> {
        self.send(AudioCommand::StopClick)
    }
}
