// Rhythm player - Metronome, pattern playback and the measure loop
//
// The player is driven from a single thread: host commands and due timers are
// handled one at a time, each running to completion. Tones are handed to the
// audio output with absolute times on its own clock, so timer jitter only moves
// whole patterns, never the notes inside them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use log::{debug, error, info};

use crate::audio::output::AudioOutput;
use crate::messaging::channels::CommandReceiver;
use crate::messaging::command::Command;
use crate::sequencer::metronome::MetronomeLoop;
use crate::sequencer::pattern::{pattern_durations, schedule_tones, total_duration};
use crate::sequencer::scheduler::{CancellationToken, DueTask, TimerQueue};
use crate::sequencer::timeline::Tempo;
use crate::synth::tone::{ScheduledTone, ToneSettings};

/// Deferred work owned by the player's timer queue
#[derive(Debug, Clone)]
pub enum PlayerTask {
    /// One metronome click
    MetronomeTick,
    /// Play one pattern of a running sequence
    PlayPattern {
        name: String,
        token: CancellationToken,
    },
    /// Schedule the patterns of the next measure
    MeasurePass {
        sequence: Arc<[String]>,
        token: CancellationToken,
    },
}

/// The rhythm player.
///
/// Owns the audio output, the tempo and every pending timer. Nothing here is
/// global: whoever hosts the command handlers owns the player.
pub struct RhythmPlayer<O: AudioOutput> {
    output: O,
    tempo: Tempo,
    tone: ToneSettings,
    timers: TimerQueue<PlayerTask>,
    metronome: MetronomeLoop,
    /// Token of the running sequence, `None` when stopped
    rhythm: Option<CancellationToken>,
}

impl<O: AudioOutput> RhythmPlayer<O> {
    pub fn new(output: O, tempo: Tempo, tone: ToneSettings) -> Self {
        Self {
            output,
            tempo,
            tone,
            timers: TimerQueue::new(),
            metronome: MetronomeLoop::new(),
            rhythm: None,
        }
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    /// Replace the tempo. Running loops keep their current interval.
    pub fn set_tempo(&mut self, tempo: Tempo) {
        self.tempo = tempo;
    }

    /// Whether a sequence is looping
    pub fn is_playing(&self) -> bool {
        self.rhythm.is_some()
    }

    pub fn is_metronome_running(&self) -> bool {
        self.metronome.is_running()
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    /// Number of pending timers (clicks, patterns, measure passes)
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Deadline of the next pending timer in milliseconds
    pub fn next_deadline(&mut self) -> Option<f64> {
        self.timers.next_due()
    }

    /// Apply one host command. Never fails: problems are logged.
    pub fn handle(&mut self, command: Command, now_ms: f64) {
        info!("Received command: {}", command);
        match command {
            Command::StartRhythm(sequence) => self.start_rhythm(sequence, now_ms),
            Command::StopRhythm => self.stop_rhythm(),
            Command::StartMetronome(tempo) => {
                self.set_tempo(tempo);
                self.start_metronome(now_ms);
            }
            Command::StopMetronome => self.stop_metronome(),
            Command::AdjustMetronome(tempo) => self.adjust_metronome(tempo, now_ms),
        }
    }

    pub fn start_metronome(&mut self, now_ms: f64) {
        self.metronome
            .start(now_ms, &self.tempo, &mut self.timers, &mut self.output);
    }

    pub fn stop_metronome(&mut self) {
        self.metronome.stop(&mut self.timers, &mut self.output);
    }

    /// Live tempo change. Does nothing, tempo included, while the metronome is stopped.
    pub fn adjust_metronome(&mut self, tempo: Tempo, now_ms: f64) {
        if !self.metronome.is_running() {
            debug!("Metronome not running, ignoring tempo change to {}", tempo);
            return;
        }
        self.set_tempo(tempo);
        self.start_metronome(now_ms);
    }

    /// Start the metronome and loop `sequence` once per measure until stopped.
    /// A sequence that is already running is cancelled first.
    pub fn start_rhythm(&mut self, sequence: Vec<String>, now_ms: f64) {
        if let Some(previous) = self.rhythm.take() {
            previous.cancel();
        }

        self.start_metronome(now_ms);

        let token = CancellationToken::new();
        self.rhythm = Some(token.clone());
        info!("Starting rhythm with {} pattern(s) at {}", sequence.len(), self.tempo);

        self.measure_pass(sequence.into(), token, now_ms);
    }

    /// Stop the sequence and the metronome.
    /// Patterns already queued still come due but play nothing.
    pub fn stop_rhythm(&mut self) {
        info!("Stopping rhythm");
        if let Some(token) = self.rhythm.take() {
            token.cancel();
        }
        self.stop_metronome();
    }

    /// Schedule every tone of one pattern relative to the output clock's "now".
    /// Unknown names schedule nothing.
    pub fn play_pattern(&mut self, name: &str) {
        let durations = pattern_durations(name, &self.tempo);
        if durations.is_empty() {
            debug!("Unknown pattern {:?}, nothing to play", name);
            return;
        }

        let clock_now = self.output.current_time();
        debug!("Starting pattern {:?} at output time {:.3}s", name, clock_now);

        for event in schedule_tones(&durations) {
            let tone = ScheduledTone::new(clock_now, event.offset_ms, event.duration_ms, &self.tone);
            debug!(
                "Note: start {:.3}s, duration {:.3}s, stop {:.3}s",
                tone.start,
                tone.effective_duration(),
                tone.stop
            );
            if let Err(e) = self.output.schedule_tone(tone) {
                error!("Failed to schedule note of {:?}: {}", name, e);
            }
        }
    }

    /// Fire every timer due at `now_ms`. Returns how many fired.
    pub fn run_due(&mut self, now_ms: f64) -> usize {
        let mut fired = 0;
        while let Some(due) = self.timers.pop_due(now_ms) {
            self.run_task(due, now_ms);
            fired += 1;
        }
        fired
    }

    fn run_task(&mut self, due: DueTask<PlayerTask>, now_ms: f64) {
        match due.task {
            PlayerTask::MetronomeTick => self.metronome.tick(&mut self.output),
            PlayerTask::PlayPattern { name, token } => {
                if token.is_cancelled() {
                    return;
                }
                debug!("Playing rhythm for pattern {:?}", name);
                self.play_pattern(&name);
            }
            PlayerTask::MeasurePass { sequence, token } => {
                if token.is_cancelled() {
                    return;
                }
                // whole measures missed during a stall are skipped
                let measure = self.tempo.measure_ms();
                let late_ms = now_ms - due.due_ms;
                let start_ms = if late_ms >= measure {
                    due.due_ms + (late_ms / measure).floor() * measure
                } else {
                    due.due_ms
                };
                self.measure_pass(sequence, token, start_ms);
            }
        }
    }

    /// Queue each pattern back to back from `start_ms`, then the next pass one
    /// measure later. Patterns that don't fill the measure exactly drift against
    /// the measure boundary; that is left as is.
    fn measure_pass(&mut self, sequence: Arc<[String]>, token: CancellationToken, start_ms: f64) {
        let mut delay = 0.0;
        for name in sequence.iter() {
            self.timers.schedule_once(
                start_ms + delay,
                PlayerTask::PlayPattern {
                    name: name.clone(),
                    token: token.clone(),
                },
            );
            delay += total_duration(name, &self.tempo);
        }

        let measure = self.tempo.measure_ms();
        self.timers
            .schedule_once(start_ms + measure, PlayerTask::MeasurePass { sequence, token });
    }

    /// Event loop: wait for host commands, firing timers as they come due.
    /// Returns once every command sender is gone, after stopping playback.
    pub fn run(&mut self, commands: &CommandReceiver) {
        let epoch = Instant::now();
        let now_ms = || epoch.elapsed().as_secs_f64() * 1000.0;

        loop {
            self.run_due(now_ms());

            let received = match self.next_deadline() {
                Some(deadline) => commands.recv_timeout(wait_duration(deadline, now_ms())),
                None => commands.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(command) => self.handle(command, now_ms()),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Host disconnected, shutting down");
                    self.stop_rhythm();
                    break;
                }
            }
        }
    }
}

/// Time left until `deadline_ms`; zero when overdue, `Duration::MAX` when
/// too far away to represent
fn wait_duration(deadline_ms: f64, now_ms: f64) -> Duration {
    let wait_secs = (deadline_ms - now_ms).max(0.0) / 1000.0;
    Duration::try_from_secs_f64(wait_secs).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::output::AudioError;

    #[derive(Default)]
    struct RecordingOutput {
        time: f64,
        tones: Vec<ScheduledTone>,
        clicks: usize,
        stops: usize,
        fail_clicks: bool,
    }

    impl AudioOutput for RecordingOutput {
        fn current_time(&self) -> f64 {
            self.time
        }

        fn schedule_tone(&mut self, tone: ScheduledTone) -> Result<(), AudioError> {
            self.tones.push(tone);
            Ok(())
        }

        fn trigger_click(&mut self) -> Result<(), AudioError> {
            self.clicks += 1;
            if self.fail_clicks {
                Err(AudioError::StreamFailed)
            } else {
                Ok(())
            }
        }

        fn stop_click(&mut self) -> Result<(), AudioError> {
            self.stops += 1;
            Ok(())
        }
    }

    fn player() -> RhythmPlayer<RecordingOutput> {
        RhythmPlayer::new(
            RecordingOutput::default(),
            Tempo::default(),
            ToneSettings::default(),
        )
    }

    fn bpm(value: f64) -> Tempo {
        Tempo::new(value).unwrap()
    }

    #[test]
    fn test_metronome_clicks_every_quarter_note() {
        let mut player = player();
        player.handle(Command::StartMetronome(bpm(80.0)), 0.0);

        // immediate click
        assert_eq!(player.output().clicks, 1);

        player.run_due(749.0);
        assert_eq!(player.output().clicks, 1);

        player.run_due(750.0);
        assert_eq!(player.output().clicks, 2);

        for k in 2..=4 {
            player.run_due(750.0 * k as f64);
        }
        assert_eq!(player.output().clicks, 5);
    }

    #[test]
    fn test_stalled_loop_clicks_once() {
        let mut player = player();
        player.start_metronome(0.0);

        // nothing ran between 0 and 3100 ms
        player.run_due(3100.0);
        assert_eq!(player.output().clicks, 2);
        assert_eq!(player.next_deadline(), Some(3750.0));
    }

    #[test]
    fn test_start_metronome_twice_keeps_one_timer() {
        let mut player = player();
        player.handle(Command::StartMetronome(bpm(120.0)), 0.0);
        player.handle(Command::StartMetronome(bpm(120.0)), 100.0);

        assert_eq!(player.pending_timers(), 1);
        assert_eq!(player.output().clicks, 2);

        // one click per interval from the second start
        player.run_due(600.0);
        assert_eq!(player.output().clicks, 3);
        player.run_due(1100.0);
        assert_eq!(player.output().clicks, 4);
    }

    #[test]
    fn test_stop_metronome() {
        let mut player = player();
        player.start_metronome(0.0);
        player.stop_metronome();

        assert!(!player.is_metronome_running());
        assert_eq!(player.pending_timers(), 0);
        assert_eq!(player.output().stops, 1);

        player.run_due(10_000.0);
        assert_eq!(player.output().clicks, 1);
    }

    #[test]
    fn test_adjust_while_stopped_is_noop() {
        let mut player = player();
        player.handle(Command::AdjustMetronome(bpm(140.0)), 0.0);

        assert!(!player.is_metronome_running());
        assert_eq!(player.pending_timers(), 0);
        assert_eq!(player.output().clicks, 0);
        assert_eq!(player.tempo().bpm(), 80.0);
    }

    #[test]
    fn test_adjust_after_stop_is_noop() {
        let mut player = player();
        player.handle(Command::StartMetronome(bpm(100.0)), 0.0);
        player.handle(Command::StopMetronome, 10.0);
        player.handle(Command::AdjustMetronome(bpm(140.0)), 20.0);

        assert!(!player.is_metronome_running());
        assert_eq!(player.pending_timers(), 0);
        assert_eq!(player.tempo().bpm(), 100.0);
    }

    #[test]
    fn test_adjust_while_running_restarts_at_new_tempo() {
        let mut player = player();
        player.handle(Command::StartMetronome(bpm(60.0)), 0.0);
        player.handle(Command::AdjustMetronome(bpm(120.0)), 200.0);

        assert_eq!(player.tempo().bpm(), 120.0);
        assert_eq!(player.pending_timers(), 1);
        assert_eq!(player.next_deadline(), Some(700.0));
    }

    #[test]
    fn test_click_failures_do_not_stop_the_loop() {
        let mut player = player();
        player.output_mut().fail_clicks = true;
        player.start_metronome(0.0);

        for k in 1..=4 {
            player.run_due(750.0 * k as f64);
        }
        assert_eq!(player.output().clicks, 5);
        assert!(player.is_metronome_running());
    }

    #[test]
    fn test_play_pattern_schedules_relative_to_output_clock() {
        let mut player = player();
        player.output_mut().time = 10.0;
        player.play_pattern("8e rust - 16e noot - 16e noot");

        let tones = &player.output().tones;
        assert_eq!(tones.len(), 2);
        assert!((tones[0].start - 10.375).abs() < 1e-9);
        assert!((tones[1].start - 10.5625).abs() < 1e-9);
        for tone in tones {
            assert!((tone.effective_duration() - 0.15).abs() < 1e-9);
        }
    }

    #[test]
    fn test_unknown_pattern_plays_nothing() {
        let mut player = player();
        player.play_pattern("bestaat niet");
        assert!(player.output().tones.is_empty());
    }

    #[test]
    fn test_sequence_patterns_are_back_to_back() {
        let mut player = player();
        player.handle(
            Command::StartRhythm(vec!["kwart".into(), "8e noot - 8e noot".into()]),
            0.0,
        );
        assert!(player.is_playing());
        assert!(player.is_metronome_running());

        player.run_due(0.0);
        assert_eq!(player.output().tones.len(), 1);

        player.run_due(749.0);
        assert_eq!(player.output().tones.len(), 1);

        player.run_due(750.0);
        assert_eq!(player.output().tones.len(), 3);
    }

    #[test]
    fn test_sequence_loops_every_measure() {
        let mut player = player();
        player.start_rhythm(vec!["kwart".into()], 0.0);

        player.run_due(0.0);
        assert_eq!(player.output().tones.len(), 1);

        player.run_due(2999.0);
        assert_eq!(player.output().tones.len(), 1);

        player.run_due(3000.0);
        assert_eq!(player.output().tones.len(), 2);

        player.run_due(6000.0);
        player.run_due(9000.0);
        assert_eq!(player.output().tones.len(), 4);
    }

    #[test]
    fn test_stalled_sequence_skips_missed_measures() {
        let mut player = player();
        player.start_rhythm(vec!["kwart".into()], 0.0);
        player.run_due(0.0);

        // the 3000 ms pass only runs at 9500 ms: it restarts on the 9000 ms boundary
        player.output_mut().time = 9.5;
        player.run_due(9500.0);
        assert_eq!(player.output().tones.len(), 2);

        player.run_due(11_999.0);
        assert_eq!(player.output().tones.len(), 2);
        player.run_due(12_000.0);
        assert_eq!(player.output().tones.len(), 3);
    }

    #[test]
    fn test_wait_duration() {
        assert_eq!(wait_duration(1500.0, 1000.0), Duration::from_millis(500));
        assert_eq!(wait_duration(900.0, 1000.0), Duration::ZERO);
        assert_eq!(wait_duration(6e304, 0.0), Duration::MAX);
        assert_eq!(wait_duration(f64::NAN, 0.0), Duration::ZERO);
    }

    #[test]
    fn test_stop_rhythm_silences_queued_patterns() {
        let mut player = player();
        player.start_rhythm(
            vec!["kwart".into(), "kwart".into(), "kwart".into()],
            0.0,
        );
        player.run_due(0.0);
        assert_eq!(player.output().tones.len(), 1);

        player.handle(Command::StopRhythm, 100.0);
        assert!(!player.is_playing());
        assert!(!player.is_metronome_running());

        // the queued patterns and the next measure still come due, silently
        let fired = player.run_due(20_000.0);
        assert!(fired > 0);
        assert_eq!(player.output().tones.len(), 1);
        assert_eq!(player.pending_timers(), 0);
    }

    #[test]
    fn test_restart_rhythm_cancels_previous_run() {
        let mut player = player();
        player.start_rhythm(vec!["kwart".into()], 0.0);
        player.start_rhythm(vec!["8e noot - 8e noot".into()], 0.0);

        player.run_due(0.0);
        // only the second sequence plays
        assert_eq!(player.output().tones.len(), 2);

        player.run_due(3000.0);
        assert_eq!(player.output().tones.len(), 4);
    }

    #[test]
    fn test_run_survives_out_of_range_tempo() {
        let (tx, rx) = crossbeam_channel::unbounded();
        for bpm in ["1e-300", "1e20"] {
            let line = format!(r#"{{"type": "start-metronome", "payload": {{"bpm": {}}}}}"#, bpm);
            if let Ok(command) = Command::from_json(&line) {
                tx.send(command).unwrap();
            }
        }
        tx.send(Command::StartMetronome(bpm(1.0))).unwrap();
        drop(tx);

        let mut player = player();
        player.run(&rx);

        assert_eq!(player.tempo().bpm(), 1.0);
        assert_eq!(player.output().clicks, 1);
        assert_eq!(player.output().stops, 1);
    }

    #[test]
    fn test_run_stops_when_host_disconnects() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(Command::StartMetronome(bpm(120.0))).unwrap();
        drop(tx);

        let mut player = player();
        player.run(&rx);

        assert!(!player.is_metronome_running());
        assert!(player.output().clicks >= 1);
        assert_eq!(player.output().stops, 1);
    }
}
