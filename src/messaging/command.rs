// Command types - Host → player and player → audio thread
//
// Host messages arrive as JSON objects `{"type": "...", "payload": ...}`.

use std::fmt;

use serde::Deserialize;

use crate::sequencer::timeline::{InvalidTempo, Tempo};
use crate::synth::tone::ScheduledTone;

/// Inbound host command. One-way: the host never gets a response.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Loop these pattern names once per measure
    StartRhythm(Vec<String>),
    StopRhythm,
    StartMetronome(Tempo),
    StopMetronome,
    /// Live tempo change, ignored while the metronome is stopped
    AdjustMetronome(Tempo),
}

/// Host message that could not be turned into a command
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Malformed host message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown command type: {0:?}")]
    UnknownCommand(String),

    #[error("Invalid payload for {command}: {source}")]
    InvalidPayload {
        command: &'static str,
        source: serde_json::Error,
    },

    #[error(transparent)]
    InvalidBpm(#[from] InvalidTempo),
}

#[derive(Deserialize)]
struct HostMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Deserialize)]
struct BpmPayload {
    bpm: f64,
}

impl Command {
    pub const START_RHYTHM: &'static str = "start-rhythm";
    pub const STOP_RHYTHM: &'static str = "stop-rhythm";
    pub const START_METRONOME: &'static str = "start-metronome";
    pub const STOP_METRONOME: &'static str = "stop-metronome";
    pub const ADJUST_METRONOME: &'static str = "adjust-metronome";

    /// Decode one JSON host message
    pub fn from_json(text: &str) -> Result<Self, CommandError> {
        let message: HostMessage = serde_json::from_str(text)?;

        match message.kind.as_str() {
            Self::START_RHYTHM => {
                let sequence = serde_json::from_value(message.payload).map_err(|source| {
                    CommandError::InvalidPayload {
                        command: Self::START_RHYTHM,
                        source,
                    }
                })?;
                Ok(Command::StartRhythm(sequence))
            }
            Self::STOP_RHYTHM => Ok(Command::StopRhythm),
            Self::START_METRONOME => Ok(Command::StartMetronome(Self::tempo_payload(
                Self::START_METRONOME,
                message.payload,
            )?)),
            Self::STOP_METRONOME => Ok(Command::StopMetronome),
            Self::ADJUST_METRONOME => Ok(Command::AdjustMetronome(Self::tempo_payload(
                Self::ADJUST_METRONOME,
                message.payload,
            )?)),
            _ => Err(CommandError::UnknownCommand(message.kind)),
        }
    }

    fn tempo_payload(command: &'static str, payload: serde_json::Value) -> Result<Tempo, CommandError> {
        let BpmPayload { bpm } = serde_json::from_value(payload)
            .map_err(|source| CommandError::InvalidPayload { command, source })?;
        Ok(Tempo::new(bpm)?)
    }

    /// Wire name of the command
    pub fn name(&self) -> &'static str {
        match self {
            Command::StartRhythm(_) => Self::START_RHYTHM,
            Command::StopRhythm => Self::STOP_RHYTHM,
            Command::StartMetronome(_) => Self::START_METRONOME,
            Command::StopMetronome => Self::STOP_METRONOME,
            Command::AdjustMetronome(_) => Self::ADJUST_METRONOME,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::StartRhythm(sequence) => write!(f, "{} {:?}", self.name(), sequence),
            Command::StartMetronome(tempo) | Command::AdjustMetronome(tempo) => {
                write!(f, "{} ({})", self.name(), tempo)
            }
            Command::StopRhythm | Command::StopMetronome => f.write_str(self.name()),
        }
    }
}

/// Player → audio thread
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioCommand {
    ScheduleTone(ScheduledTone),
    TriggerClick,
    StopClick,
}
