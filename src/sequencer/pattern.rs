// Pattern - Named rhythmic figures and their tone schedule
// A pattern is an ordered list of signed durations: negative = rest, positive = sounded note

use crate::sequencer::timeline::Tempo;
use std::fmt;
use std::str::FromStr;

/// The fixed vocabulary of rhythmic figures understood by the player.
///
/// Durations are stored as signed fractions of a quarter note and turned into
/// milliseconds at the current tempo on every lookup, so a tempo change scales
/// every figure proportionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RhythmPattern {
    /// One quarter note
    Quarter,
    /// Two equal eighth notes
    TwoEighths,
    /// Sixteenth note then dotted eighth
    SixteenthDottedEighth,
    /// Dotted eighth then sixteenth note
    DottedEighthSixteenth,
    /// Eighth rest then two sixteenth notes
    EighthRestTwoSixteenths,
    /// Sixteenth rest, sixteenth note, sixteenth rest, sixteenth note
    AlternatingSixteenths,
    /// Two sixteenth notes framed by sixteenth rests
    FramedSixteenths,
}

impl RhythmPattern {
    /// All recognized patterns
    pub const ALL: [RhythmPattern; 7] = [
        RhythmPattern::Quarter,
        RhythmPattern::TwoEighths,
        RhythmPattern::SixteenthDottedEighth,
        RhythmPattern::DottedEighthSixteenth,
        RhythmPattern::EighthRestTwoSixteenths,
        RhythmPattern::AlternatingSixteenths,
        RhythmPattern::FramedSixteenths,
    ];

    /// Name used on the host message boundary
    pub fn name(&self) -> &'static str {
        match self {
            RhythmPattern::Quarter => "kwart",
            RhythmPattern::TwoEighths => "8e noot - 8e noot",
            RhythmPattern::SixteenthDottedEighth => "16e noot - 8e noot punt",
            RhythmPattern::DottedEighthSixteenth => "8e noot punt - 16e noot",
            RhythmPattern::EighthRestTwoSixteenths => "8e rust - 16e noot - 16e noot",
            RhythmPattern::AlternatingSixteenths => "16e rust - 16e noot - 16e rust - 16e noot",
            RhythmPattern::FramedSixteenths => "16e rust - 16e noot - 16e noot - 16e rust",
        }
    }

    /// Look up a pattern by its host name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|pattern| pattern.name() == name)
    }

    /// Signed durations in quarter notes
    fn quarters(&self) -> &'static [f64] {
        match self {
            RhythmPattern::Quarter => &[1.0],
            RhythmPattern::TwoEighths => &[0.5, 0.5],
            RhythmPattern::SixteenthDottedEighth => &[0.25, 0.75],
            RhythmPattern::DottedEighthSixteenth => &[0.75, 0.25],
            RhythmPattern::EighthRestTwoSixteenths => &[-0.5, 0.25, 0.25],
            RhythmPattern::AlternatingSixteenths => &[-0.25, 0.25, -0.25, 0.25],
            RhythmPattern::FramedSixteenths => &[-0.25, 0.25, 0.25, -0.25],
        }
    }

    /// Signed durations in milliseconds at the given tempo
    pub fn durations(&self, tempo: &Tempo) -> Vec<f64> {
        let quarter_note = tempo.quarter_note_ms();
        self.quarters().iter().map(|q| q * quarter_note).collect()
    }

    /// Sum of the absolute durations in milliseconds
    pub fn total_duration(&self, tempo: &Tempo) -> f64 {
        self.durations(tempo).iter().map(|d| d.abs()).sum()
    }
}

impl fmt::Display for RhythmPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unrecognized pattern name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown pattern name: {0:?}")]
pub struct UnknownPattern(pub String);

impl FromStr for RhythmPattern {
    type Err = UnknownPattern;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownPattern(s.to_string()))
    }
}

/// Signed durations for a pattern name at the given tempo.
/// Unknown names yield an empty sequence.
pub fn pattern_durations(name: &str, tempo: &Tempo) -> Vec<f64> {
    RhythmPattern::from_name(name)
        .map(|pattern| pattern.durations(tempo))
        .unwrap_or_default()
}

/// Total length of a pattern name in milliseconds; 0 for unknown names.
pub fn total_duration(name: &str, tempo: &Tempo) -> f64 {
    pattern_durations(name, tempo).iter().map(|d| d.abs()).sum()
}

/// One sounded note of a pattern, relative to the pattern start
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneEvent {
    /// Offset from pattern start in milliseconds
    pub offset_ms: f64,
    /// Requested note duration in milliseconds
    pub duration_ms: f64,
}

/// Expand signed durations into tone events.
///
/// Rests advance the cumulative offset by their absolute value and emit
/// nothing; notes emit an event at the current offset and then advance it.
pub fn schedule_tones(durations: &[f64]) -> Vec<ToneEvent> {
    let mut events = Vec::with_capacity(durations.len());
    let mut cumulative = 0.0;

    for &duration in durations {
        if duration > 0.0 {
            events.push(ToneEvent {
                offset_ms: cumulative,
                duration_ms: duration,
            });
            cumulative += duration;
        } else {
            cumulative += -duration;
        }
    }

    events
}
