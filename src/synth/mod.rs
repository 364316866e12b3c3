// Synth module - Oscillators and tone shaping

pub mod oscillator;
pub mod tone;
