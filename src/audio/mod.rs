// Audio module - CPAL backend, real-time renderer and the output seam

pub mod dsp_utils;
pub mod engine;
pub mod format_conversion;
pub mod output;
pub mod renderer;
pub mod timing;
