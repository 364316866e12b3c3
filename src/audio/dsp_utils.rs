// DSP hygiene for the output mix

/// Flush denormals to zero
///
/// Values this small are far below audibility and can stall some CPUs.
/// Threshold: 1e-15
#[inline]
pub fn flush_denormals_to_zero(x: f32) -> f32 {
    if x.abs() < 1e-15 { 0.0 } else { x }
}

/// Hard clip to [-1, 1]
///
/// The mix is a click plus a few quiet tones, so clipping only guards against
/// an overly hot click sample.
#[inline]
pub fn hard_clip(x: f32) -> f32 {
    x.clamp(-1.0, 1.0)
}
