// Format conversion for CPAL audio streams
//
// The mix is computed in f32 and converted to the device format (f32, i16 or
// u16) while writing the output buffer, without allocation.

use cpal::{FromSample, Sample};

/// Write one mono f32 sample to every channel of an interleaved frame
#[inline]
pub fn write_mono_to_interleaved_frame<T>(internal_sample: f32, output_frame: &mut [T])
where
    T: Sample + FromSample<f32>,
{
    for channel_sample in output_frame.iter_mut() {
        *channel_sample = Sample::from_sample::<f32>(internal_sample);
    }
}
