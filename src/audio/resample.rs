use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::LoadError;

const CHUNK_SIZE: usize = 1024;

/// Resample mono f32 audio from `from_rate` to `to_rate`.
///
/// The output holds exactly `ceil(len * to_rate / from_rate)` samples,
/// aligned with the input: the resampler's delay is skipped and its
/// internal buffer is flushed so the end of the clip is kept.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, LoadError> {
    if from_rate == to_rate {
        return Ok(samples.to_vec());
    }
    if samples.is_empty() {
        return Err(LoadError::Empty);
    }

    let failed = |reason: String| LoadError::Resample {
        from: from_rate,
        to: to_rate,
        reason,
    };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(
        ratio,
        1.0, // fixed ratio
        params,
        CHUNK_SIZE,
        1, // mono
    )
    .map_err(|e| failed(e.to_string()))?;

    let delay = resampler.output_delay();
    let expected = (samples.len() as u64 * to_rate as u64).div_ceil(from_rate as u64) as usize;
    let mut output = Vec::with_capacity(delay + expected + CHUNK_SIZE);

    let mut chunks = samples.chunks_exact(CHUNK_SIZE);
    for chunk in &mut chunks {
        let out = resampler
            .process(&[chunk], None)
            .map_err(|e| failed(e.to_string()))?;
        output.extend_from_slice(&out[0]);
    }

    let rest = chunks.remainder();
    if !rest.is_empty() {
        let out = resampler
            .process_partial(Some(&[rest][..]), None)
            .map_err(|e| failed(e.to_string()))?;
        output.extend_from_slice(&out[0]);
    }

    // Drain what is still held in the delay line.
    while output.len() < delay + expected {
        let out = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|e| failed(e.to_string()))?;
        if out[0].is_empty() {
            return Err(failed("resampler produced no output while flushing".into()));
        }
        output.extend_from_slice(&out[0]);
    }

    output.drain(..delay);
    output.truncate(expected);
    Ok(output)
}
