//! Mel power spectrogram and relative decibel scaling.
//!
//! Framing follows the common librosa defaults: 2048-point periodic Hann
//! window, hop 512, frames centered with zero padding. The filter bank uses
//! the Slaney mel scale with area-normalised triangles.

use std::f32::consts::PI;
use std::sync::Arc;

use ndarray::Array2;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::error::TransformError;

/// Power floor used before taking logarithms.
pub const AMIN: f32 = 1e-10;

#[derive(Debug, Clone, PartialEq)]
pub struct MelConfig {
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    pub fmin: f32,
    pub fmax: f32,
    /// Pad `n_fft / 2` zeros on both sides so frame `t` is centered at `t * hop`.
    pub center: bool,
    /// Dynamic range kept below the peak, in dB.
    pub top_db: Option<f32>,
}

impl Default for MelConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            fmin: 0.0,
            fmax: 8000.0,
            center: true,
            top_db: Some(80.0),
        }
    }
}

/// Mel spectrogram extractor with a precomputed filter bank and window.
pub struct MelSpectrogram {
    config: MelConfig,
    /// (n_mels, n_fft / 2 + 1)
    mel_basis: Array2<f32>,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl MelSpectrogram {
    pub fn new(config: MelConfig) -> Self {
        let mel_basis = mel_filterbank(
            config.sample_rate,
            config.n_fft,
            config.n_mels,
            config.fmin,
            config.fmax,
        );
        let window = hann_window(config.n_fft);
        let fft = FftPlanner::<f32>::new().plan_fft_forward(config.n_fft);

        Self {
            config,
            mel_basis,
            window,
            fft,
        }
    }

    pub fn config(&self) -> &MelConfig {
        &self.config
    }

    /// Number of frames produced for `num_samples` samples.
    pub fn num_frames(&self, num_samples: usize) -> Result<usize, TransformError> {
        let MelConfig {
            n_fft,
            hop_length,
            n_mels,
            ..
        } = self.config;
        if n_fft == 0 || hop_length == 0 || n_mels == 0 {
            return Err(TransformError::InvalidFraming {
                n_fft,
                hop_length,
                n_mels,
            });
        }

        let too_short = TransformError::TooShort {
            samples: num_samples,
            n_fft,
        };

        if num_samples == 0 {
            return Err(too_short);
        }
        if self.config.center {
            Ok(1 + num_samples / hop_length)
        } else if num_samples < n_fft {
            Err(too_short)
        } else {
            Ok(1 + (num_samples - n_fft) / hop_length)
        }
    }

    /// Mel power spectrogram, shape (n_mels, frames).
    pub fn power(&self, samples: &[f32]) -> Result<Array2<f32>, TransformError> {
        let n_frames = self.num_frames(samples.len())?;
        let n_fft = self.config.n_fft;
        let n_freqs = n_fft / 2 + 1;

        let padded: Vec<f32> = if self.config.center {
            let pad = n_fft / 2;
            let mut padded = vec![0.0; pad];
            padded.extend_from_slice(samples);
            padded.resize(padded.len() + pad, 0.0);
            padded
        } else {
            samples.to_vec()
        };

        let mut power_spec = Array2::<f32>::zeros((n_freqs, n_frames));
        let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];

        for frame in 0..n_frames {
            let start = frame * self.config.hop_length;
            for (i, slot) in buffer.iter_mut().enumerate() {
                let sample = padded.get(start + i).copied().unwrap_or(0.0);
                *slot = Complex::new(sample * self.window[i], 0.0);
            }

            self.fft.process(&mut buffer);

            for (bin, c) in buffer[..n_freqs].iter().enumerate() {
                power_spec[[bin, frame]] = c.norm_sqr();
            }
        }

        Ok(self.mel_basis.dot(&power_spec))
    }

    /// Mel spectrogram in dB relative to its own peak.
    pub fn decibels(&self, samples: &[f32]) -> Result<Array2<f32>, TransformError> {
        let power = self.power(samples)?;
        Ok(power_to_db(&power, self.config.top_db))
    }

    /// Center frequency in Hz of each mel row.
    pub fn center_frequencies(&self) -> Vec<f32> {
        let points = mel_frequencies(self.config.n_mels + 2, self.config.fmin, self.config.fmax);
        points[1..=self.config.n_mels].to_vec()
    }
}

/// `10 * log10(S / max(S))` with an `AMIN` floor, then clipped to `top_db` below the peak.
pub fn power_to_db(power: &Array2<f32>, top_db: Option<f32>) -> Array2<f32> {
    let reference = power.iter().copied().fold(0.0f32, f32::max).max(AMIN);
    let ref_db = 10.0 * reference.log10();

    let mut db = power.mapv(|s| 10.0 * s.max(AMIN).log10() - ref_db);

    if let Some(top_db) = top_db {
        let peak = db.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let floor = peak - top_db;
        db.mapv_inplace(|v| v.max(floor));
    }

    db
}

const F_SP: f32 = 200.0 / 3.0;
const MIN_LOG_HZ: f32 = 1000.0;
const MIN_LOG_MEL: f32 = MIN_LOG_HZ / F_SP;

fn log_step() -> f32 {
    6.4f32.ln() / 27.0
}

/// Slaney mel scale: linear below 1 kHz, logarithmic above.
pub fn hz_to_mel(hz: f32) -> f32 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f32) -> f32 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        mel * F_SP
    }
}

/// `n` frequencies evenly spaced on the mel scale between `fmin` and `fmax`.
fn mel_frequencies(n: usize, fmin: f32, fmax: f32) -> Vec<f32> {
    let min_mel = hz_to_mel(fmin);
    let max_mel = hz_to_mel(fmax);
    let step = if n > 1 {
        (max_mel - min_mel) / (n - 1) as f32
    } else {
        0.0
    };

    (0..n).map(|i| mel_to_hz(min_mel + step * i as f32)).collect()
}

/// Triangular filters with Slaney area normalisation, shape (n_mels, n_fft / 2 + 1).
fn mel_filterbank(
    sample_rate: u32,
    n_fft: usize,
    n_mels: usize,
    fmin: f32,
    fmax: f32,
) -> Array2<f32> {
    let n_freqs = n_fft / 2 + 1;
    let fft_freqs: Vec<f32> = (0..n_freqs)
        .map(|k| k as f32 * sample_rate as f32 / n_fft as f32)
        .collect();
    let mel_f = mel_frequencies(n_mels + 2, fmin, fmax);

    let mut weights = Array2::<f32>::zeros((n_mels, n_freqs));
    for m in 0..n_mels {
        let (left, center, right) = (mel_f[m], mel_f[m + 1], mel_f[m + 2]);
        let enorm = 2.0 / (right - left);

        for (k, &f) in fft_freqs.iter().enumerate() {
            let lower = (f - left) / (center - left);
            let upper = (right - f) / (right - center);
            weights[[m, k]] = lower.min(upper).max(0.0) * enorm;
        }
    }

    weights
}

/// Periodic Hann window.
fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}
