//! Butterworth band filter realised as cascaded second-order sections.
//!
//! Design path: analog prototype (unit cutoff) -> frequency transform to the
//! pre-warped band edges -> bilinear transform -> pole/zero pairing into
//! biquads. Filtering runs in f64 with transposed direct form II sections.

use std::f64::consts::PI;

use rustfft::num_complex::Complex64;

use crate::error::FilterError;

/// Imaginary parts below this are treated as real roots when pairing.
const REAL_ROOT_TOLERANCE: f64 = 1e-9;

/// Band-pass specification in Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandPass {
    pub low_hz: f32,
    pub high_hz: f32,
    pub order: usize,
}

impl BandPass {
    pub fn new(low_hz: f32, high_hz: f32, order: usize) -> Self {
        Self {
            low_hz,
            high_hz,
            order,
        }
    }

    /// Design the filter for `sample_rate`.
    ///
    /// A high cutoff sitting exactly on Nyquist leaves nothing to reject at
    /// the top, so the design collapses to a high-pass of the same order.
    pub fn design(&self, sample_rate: u32) -> Result<SosFilter, FilterError> {
        if self.order == 0 {
            return Err(FilterError::ZeroOrder);
        }

        let low = self.low_hz as f64;
        let high = self.high_hz as f64;
        if !(low.is_finite() && high.is_finite() && low > 0.0 && low < high) {
            return Err(FilterError::InvalidBand {
                low: self.low_hz,
                high: self.high_hz,
            });
        }

        let fs = sample_rate as f64;
        let nyquist = fs / 2.0;
        if high > nyquist {
            return Err(FilterError::AboveNyquist {
                high: self.high_hz,
                nyquist: nyquist as f32,
            });
        }

        let prototype = Zpk::butterworth(self.order);
        let analog = if high == nyquist {
            log::debug!(
                "High cutoff {}Hz equals Nyquist, designing order-{} high-pass at {}Hz",
                high,
                self.order,
                low
            );
            prototype.lowpass_to_highpass(prewarp(low, fs))
        } else {
            let wl = prewarp(low, fs);
            let wh = prewarp(high, fs);
            prototype.lowpass_to_bandpass((wl * wh).sqrt(), wh - wl)
        };

        Ok(analog.bilinear(fs).into_sections())
    }
}

/// Convenience wrapper: design for `sample_rate` and filter `samples`.
pub fn band_filter(
    samples: &[f32],
    sample_rate: u32,
    band: &BandPass,
) -> Result<Vec<f32>, FilterError> {
    Ok(band.design(sample_rate)?.apply(samples))
}

fn prewarp(freq_hz: f64, fs: f64) -> f64 {
    2.0 * fs * (PI * freq_hz / fs).tan()
}

/// Zeros, poles and gain of a transfer function.
#[derive(Debug, Clone)]
struct Zpk {
    zeros: Vec<Complex64>,
    poles: Vec<Complex64>,
    gain: f64,
}

impl Zpk {
    /// Analog Butterworth low-pass prototype with a 1 rad/s cutoff.
    fn butterworth(order: usize) -> Self {
        let n = order as f64;
        let poles = (0..order)
            .map(|k| {
                let m = -n + 1.0 + 2.0 * k as f64;
                -Complex64::from_polar(1.0, PI * m / (2.0 * n))
            })
            .collect();

        Self {
            zeros: Vec::new(),
            poles,
            gain: 1.0,
        }
    }

    fn relative_degree(&self) -> usize {
        self.poles.len() - self.zeros.len()
    }

    fn lowpass_to_bandpass(&self, center: f64, bandwidth: f64) -> Self {
        let degree = self.relative_degree();
        let shift = |roots: &[Complex64]| -> Vec<Complex64> {
            let scaled: Vec<Complex64> = roots.iter().map(|&r| r * (bandwidth / 2.0)).collect();
            let offsets: Vec<Complex64> = scaled
                .iter()
                .map(|&r| (r * r - center * center).sqrt())
                .collect();
            scaled
                .iter()
                .zip(&offsets)
                .map(|(&r, &o)| r + o)
                .chain(scaled.iter().zip(&offsets).map(|(&r, &o)| r - o))
                .collect()
        };

        let mut zeros = shift(&self.zeros);
        zeros.extend(std::iter::repeat(Complex64::new(0.0, 0.0)).take(degree));

        Self {
            zeros,
            poles: shift(&self.poles),
            gain: self.gain * bandwidth.powi(degree as i32),
        }
    }

    fn lowpass_to_highpass(&self, cutoff: f64) -> Self {
        let degree = self.relative_degree();
        let invert = |roots: &[Complex64]| -> Vec<Complex64> {
            roots.iter().map(|&r| Complex64::new(cutoff, 0.0) / r).collect()
        };

        let mut zeros = invert(&self.zeros);
        zeros.extend(std::iter::repeat(Complex64::new(0.0, 0.0)).take(degree));

        let num: Complex64 = self.zeros.iter().map(|&z| -z).product();
        let den: Complex64 = self.poles.iter().map(|&p| -p).product();

        Self {
            zeros,
            poles: invert(&self.poles),
            gain: self.gain * (num / den).re,
        }
    }

    fn bilinear(&self, fs: f64) -> Self {
        let degree = self.relative_degree();
        let fs2 = Complex64::new(2.0 * fs, 0.0);
        let map = |&r: &Complex64| (fs2 + r) / (fs2 - r);

        let mut zeros: Vec<Complex64> = self.zeros.iter().map(map).collect();
        zeros.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(degree));

        let num: Complex64 = self.zeros.iter().map(|&z| fs2 - z).product();
        let den: Complex64 = self.poles.iter().map(|&p| fs2 - p).product();

        Self {
            zeros,
            poles: self.poles.iter().map(map).collect(),
            gain: self.gain * (num / den).re,
        }
    }

    /// Pair digital roots into biquads, poles nearest the unit circle last.
    fn into_sections(self) -> SosFilter {
        let mut pole_pairs = pair_roots(&self.poles, false);
        pole_pairs.sort_by(|a, b| {
            let da = (1.0 - a.0.norm()).abs();
            let db = (1.0 - b.0.norm()).abs();
            db.total_cmp(&da)
        });
        let zero_pairs = pair_roots(&self.zeros, true);

        let mut sections: Vec<Section> = pole_pairs
            .iter()
            .enumerate()
            .map(|(i, poles)| {
                let [b0, b1, b2] = zero_pairs
                    .get(i)
                    .map(|zeros| polynomial(*zeros))
                    .unwrap_or([1.0, 0.0, 0.0]);
                let [_, a1, a2] = polynomial(*poles);
                Section { b0, b1, b2, a1, a2 }
            })
            .collect();

        if let Some(first) = sections.first_mut() {
            first.b0 *= self.gain;
            first.b1 *= self.gain;
            first.b2 *= self.gain;
        }

        SosFilter { sections }
    }
}

/// Group roots into conjugate pairs, then real pairs, then a lone real root.
///
/// Real zeros pair outermost-first so a band-pass section gets one zero at
/// DC and one at Nyquist.
fn pair_roots(roots: &[Complex64], outermost_first: bool) -> Vec<(Complex64, Option<Complex64>)> {
    let mut pairs: Vec<(Complex64, Option<Complex64>)> = roots
        .iter()
        .filter(|r| r.im > REAL_ROOT_TOLERANCE)
        .map(|r| (*r, Some(r.conj())))
        .collect();

    let mut reals: Vec<f64> = roots
        .iter()
        .filter(|r| r.im.abs() <= REAL_ROOT_TOLERANCE)
        .map(|r| r.re)
        .collect();
    reals.sort_by(f64::total_cmp);

    let real = |v: f64| Complex64::new(v, 0.0);
    if outermost_first {
        let n = reals.len();
        for i in 0..n / 2 {
            pairs.push((real(reals[i]), Some(real(reals[n - 1 - i]))));
        }
        if n % 2 == 1 {
            pairs.push((real(reals[n / 2]), None));
        }
    } else {
        for chunk in reals.chunks(2) {
            pairs.push((real(chunk[0]), chunk.get(1).copied().map(real)));
        }
    }

    pairs
}

/// Coefficients of `(1 - r0 z^-1)(1 - r1 z^-1)`.
fn polynomial((r0, r1): (Complex64, Option<Complex64>)) -> [f64; 3] {
    match r1 {
        Some(r1) => [1.0, -(r0 + r1).re, (r0 * r1).re],
        None => [1.0, -r0.re, 0.0],
    }
}

/// Normalised biquad coefficients (a0 == 1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Section {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Section {
    fn response(&self, w: f64) -> Complex64 {
        let z1 = Complex64::from_polar(1.0, -w);
        let z2 = z1 * z1;
        (self.b0 + z1 * self.b1 + z2 * self.b2) / (1.0 + z1 * self.a1 + z2 * self.a2)
    }
}

/// Delay line of one section.
#[derive(Debug, Clone, Copy, Default)]
struct SectionState {
    z1: f64,
    z2: f64,
}

impl SectionState {
    /// Transposed direct form II.
    fn process(&mut self, input: f64, c: &Section) -> f64 {
        let output = c.b0 * input + self.z1;
        self.z1 = c.b1 * input - c.a1 * output + self.z2;
        self.z2 = c.b2 * input - c.a2 * output;
        output
    }
}

/// A cascade of second-order sections.
#[derive(Debug, Clone, PartialEq)]
pub struct SosFilter {
    sections: Vec<Section>,
}

impl SosFilter {
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Filter from rest; the output has the input's length.
    pub fn apply(&self, samples: &[f32]) -> Vec<f32> {
        let mut states = vec![SectionState::default(); self.sections.len()];

        samples
            .iter()
            .map(|&x| {
                let y = self
                    .sections
                    .iter()
                    .zip(states.iter_mut())
                    .fold(x as f64, |acc, (section, state)| state.process(acc, section));
                y as f32
            })
            .collect()
    }

    /// Magnitude response at `freq_hz`.
    pub fn gain_at(&self, freq_hz: f64, sample_rate: u32) -> f64 {
        let w = 2.0 * PI * freq_hz / sample_rate as f64;
        self.sections
            .iter()
            .map(|s| s.response(w))
            .product::<Complex64>()
            .norm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sine(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * seconds) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn section_count_follows_order() {
        let filter = BandPass::new(100.0, 8000.0, 10).design(44100).unwrap();
        assert_eq!(filter.sections().len(), 10);

        let filter = BandPass::new(100.0, 8000.0, 10).design(16000).unwrap();
        assert_eq!(filter.sections().len(), 5);
    }

    #[test]
    fn bandpass_response_shape() {
        let filter = BandPass::new(100.0, 4000.0, 10).design(16000).unwrap();
        assert_relative_eq!(filter.gain_at(1000.0, 16000), 1.0, epsilon = 1e-3);
        assert_relative_eq!(
            filter.gain_at(100.0, 16000),
            std::f64::consts::FRAC_1_SQRT_2,
            epsilon = 1e-3
        );
        assert!(filter.gain_at(20.0, 16000) < 1e-5);
        assert!(filter.gain_at(7000.0, 16000) < 1e-3);
    }

    #[test]
    fn cutoff_at_nyquist_keeps_highpass() {
        let filter = BandPass::new(100.0, 8000.0, 10).design(16000).unwrap();
        assert_relative_eq!(filter.gain_at(1000.0, 16000), 1.0, epsilon = 1e-3);
        assert_relative_eq!(filter.gain_at(6000.0, 16000), 1.0, epsilon = 1e-3);
        assert!(filter.gain_at(20.0, 16000) < 1e-5);
    }

    #[test]
    fn rejects_sub_band_tone() {
        let input = sine(20.0, 16000, 2.0);
        let output = band_filter(&input, 16000, &BandPass::new(100.0, 8000.0, 10)).unwrap();
        assert_eq!(output.len(), input.len());

        let half = input.len() / 2;
        let ratio = rms(&output[half..]) / rms(&input[half..]);
        assert!(ratio < 1e-3, "attenuation ratio {ratio}");
    }

    #[test]
    fn passes_in_band_tone() {
        let input = sine(1000.0, 16000, 2.0);
        let output = band_filter(&input, 16000, &BandPass::new(100.0, 8000.0, 10)).unwrap();

        let half = input.len() / 2;
        let ratio = rms(&output[half..]) / rms(&input[half..]);
        assert!((ratio - 1.0).abs() < 0.02, "gain ratio {ratio}");
    }

    #[test]
    fn above_nyquist_is_degenerate() {
        let err = BandPass::new(100.0, 8000.0, 10).design(8000).unwrap_err();
        assert_eq!(
            err,
            FilterError::AboveNyquist {
                high: 8000.0,
                nyquist: 4000.0
            }
        );
    }

    #[test]
    fn inverted_band_is_degenerate() {
        assert!(matches!(
            BandPass::new(500.0, 100.0, 4).design(16000),
            Err(FilterError::InvalidBand { .. })
        ));
        assert!(matches!(
            BandPass::new(0.0, 100.0, 4).design(16000),
            Err(FilterError::InvalidBand { .. })
        ));
        assert_eq!(
            BandPass::new(100.0, 1000.0, 0).design(16000),
            Err(FilterError::ZeroOrder)
        );
    }

    #[test]
    fn odd_order_highpass() {
        let filter = BandPass::new(200.0, 8000.0, 3).design(16000).unwrap();
        assert_eq!(filter.sections().len(), 2);
        assert_relative_eq!(filter.gain_at(4000.0, 16000), 1.0, epsilon = 1e-3);
        assert!(filter.gain_at(20.0, 16000) < 1e-2);
    }

    #[test]
    fn filtering_is_deterministic() {
        let input = sine(440.0, 16000, 0.25);
        let band = BandPass::new(100.0, 8000.0, 10);
        assert_eq!(
            band_filter(&input, 16000, &band).unwrap(),
            band_filter(&input, 16000, &band).unwrap()
        );
    }
}
