//! End-to-end tests: WAV on disk -> tensor.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use approx::assert_abs_diff_eq;
use hound::{SampleFormat, WavSpec, WavWriter};
use respiview::audio::MelSpectrogram;
use respiview::error::LoadError;
use respiview::imaging::stats;
use respiview::pipeline::error_chain;
use respiview::{
    preprocess_audio, PipelineConfig, PipelineObserver, PreprocessError, Preprocessor, Stage,
    TargetSize,
};
use tempfile::{tempdir, TempDir};

fn sine(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
    let n = (sample_rate as f32 * seconds) as usize;
    (0..n)
        .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// Write interleaved 16-bit PCM.
fn write_wav(path: &Path, channels: &[Vec<f32>], sample_rate: u32) {
    let spec = WavSpec {
        channels: channels.len() as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    for i in 0..channels[0].len() {
        for channel in channels {
            writer
                .write_sample((channel[i].clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                .unwrap();
        }
    }
    writer.finalize().unwrap();
}

fn fixture(name: &str, channels: &[Vec<f32>], sample_rate: u32) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join(name);
    write_wav(&path, channels, sample_rate);
    (dir, path)
}

#[test]
fn tone_produces_bright_band() {
    let (_dir, path) = fixture("tone.wav", &[sine(1000.0, 16000, 2.0)], 16000);
    let config = PipelineConfig::default();

    let tensor = preprocess_audio(&path, &config).unwrap();
    assert_eq!(tensor.dim(), (1, 224, 224, 3));
    assert!(tensor.iter().all(|&v| (0.0..=1.0).contains(&v)));

    // Mel row nearest 1 kHz, mapped onto the 224-row image.
    let mel = MelSpectrogram::new(config.mel());
    let centers = mel.center_frequencies();
    let mel_row = centers
        .iter()
        .enumerate()
        .min_by(|a, b| (a.1 - 1000.0).abs().total_cmp(&(b.1 - 1000.0).abs()))
        .map(|(i, _)| i)
        .unwrap();
    let expected_row = (mel_row as f32 + 0.5) * 224.0 / centers.len() as f32;

    let summary = stats(&tensor);
    let bright = summary.brightest_row.unwrap() as f32;
    assert!(
        (bright - expected_row).abs() <= 4.0,
        "bright row {bright}, expected near {expected_row}"
    );
    assert!(summary.max > 0.9, "peak {}", summary.max);
    assert_abs_diff_eq!(summary.min, 0.0, epsilon = 1e-6);
}

#[test]
fn channels_are_replicated() {
    let (_dir, path) = fixture("tone.wav", &[sine(700.0, 16000, 1.0)], 16000);
    let tensor = preprocess_audio(&path, &PipelineConfig::default()).unwrap();

    for row in tensor.index_axis(ndarray::Axis(0), 0).outer_iter() {
        for pixel in row.outer_iter() {
            assert_eq!(pixel[0], pixel[1]);
            assert_eq!(pixel[1], pixel[2]);
        }
    }
}

#[test]
fn silence_is_all_zero() {
    let (_dir, path) = fixture("silence.wav", &[vec![0.0; 16000]], 16000);
    let tensor = preprocess_audio(&path, &PipelineConfig::default()).unwrap();
    assert_eq!(tensor.dim(), (1, 224, 224, 3));
    assert!(tensor.iter().all(|&v| v == 0.0));
}

#[test]
fn runs_are_reproducible() {
    let (_dir, path) = fixture("tone.wav", &[sine(440.0, 16000, 1.5)], 16000);
    let pre = Preprocessor::new(PipelineConfig::default());
    assert_eq!(
        pre.preprocess_file(&path).unwrap(),
        pre.preprocess_file(&path).unwrap()
    );
}

#[test]
fn target_size_is_honoured() {
    let (_dir, path) = fixture("tone.wav", &[sine(440.0, 16000, 1.0)], 16000);
    for size in [TargetSize::new(224, 224), TargetSize::new(96, 160), TargetSize::new(1, 1)] {
        let config = PipelineConfig::default().with_target_size(size);
        let tensor = preprocess_audio(&path, &config).unwrap();
        assert_eq!(
            tensor.dim(),
            (1, size.height as usize, size.width as usize, 3)
        );
        assert!(tensor.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}

#[test]
fn stereo_at_foreign_rate_is_conformed() {
    let left = sine(1000.0, 44100, 1.0);
    let right = sine(1000.0, 44100, 1.0);
    let (_dir, path) = fixture("stereo.wav", &[left, right], 44100);

    let audio = respiview::audio::load_audio(&path, 16000).unwrap();
    assert_eq!(audio.sample_rate, 16000);
    assert!((audio.duration_secs() - 1.0).abs() < 0.02);

    let tensor = preprocess_audio(&path, &PipelineConfig::default()).unwrap();
    assert_eq!(tensor.dim(), (1, 224, 224, 3));
}

#[test]
fn bytes_match_file() {
    let (_dir, path) = fixture("tone.wav", &[sine(880.0, 16000, 1.0)], 16000);
    let pre = Preprocessor::new(PipelineConfig::default());

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(
        pre.preprocess_bytes("upload", bytes, Some("wav")).unwrap(),
        pre.preprocess_file(&path).unwrap()
    );
}

#[test]
fn missing_file_is_a_load_failure() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.wav");
    let err = preprocess_audio(&path, &PipelineConfig::default()).unwrap_err();

    match err {
        PreprocessError::AudioLoad { input, source } => {
            assert_eq!(input, path.display().to_string());
            assert!(matches!(source, LoadError::Io(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn empty_wav_is_a_load_failure() {
    let (_dir, path) = fixture("empty.wav", &[Vec::new()], 16000);
    let err = preprocess_audio(&path, &PipelineConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        PreprocessError::AudioLoad {
            source: LoadError::Empty,
            ..
        }
    ));
}

#[test]
fn corrupt_file_is_a_load_failure() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("corrupt.mp3");
    std::fs::write(&path, b"definitely not an mpeg stream").unwrap();

    let err = preprocess_audio(&path, &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, PreprocessError::AudioLoad { .. }), "{err}");
}

#[derive(Default)]
struct Failures(Mutex<Vec<String>>);

impl PipelineObserver for Failures {
    fn pipeline_failed(&self, input: &str, error: &PreprocessError) {
        self.0
            .lock()
            .unwrap()
            .push(format!("{input}: {}", error_chain(error)));
    }
}

#[test]
fn observer_sees_failing_input() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gone.ogg");
    let failures = Arc::new(Failures::default());
    let pre = Preprocessor::new(PipelineConfig::default()).with_observer(failures.clone());

    assert!(pre.preprocess_file(&path).is_err());

    let seen = failures.0.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].starts_with(&path.display().to_string()));
    assert!(seen[0].contains("failed to read audio source"));
}

#[test]
fn concurrent_calls_agree() {
    let (_dir, path) = fixture("tone.wav", &[sine(300.0, 16000, 1.0)], 16000);
    let pre = Arc::new(Preprocessor::new(PipelineConfig::default()));
    let reference = pre.preprocess_file(&path).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pre = Arc::clone(&pre);
            let path = path.clone();
            std::thread::spawn(move || pre.preprocess_file(&path).unwrap())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), reference);
    }
}

#[test]
fn stage_display_names() {
    assert_eq!(Stage::SpectralTransform.to_string(), "spectral transform");
}
