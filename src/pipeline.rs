//! Audio file -> (1, H, W, 3) tensor.
//!
//! Stages run strictly in order: load, band filter, mel transform,
//! normalise, resize to pseudo-RGB, package. The first failure aborts the
//! run, is reported to the observer, and is returned to the caller.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::audio::decode::conform;
use crate::audio::{load_audio, load_audio_bytes, AudioData, BandPass, MelSpectrogram};
use crate::config::PipelineConfig;
use crate::error::{LoadError, PreprocessError, Result};
use crate::imaging::{to_intensity, to_pseudo_rgb, to_tensor, ImageTensor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    BandFilter,
    SpectralTransform,
    Normalize,
    ImageAdapter,
    Package,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::BandFilter => "band filter",
            Stage::SpectralTransform => "spectral transform",
            Stage::Normalize => "normalize",
            Stage::ImageAdapter => "image adapter",
            Stage::Package => "package",
        };
        f.write_str(name)
    }
}

/// Receives progress and failure reports from a pipeline run.
pub trait PipelineObserver: Send + Sync {
    fn stage_completed(&self, _input: &str, _stage: Stage) {}

    fn pipeline_failed(&self, input: &str, error: &PreprocessError);
}

impl<T: PipelineObserver + ?Sized> PipelineObserver for Arc<T> {
    fn stage_completed(&self, input: &str, stage: Stage) {
        (**self).stage_completed(input, stage)
    }

    fn pipeline_failed(&self, input: &str, error: &PreprocessError) {
        (**self).pipeline_failed(input, error)
    }
}

/// Forwards reports to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl PipelineObserver for LogObserver {
    fn stage_completed(&self, input: &str, stage: Stage) {
        log::debug!("{}: {} done", input, stage);
    }

    fn pipeline_failed(&self, input: &str, error: &PreprocessError) {
        log::error!("Error processing audio file {}: {}", input, error_chain(error));
    }
}

/// Logs stage progress but stays silent on failure, for callers that
/// report returned errors themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct StageLogObserver;

impl PipelineObserver for StageLogObserver {
    fn stage_completed(&self, input: &str, stage: Stage) {
        LogObserver.stage_completed(input, stage);
    }

    fn pipeline_failed(&self, _input: &str, _error: &PreprocessError) {}
}

/// `outer: inner: root` rendering of an error and its sources.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

/// Reusable preprocessor. Holds only immutable state, so one instance can
/// serve concurrent callers.
pub struct Preprocessor {
    config: PipelineConfig,
    band: BandPass,
    mel: MelSpectrogram,
    observer: Box<dyn PipelineObserver>,
}

impl Preprocessor {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            band: config.band(),
            mel: MelSpectrogram::new(config.mel()),
            config,
            observer: Box::new(LogObserver),
        }
    }

    pub fn with_observer(mut self, observer: impl PipelineObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage on the audio file at `path`.
    pub fn preprocess_file(&self, path: &Path) -> Result<ImageTensor> {
        let input = path.display().to_string();
        self.observed(&input, || {
            let audio = load_audio(path, self.config.sample_rate)
                .map_err(|e| PreprocessError::load(&input, e))?;
            self.run(&input, audio)
        })
    }

    /// Run every stage on an in-memory audio file; `label` identifies it in reports.
    pub fn preprocess_bytes(
        &self,
        label: &str,
        bytes: Vec<u8>,
        extension: Option<&str>,
    ) -> Result<ImageTensor> {
        self.observed(label, || {
            let audio = load_audio_bytes(bytes, extension, self.config.sample_rate)
                .map_err(|e| PreprocessError::load(label, e))?;
            self.run(label, audio)
        })
    }

    /// Run every stage on an already decoded mono waveform.
    pub fn preprocess_samples(
        &self,
        label: &str,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<ImageTensor> {
        self.observed(label, || {
            let load = || -> std::result::Result<AudioData, LoadError> {
                if samples.is_empty() {
                    return Err(LoadError::Empty);
                }
                let audio = AudioData {
                    samples: samples.to_vec(),
                    sample_rate,
                };
                conform(audio, self.config.sample_rate)
            };
            let audio = load().map_err(|e| PreprocessError::load(label, e))?;
            self.run(label, audio)
        })
    }

    fn observed(
        &self,
        input: &str,
        run: impl FnOnce() -> Result<ImageTensor>,
    ) -> Result<ImageTensor> {
        let size = self.config.target_size;
        let result = if size.is_empty() {
            Err(PreprocessError::InvalidTargetSize {
                height: size.height,
                width: size.width,
            })
        } else {
            run()
        };
        if let Err(ref error) = result {
            self.observer.pipeline_failed(input, error);
        }
        result
    }

    fn run(&self, input: &str, audio: AudioData) -> Result<ImageTensor> {
        let done = |stage| self.observer.stage_completed(input, stage);
        done(Stage::Load);

        let filtered = self.band.design(audio.sample_rate)?.apply(&audio.samples);
        drop(audio);
        done(Stage::BandFilter);

        let db = self.mel.decibels(&filtered)?;
        drop(filtered);
        done(Stage::SpectralTransform);

        let intensity = to_intensity(&db);
        done(Stage::Normalize);

        let rgb = to_pseudo_rgb(&intensity, self.config.target_size);
        done(Stage::ImageAdapter);

        let tensor = to_tensor(&rgb);
        done(Stage::Package);

        Ok(tensor)
    }
}

/// One-shot convenience: preprocess `path` with `config`, logging failures.
pub fn preprocess_audio(path: &Path, config: &PipelineConfig) -> Result<ImageTensor> {
    Preprocessor::new(config.clone()).preprocess_file(path)
}
