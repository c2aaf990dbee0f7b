use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::audio::{BandPass, MelConfig};
use crate::error::{ConfigError, UploadError};
use crate::imaging::TargetSize;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub dsp: PipelineConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

/// Parameters threaded through every pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Canonical rate every input is resampled to.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_n_mels")]
    pub n_mels: usize,
    /// Low edge of the band filter.
    #[serde(default = "default_fmin")]
    pub fmin: f32,
    /// High edge of the band filter and upper bound of the mel bank.
    #[serde(default = "default_fmax")]
    pub fmax: f32,
    #[serde(default = "default_filter_order")]
    pub filter_order: usize,
    #[serde(default = "default_n_fft")]
    pub n_fft: usize,
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,
    #[serde(default = "default_top_db")]
    pub top_db: Option<f32>,
    #[serde(default)]
    pub target_size: TargetSize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            n_mels: default_n_mels(),
            fmin: default_fmin(),
            fmax: default_fmax(),
            filter_order: default_filter_order(),
            n_fft: default_n_fft(),
            hop_length: default_hop_length(),
            top_db: default_top_db(),
            target_size: TargetSize::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_target_size(mut self, target_size: TargetSize) -> Self {
        self.target_size = target_size;
        self
    }

    pub fn band(&self) -> BandPass {
        BandPass::new(self.fmin, self.fmax, self.filter_order)
    }

    pub fn mel(&self) -> MelConfig {
        MelConfig {
            sample_rate: self.sample_rate,
            n_fft: self.n_fft,
            hop_length: self.hop_length,
            n_mels: self.n_mels,
            fmin: 0.0,
            fmax: self.fmax,
            center: true,
            top_db: self.top_db,
        }
    }
}

/// Upload policy. Enforced by callers before anything reaches the pipeline.
///
/// Accepting `ogg` and `webm` does not guarantee decoding: Opus streams in
/// either container have no decoder and fail with `LoadError::Decode`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl UploadConfig {
    /// Case-insensitive extension check; names without an extension are refused.
    pub fn allows(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                self.allowed_extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    pub fn check(&self, path: &Path, size: u64) -> Result<(), UploadError> {
        if !self.allows(path) {
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Err(UploadError::Extension(ext));
        }
        if size > self.max_upload_bytes {
            return Err(UploadError::TooLarge {
                size,
                max: self.max_upload_bytes,
            });
        }
        Ok(())
    }
}

fn default_sample_rate() -> u32 { 16000 }
fn default_n_mels() -> usize { 128 }
fn default_fmin() -> f32 { 100.0 }
fn default_fmax() -> f32 { 8000.0 }
fn default_filter_order() -> usize { 10 }
fn default_n_fft() -> usize { 2048 }
fn default_hop_length() -> usize { 512 }
fn default_top_db() -> Option<f32> { Some(80.0) }
fn default_allowed_extensions() -> Vec<String> {
    ["wav", "mp3", "ogg", "webm"].iter().map(|s| s.to_string()).collect()
}
fn default_max_upload_bytes() -> u64 { 16 * 1024 * 1024 }

pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(content)?)
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}
