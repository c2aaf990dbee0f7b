use thiserror::Error;

/// Failure to turn a file or byte buffer into a mono waveform.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read audio source")]
    Io(#[from] std::io::Error),

    #[error("unsupported or corrupt audio stream")]
    Decode(#[from] symphonia::core::errors::Error),

    #[error("no audio tracks found")]
    NoTrack,

    #[error("unknown sample rate")]
    UnknownSampleRate,

    #[error("audio contains no samples")]
    Empty,

    #[error("resampling from {from} Hz to {to} Hz failed: {reason}")]
    Resample { from: u32, to: u32, reason: String },
}

/// The requested pass-band cannot be realised at the given sample rate.
#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("filter order must be at least 1")]
    ZeroOrder,

    #[error("invalid pass-band {low} Hz .. {high} Hz")]
    InvalidBand { low: f32, high: f32 },

    #[error("high cutoff {high} Hz exceeds the Nyquist frequency of {nyquist} Hz")]
    AboveNyquist { high: f32, nyquist: f32 },
}

/// The waveform cannot be framed into a spectrogram.
#[derive(Debug, Error, PartialEq)]
pub enum TransformError {
    #[error("invalid framing: n_fft={n_fft}, hop_length={hop_length}, n_mels={n_mels}")]
    InvalidFraming {
        n_fft: usize,
        hop_length: usize,
        n_mels: usize,
    },

    #[error("waveform of {samples} samples is too short for a {n_fft}-point frame")]
    TooShort { samples: usize, n_fft: usize },
}

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("failed to load audio from {input}")]
    AudioLoad {
        input: String,
        #[source]
        source: LoadError,
    },

    #[error("degenerate band filter")]
    FilterDesign(#[from] FilterError),

    #[error("spectral transform failed")]
    Transform(#[from] TransformError),

    #[error("target size {height}x{width} must be non-zero")]
    InvalidTargetSize { height: u32, width: u32 },
}

/// An upload the caller must refuse before preprocessing.
#[derive(Debug, Error, PartialEq)]
pub enum UploadError {
    #[error("file type {0:?} is not allowed")]
    Extension(String),

    #[error("file is {size} bytes, limit is {max}")]
    TooLarge { size: u64, max: u64 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),

    #[error("invalid config")]
    Parse(#[from] toml::de::Error),
}

impl PreprocessError {
    pub fn load(input: impl Into<String>, source: LoadError) -> Self {
        Self::AudioLoad {
            input: input.into(),
            source,
        }
    }
}

pub type Result<T, E = PreprocessError> = std::result::Result<T, E>;
