//! Turns audio recordings into normalised, image-shaped tensors for
//! spectrogram classifiers.
//!
//! ```no_run
//! use std::path::Path;
//! use respiview::{preprocess_audio, PipelineConfig};
//!
//! let tensor = preprocess_audio(Path::new("cough.wav"), &PipelineConfig::default())?;
//! assert_eq!(tensor.dim(), (1, 224, 224, 3));
//! # Ok::<(), respiview::PreprocessError>(())
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod imaging;
pub mod pipeline;

pub use config::{Config, PipelineConfig, UploadConfig};
pub use error::PreprocessError;
pub use imaging::{ImageTensor, TargetSize};
pub use pipeline::{
    preprocess_audio, LogObserver, PipelineObserver, Preprocessor, Stage, StageLogObserver,
};
