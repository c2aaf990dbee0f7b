use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "respiview",
    about = "Convert audio recordings into spectrogram image tensors"
)]
pub struct Cli {
    /// Input audio files (WAV, MP3, OGG, WebM)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Config file (TOML). Defaults to ./respiview.toml or the user config dir.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output image height in pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// Output image width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Canonical sample rate inputs are resampled to
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Number of mel bands
    #[arg(long)]
    pub n_mels: Option<usize>,

    /// Band filter low cutoff (Hz)
    #[arg(long)]
    pub fmin: Option<f32>,

    /// Band filter high cutoff and mel upper bound (Hz)
    #[arg(long)]
    pub fmax: Option<f32>,

    /// Worker threads for multi-file runs (0 = one per core)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Print one JSON summary per input instead of text
    #[arg(long)]
    pub json: bool,
}
