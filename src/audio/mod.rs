pub mod decode;
pub mod filter;
pub mod mel;
pub mod resample;

pub use decode::{decode_audio, decode_audio_bytes, load_audio, load_audio_bytes, AudioData};
pub use filter::{band_filter, BandPass, SosFilter};
pub use mel::{power_to_db, MelConfig, MelSpectrogram};
