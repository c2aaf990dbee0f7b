use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::resample::resample;
use crate::error::LoadError;

/// Mono waveform at a known sample rate.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioData {
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Decode a file at its native rate, downmixed to mono.
pub fn decode_audio(path: &Path) -> Result<AudioData, LoadError> {
    let file = std::fs::File::open(path)?;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    decode_source(Box::new(file), hint)
}

/// Decode an in-memory audio file. `extension` is only a probing hint.
pub fn decode_audio_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<AudioData, LoadError> {
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    decode_source(Box::new(Cursor::new(bytes)), hint)
}

/// Decode a file and bring it to `target_rate`.
pub fn load_audio(path: &Path, target_rate: u32) -> Result<AudioData, LoadError> {
    let audio = decode_audio(path)?;
    conform(audio, target_rate)
}

pub fn load_audio_bytes(
    bytes: Vec<u8>,
    extension: Option<&str>,
    target_rate: u32,
) -> Result<AudioData, LoadError> {
    let audio = decode_audio_bytes(bytes, extension)?;
    conform(audio, target_rate)
}

pub(crate) fn conform(audio: AudioData, target_rate: u32) -> Result<AudioData, LoadError> {
    if audio.sample_rate == target_rate {
        return Ok(audio);
    }

    log::debug!("Resampling {}Hz -> {}Hz", audio.sample_rate, target_rate);
    let samples = resample(&audio.samples, audio.sample_rate, target_rate)?;
    if samples.is_empty() {
        return Err(LoadError::Empty);
    }

    Ok(AudioData {
        samples,
        sample_rate: target_rate,
    })
}

fn decode_source(source: Box<dyn MediaSource>, hint: Hint) -> Result<AudioData, LoadError> {
    let mss = MediaSourceStream::new(source, Default::default());

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(LoadError::NoTrack)?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(LoadError::UnknownSampleRate)?;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::debug!("Skipping undecodable packet: {}", msg);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        downmix_into(sample_buf.samples(), channels, &mut all_samples);
    }

    if all_samples.is_empty() {
        return Err(LoadError::Empty);
    }

    log::debug!(
        "Decoded audio: {} samples, {}Hz, {:.2}s",
        all_samples.len(),
        sample_rate,
        all_samples.len() as f32 / sample_rate as f32
    );

    Ok(AudioData {
        samples: all_samples,
        sample_rate,
    })
}

/// Average interleaved frames into a single channel.
fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels == 1 {
        out.extend_from_slice(interleaved);
        return;
    }

    out.extend(
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}
