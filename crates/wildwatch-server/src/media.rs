//! Media type checks and audio transcoding

use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as DecodeError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;
use wildwatch_core::{Error, Result};

pub const IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/jpg"];

pub const AUDIO_TYPES: &[&str] = &["audio/wav", "audio/x-wav", "audio/mp3", "audio/mpeg"];

/// Audio source that skips content-type checks
pub const MICROPHONE_SOURCE: &str = "microphone";

/// Sample rate the audio classifier expects
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Declared content type, or one guessed from the file name
pub fn content_type(declared: Option<&str>, filename: &str) -> String {
    match declared.map(str::trim).filter(|t| !t.is_empty()) {
        Some(declared) => declared.to_ascii_lowercase(),
        None => mime_guess::from_path(filename)
            .first_raw()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Reject anything but JPEG or PNG
pub fn check_image(content_type: &str) -> Result<()> {
    if IMAGE_TYPES.iter().any(|t| content_type.contains(t)) {
        Ok(())
    } else {
        Err(Error::input(
            "Unsupported image format. Please upload JPEG or PNG.",
        ))
    }
}

/// Reject anything but WAV or MP3, unless recorded from the microphone
pub fn check_audio(content_type: &str, source: Option<&str>) -> Result<()> {
    if source == Some(MICROPHONE_SOURCE) || AUDIO_TYPES.iter().any(|t| content_type.contains(t)) {
        Ok(())
    } else {
        Err(Error::input(
            "Unsupported audio format. Please upload WAV or MP3 files only.",
        ))
    }
}

/// Whether an audio upload needs transcoding before classification
pub fn is_mp3(content_type: &str, filename: &str) -> bool {
    content_type.contains("mp3")
        || content_type.contains("mpeg")
        || filename.to_ascii_lowercase().ends_with(".mp3")
}

/// Decode `src` and write it to `dest` as mono 16 kHz 16-bit PCM WAV.
///
/// Blocking; run it on the blocking pool.
pub fn transcode_to_wav(src: &Path, dest: &Path) -> Result<()> {
    let file = std::fs::File::open(src)?;
    let stream = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = src.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let opened = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::input(format!("Could not read audio: {}", e)))?;
    let mut format = opened.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::input("Audio file contains no playable track"))?;
    let track_id = track.id;
    let params = track.codec_params.clone();
    let source_rate = params
        .sample_rate
        .ok_or_else(|| Error::input("Audio file has no sample rate"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|e| Error::input(format!("Unsupported audio codec: {}", e)))?;

    let mut mono = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(DecodeError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(DecodeError::ResetRequired) => break,
            Err(e) => return Err(Error::input(format!("Could not read audio: {}", e))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(DecodeError::DecodeError(e)) => {
                debug!("Skipping undecodable audio packet: {}", e);
                continue;
            }
            Err(e) => return Err(Error::input(format!("Could not decode audio: {}", e))),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        samples.copy_interleaved_ref(decoded);

        for frame in samples.samples().chunks(channels) {
            mono.push(frame.iter().sum::<f32>() / channels as f32);
        }
    }

    if mono.is_empty() {
        return Err(Error::input("Audio file contains no samples"));
    }

    let resampled = resample_linear(&mono, source_rate, TARGET_SAMPLE_RATE);
    write_wav(dest, &resampled)?;
    debug!(
        "Transcoded {:?} ({} Hz, {} samples) to {:?}",
        src,
        source_rate,
        mono.len(),
        dest
    );
    Ok(())
}

/// Linear interpolation resampler, adequate for a classifier front end
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (samples.len() as u64 * to_rate as u64 / from_rate as u64).max(1) as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let position = i as f64 * ratio;
            let index = (position.floor() as usize).min(last);
            let next = (index + 1).min(last);
            let fraction = (position - index as f64) as f32;
            samples[index] + (samples[next] - samples[index]) * fraction
        })
        .collect()
}

fn write_wav(dest: &Path, samples: &[f32]) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: TARGET_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let wav_error = |e: hound::Error| Error::artifact(format!("cannot write WAV: {}", e));

    let mut writer = hound::WavWriter::create(dest, spec).map_err(wav_error)?;
    for sample in samples {
        let scaled = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        writer.write_sample(scaled).map_err(wav_error)?;
    }
    writer.finalize().map_err(wav_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_content_type_guessed_from_name() {
        assert_eq!(content_type(None, "trap.JPG"), "image/jpeg");
        assert_eq!(content_type(Some(""), "clip.mp3"), "audio/mpeg");
        assert_eq!(content_type(Some("Image/PNG"), "whatever"), "image/png");
        assert_eq!(content_type(None, "no_extension"), "");
    }

    #[test]
    fn test_image_types() {
        assert!(check_image("image/jpeg").is_ok());
        assert!(check_image("image/png").is_ok());
        assert!(check_image("image/jpg").is_ok());
        assert!(matches!(check_image("image/gif"), Err(Error::Input(_))));
        assert!(matches!(check_image("text/plain"), Err(Error::Input(_))));
    }

    #[test]
    fn test_audio_types() {
        assert!(check_audio("audio/wav", None).is_ok());
        assert!(check_audio("audio/x-wav", None).is_ok());
        assert!(check_audio("audio/mpeg", None).is_ok());
        assert!(check_audio("audio/ogg", None).is_err());
        assert!(check_audio("audio/webm", Some(MICROPHONE_SOURCE)).is_ok());
        assert!(check_audio("audio/webm", Some("upload")).is_err());
    }

    #[test]
    fn test_is_mp3() {
        assert!(is_mp3("audio/mpeg", "clip"));
        assert!(is_mp3("", "Clip.MP3"));
        assert!(!is_mp3("audio/wav", "clip.wav"));
    }

    #[test]
    fn test_resample_halves_length() {
        let samples: Vec<f32> = (0..32_000).map(|i| (i % 100) as f32 / 100.0).collect();

        let out = resample_linear(&samples, 32_000, 16_000);

        assert_eq!(out.len(), 16_000);
        assert_eq!(out[0], samples[0]);
        assert_eq!(out[1], samples[2]);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let samples = vec![0.1, -0.2, 0.3];
        assert_eq!(resample_linear(&samples, 16_000, 16_000), samples);
    }

    #[test]
    fn test_transcode_stereo_wav_to_mono_16k() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("field.wav");
        let dest = dir.path().join("field_16k.wav");

        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&src, spec).unwrap();
        for i in 0..44_100 {
            let value = ((i as f32 * 0.05).sin() * 8_000.0) as i16;
            writer.write_sample(value).unwrap();
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();

        transcode_to_wav(&src, &dest).unwrap();

        let reader = hound::WavReader::open(&dest).unwrap();
        let out = reader.spec();
        assert_eq!(out.channels, 1);
        assert_eq!(out.sample_rate, TARGET_SAMPLE_RATE);
        assert_eq!(out.bits_per_sample, 16);
        let frames = reader.duration() as i64;
        assert!((frames - 16_000).abs() < 200, "got {} frames", frames);
    }

    #[test]
    fn test_transcode_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("broken.mp3");
        std::fs::write(&src, b"definitely not audio").unwrap();

        let err = transcode_to_wav(&src, &dir.path().join("out.wav")).unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }
}
