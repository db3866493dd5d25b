//! WAV fixtures and recordings in the voice-channel layout.

use std::path::Path;

use super::{BYTES_PER_SAMPLE, SOURCE_CHANNELS, SOURCE_SAMPLE_RATE};
use crate::error::{DittiesError, Result};

/// Decode a WAV file into interleaved s16le bytes, exactly as a voice
/// channel would deliver them.
///
/// # Errors
/// `DittiesError::AudioStream` for unreadable files or any format other
/// than 48 kHz stereo 16-bit integer PCM.
pub fn read_wav_bytes(path: &Path) -> Result<Vec<u8>> {
    let mut reader =
        hound::WavReader::open(path).map_err(|e| DittiesError::AudioStream(e.to_string()))?;
    let spec = reader.spec();
    if spec.sample_rate != SOURCE_SAMPLE_RATE
        || usize::from(spec.channels) != SOURCE_CHANNELS
        || spec.bits_per_sample != 16
        || spec.sample_format != hound::SampleFormat::Int
    {
        return Err(DittiesError::AudioStream(format!(
            "{}: expected {SOURCE_SAMPLE_RATE} Hz stereo 16-bit PCM, got {} Hz {}ch {}-bit",
            path.display(),
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample
        )));
    }

    let mut bytes = Vec::with_capacity(reader.len() as usize * BYTES_PER_SAMPLE);
    for sample in reader.samples::<i16>() {
        let sample = sample.map_err(|e| DittiesError::AudioStream(e.to_string()))?;
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ditties-core-{}-{name}", std::process::id()))
    }

    fn write_wav(path: &Path, rate: u32, channels: u16, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut w = hound::WavWriter::create(path, spec).unwrap();
        for s in samples {
            w.write_sample(*s).unwrap();
        }
        w.finalize().unwrap();
    }

    #[test]
    fn stereo_48k_decodes_to_le_bytes() {
        let path = temp_path("ok.wav");
        write_wav(&path, 48_000, 2, &[1, -1, 256, 0]);
        assert_eq!(
            read_wav_bytes(&path).unwrap(),
            vec![1, 0, 0xff, 0xff, 0, 1, 0, 0]
        );
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn wrong_format_is_rejected() {
        let path = temp_path("mono.wav");
        write_wav(&path, 16_000, 1, &[0; 16]);
        assert!(matches!(
            read_wav_bytes(&path),
            Err(DittiesError::AudioStream(_))
        ));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_file_is_an_audio_error() {
        assert!(matches!(
            read_wav_bytes(&temp_path("absent.wav")),
            Err(DittiesError::AudioStream(_))
        ));
    }
}
