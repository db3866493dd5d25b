//! File-backed participant audio for running without a voice transport.
//!
//! `.wav` files must already be in the voice-channel layout (48 kHz stereo
//! 16-bit PCM). Anything else is read as raw interleaved s16le bytes.

use std::path::PathBuf;

use async_trait::async_trait;
use ditties_core::audio::wav::read_wav_bytes;
use ditties_core::error::{DittiesError, Result};
use ditties_core::{AudioSource, AudioStream};
use tracing::debug;

pub struct FileAudioSource {
    participant: String,
    path: PathBuf,
}

impl FileAudioSource {
    pub fn new(participant: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            participant: participant.into(),
            path: path.into(),
        }
    }

    fn is_wav(&self) -> bool {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
    }
}

#[async_trait]
impl AudioSource for FileAudioSource {
    fn participant(&self) -> &str {
        &self.participant
    }

    async fn open(&self) -> Result<Option<AudioStream>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no audio file for participant");
            return Ok(None);
        }
        if self.is_wav() {
            let path = self.path.clone();
            let bytes = tokio::task::spawn_blocking(move || read_wav_bytes(&path))
                .await
                .map_err(|e| DittiesError::AudioStream(e.to_string()))??;
            return Ok(Some(Box::new(std::io::Cursor::new(bytes))));
        }
        let file = tokio::fs::File::open(&self.path).await?;
        Ok(Some(Box::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tokio::io::AsyncReadExt;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ditties-{}-{name}", std::process::id()))
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

    #[tokio::test]
    async fn wav_source_yields_interleaved_le_bytes() {
        let path = temp_path("ok.wav");
        write_wav(&path, 48_000, 2, &[1, -1, 256, 0]);

        let source = FileAudioSource::new("alice", &path);
        let mut stream = source.open().await.unwrap().unwrap();
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).await.unwrap();
        assert_eq!(bytes, vec![1, 0, 0xff, 0xff, 0, 1, 0, 0]);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn missing_file_means_no_stream() {
        let source = FileAudioSource::new("bob", temp_path("missing.raw"));
        assert!(source.open().await.unwrap().is_none());
    }
}
