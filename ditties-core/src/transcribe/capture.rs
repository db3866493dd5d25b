//! End-of-utterance detection on the raw participant stream.
//!
//! ## Algorithm
//!
//! The stream is consumed in 20 ms blocks. Each block's left channel is run
//! through an [`EnergyVad`]:
//!
//! 1. Before speech starts, silent blocks count towards
//!    `max_leading_silence_ms`; exceeding it ends the capture with nothing.
//!    The latest silent block is kept as pre-roll.
//! 2. Once speech starts every block is kept, until `end_silence_ms` of
//!    trailing silence or `max_utterance_ms` in total.
//! 3. End of stream finishes the capture with whatever was kept.
//!
//! Durations are measured in stream time, not wall-clock time.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::audio::{BYTES_PER_SAMPLE, SOURCE_CHANNELS, SOURCE_SAMPLE_RATE};
use crate::error::{DittiesError, Result};
use crate::vad::{EnergyVad, VoiceActivityDetector};

const BLOCK_MS: u32 = 20;
const STEREO_FRAME_BYTES: usize = SOURCE_CHANNELS * BYTES_PER_SAMPLE;
const BLOCK_FRAMES: usize = (SOURCE_SAMPLE_RATE / 1000 * BLOCK_MS) as usize;
const BLOCK_BYTES: usize = BLOCK_FRAMES * STEREO_FRAME_BYTES;

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// VAD RMS threshold. Default: 0.02.
    pub vad_threshold: f32,
    /// VAD hangover in 20 ms blocks. Default: 4.
    pub vad_hangover_frames: u32,
    /// Trailing silence that ends an utterance. Default: 800 ms.
    pub end_silence_ms: u32,
    /// Give up if nobody speaks for this long after the wake word. Default: 4 s.
    pub max_leading_silence_ms: u32,
    /// Hard cap on utterance length. Default: 10 s.
    pub max_utterance_ms: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            vad_threshold: 0.02,
            vad_hangover_frames: 4,
            end_silence_ms: 800,
            max_leading_silence_ms: 4_000,
            max_utterance_ms: 10_000,
        }
    }
}

/// Left-channel samples of one captured utterance, at the source rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedUtterance {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl CapturedUtterance {
    pub fn duration_ms(&self) -> u64 {
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }

    /// Little-endian bytes of the mono samples.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

/// Read from `stream` until the utterance ends.
///
/// # Returns
/// `Ok(None)` when no speech was heard before the leading-silence limit or
/// the end of the stream.
///
/// # Errors
/// `DittiesError::Cancelled` when `cancel` fires; read errors otherwise.
pub async fn capture_utterance(
    stream: &mut (dyn AsyncRead + Send + Unpin),
    config: &CaptureConfig,
    cancel: &CancellationToken,
) -> Result<Option<CapturedUtterance>> {
    let mut vad = EnergyVad::new(config.vad_threshold, config.vad_hangover_frames);
    let mut block = vec![0u8; BLOCK_BYTES];
    let mut pre_roll: Vec<i16> = Vec::new();
    let mut kept: Vec<i16> = Vec::new();
    let mut speaking = false;
    let mut leading_ms = 0u32;
    let mut trailing_ms = 0u32;
    let mut total_ms = 0u32;

    loop {
        let filled = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DittiesError::Cancelled),
            n = fill_block(stream, &mut block) => n?,
        };
        if filled < STEREO_FRAME_BYTES {
            debug!(speaking, kept = kept.len(), "stream ended during capture");
            break;
        }

        let left: Vec<i16> = block[..filled - filled % STEREO_FRAME_BYTES]
            .chunks_exact(STEREO_FRAME_BYTES)
            .map(|f| i16::from_le_bytes([f[0], f[1]]))
            .collect();
        let block_ms = (left.len() as u32 * 1000) / SOURCE_SAMPLE_RATE;
        let is_speech = vad.classify(&left).is_speech();

        if !speaking {
            if is_speech {
                speaking = true;
                kept.append(&mut pre_roll);
                kept.extend_from_slice(&left);
                total_ms = block_ms;
                debug!("speech started after wake word");
            } else {
                leading_ms += block_ms;
                pre_roll = left;
                if leading_ms >= config.max_leading_silence_ms {
                    debug!(leading_ms, "no speech after wake word");
                    return Ok(None);
                }
            }
        } else {
            kept.extend_from_slice(&left);
            total_ms += block_ms;
            trailing_ms = if is_speech { 0 } else { trailing_ms + block_ms };
            if trailing_ms >= config.end_silence_ms {
                debug!(total_ms, "end of utterance (silence)");
                break;
            }
            if total_ms >= config.max_utterance_ms {
                debug!(total_ms, "end of utterance (max length)");
                break;
            }
        }

        if filled < BLOCK_BYTES {
            break;
        }
    }

    if !speaking {
        return Ok(None);
    }
    Ok(Some(CapturedUtterance {
        samples: kept,
        sample_rate: SOURCE_SAMPLE_RATE,
    }))
}

/// Fill `block` completely unless the stream ends first.
async fn fill_block(stream: &mut (dyn AsyncRead + Send + Unpin), block: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < block.len() {
        let n = stream.read(&mut block[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
