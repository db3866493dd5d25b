//! Inbound voice-channel audio.
//!
//! # Byte layout contract
//!
//! Every listener reads a byte stream of interleaved stereo PCM, signed
//! 16-bit little-endian, at [`SOURCE_SAMPLE_RATE`]. A zero-length read means
//! the participant's stream has ended. How the transport decodes audio off
//! the wire is not this crate's concern; it only hands over an
//! [`AudioStream`] through [`AudioSource`].

pub mod resample;
pub mod wav;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::Result;

/// Source rate of voice-channel audio (Hz).
pub const SOURCE_SAMPLE_RATE: u32 = 48_000;
/// Interleaved channels in the source stream.
pub const SOURCE_CHANNELS: usize = 2;
pub const BYTES_PER_SAMPLE: usize = 2;
/// Rate the wake-word classifier consumes (Hz).
pub const TARGET_SAMPLE_RATE: u32 = 16_000;
/// Bytes requested per upstream read: 20 ms of 48 kHz stereo s16le.
pub const READ_CHUNK_BYTES: usize = 3_840;

/// Raw participant audio as delivered by the transport.
pub type AudioStream = Box<dyn AsyncRead + Send + Unpin>;

/// Per-participant audio collaborator.
///
/// A listener calls `open` once per run. `Ok(None)` means the participant
/// currently has no audio stream (e.g. not speaking yet), and the run ends
/// without error.
#[async_trait]
pub trait AudioSource: Send + Sync + 'static {
    /// Display name of the participant this source belongs to.
    fn participant(&self) -> &str;

    async fn open(&self) -> Result<Option<AudioStream>>;
}
