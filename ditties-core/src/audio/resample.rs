//! Frame Resampler: interleaved 48 kHz stereo s16le bytes → 16 kHz mono frames.
//!
//! ## Design
//!
//! Voice-channel audio arrives as interleaved stereo, 16-bit little-endian,
//! at 48 kHz. The wake-word classifier wants mono 16 kHz frames of a fixed
//! length. `FrameResampler` owns the upstream byte stream and a
//! [`RollingSampleBuffer`] and hands out exactly-sized frames on demand.
//!
//! Two conversion modes exist:
//!
//! - [`ResampleMode::Decimate`] (default): for every group of
//!   `2 channels · 2 bytes · R` input bytes (12 bytes at 48k→16k) only the
//!   first frame's left-channel sample is kept. No filtering, so aliasing is
//!   expected; wake-word timing is bit-compatible with existing deployments.
//! - [`ResampleMode::Filtered`]: every left-channel sample is decoded and run
//!   through a rubato `FastFixedIn` polynomial resampler.
//!
//! Partial groups at the end of one read are carried into the next, so the
//! output never depends on how the stream happened to be chunked. At end of
//! stream the carried remainder is dropped.
//!
//! ## Usage
//!
//! ```ignore
//! let mut rs = FrameResampler::new(stream, ResamplerConfig::default())?;
//! while let Some(frame) = rs.pull(512).await? {
//!     classifier.process(&frame.samples)?;
//! }
//! ```

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};

use crate::audio::{
    BYTES_PER_SAMPLE, READ_CHUNK_BYTES, SOURCE_CHANNELS, SOURCE_SAMPLE_RATE, TARGET_SAMPLE_RATE,
};
use crate::buffering::{frame::AudioFrame, RollingSampleBuffer};
use crate::error::{DittiesError, Result};

/// Input frames per rubato call in filtered mode (20 ms at 48 kHz).
const FILTER_CHUNK: usize = 960;

/// How source samples become target-rate samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleMode {
    /// Keep one left-channel sample per `R` stereo frames.
    #[default]
    Decimate,
    /// Band-limited polynomial resampling of the left channel.
    Filtered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResamplerConfig {
    pub source_rate: u32,
    pub target_rate: u32,
    pub mode: ResampleMode,
    /// Bytes requested from the upstream stream per read.
    pub read_chunk_bytes: usize,
}

impl Default for ResamplerConfig {
    fn default() -> Self {
        Self {
            source_rate: SOURCE_SAMPLE_RATE,
            target_rate: TARGET_SAMPLE_RATE,
            mode: ResampleMode::Decimate,
            read_chunk_bytes: READ_CHUNK_BYTES,
        }
    }
}

/// Pulls fixed-length mono frames at the target rate out of a raw stream.
pub struct FrameResampler<R> {
    reader: R,
    read_buf: Vec<u8>,
    /// Bytes of an incomplete input group left over from the previous read.
    carry: Vec<u8>,
    /// Decoded samples from the latest read, before they enter `buffer`.
    scratch: Vec<i16>,
    decoder: Decoder,
    buffer: RollingSampleBuffer,
    target_rate: u32,
    closed: bool,
    bytes_consumed: u64,
}

enum Decoder {
    Decimate { group_bytes: usize },
    Filtered(BandLimited),
}

impl Decoder {
    fn group_bytes(&self) -> usize {
        match self {
            Decoder::Decimate { group_bytes } => *group_bytes,
            Decoder::Filtered(_) => SOURCE_CHANNELS * BYTES_PER_SAMPLE,
        }
    }
}

impl<R> FrameResampler<R> {
    /// Create a resampler reading from `reader`.
    ///
    /// # Errors
    /// Returns `DittiesError::Config` when decimation is requested for a
    /// non-integer rate ratio, or `DittiesError::Resampler` if rubato fails
    /// to initialise.
    pub fn new(reader: R, config: ResamplerConfig) -> Result<Self> {
        if config.source_rate == 0 || config.target_rate == 0 {
            return Err(DittiesError::Config("sample rates must be non-zero".into()));
        }
        if config.target_rate > config.source_rate {
            return Err(DittiesError::Config(format!(
                "cannot upsample from {} Hz to {} Hz",
                config.source_rate, config.target_rate
            )));
        }

        let decoder = match config.mode {
            ResampleMode::Decimate => {
                if config.source_rate % config.target_rate != 0 {
                    return Err(DittiesError::Config(format!(
                        "decimation needs an integer ratio, got {} Hz → {} Hz",
                        config.source_rate, config.target_rate
                    )));
                }
                let ratio = (config.source_rate / config.target_rate) as usize;
                Decoder::Decimate {
                    group_bytes: SOURCE_CHANNELS * BYTES_PER_SAMPLE * ratio,
                }
            }
            ResampleMode::Filtered => Decoder::Filtered(BandLimited::new(
                config.source_rate,
                config.target_rate,
                FILTER_CHUNK,
            )?),
        };

        let read_chunk_bytes = config.read_chunk_bytes.max(decoder.group_bytes());
        debug!(
            mode = ?config.mode,
            source_rate = config.source_rate,
            target_rate = config.target_rate,
            group_bytes = decoder.group_bytes(),
            "frame resampler created"
        );

        Ok(Self {
            reader,
            read_buf: vec![0u8; read_chunk_bytes],
            carry: Vec::with_capacity(decoder.group_bytes()),
            scratch: Vec::with_capacity(read_chunk_bytes / decoder.group_bytes() + 1),
            buffer: RollingSampleBuffer::with_capacity(read_chunk_bytes),
            decoder,
            target_rate: config.target_rate,
            closed: false,
            bytes_consumed: 0,
        })
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// `true` once the upstream stream has signalled end-of-stream.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Decoded samples waiting in the rolling window.
    pub fn buffered_samples(&self) -> usize {
        self.buffer.len()
    }

    pub fn bytes_consumed(&self) -> u64 {
        self.bytes_consumed
    }

    /// Borrow the raw upstream stream, e.g. to hand it to transcription.
    pub fn stream_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Drop buffered samples and any partial input group.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.carry.clear();
        if let Decoder::Filtered(ref mut f) = self.decoder {
            f.reset();
        }
    }
}

impl<R: AsyncRead + Unpin> FrameResampler<R> {
    /// Suspend until `min_samples` target-rate samples are available and
    /// return exactly that many.
    ///
    /// Returns `Ok(None)` once the stream has ended; samples that never
    /// filled a whole frame are discarded at that point.
    ///
    /// # Errors
    /// Propagates read failures from the upstream stream.
    pub async fn pull(&mut self, min_samples: usize) -> Result<Option<AudioFrame>> {
        while self.buffer.len() < min_samples {
            if self.closed {
                return Ok(None);
            }

            let n = self.reader.read(&mut self.read_buf).await?;
            if n == 0 {
                self.closed = true;
                debug!(
                    dropped_bytes = self.carry.len(),
                    dropped_samples = self.buffer.len(),
                    "upstream audio stream closed"
                );
                self.carry.clear();
                return Ok(None);
            }
            self.bytes_consumed += n as u64;

            self.scratch.clear();
            match self.decoder {
                Decoder::Decimate { group_bytes } => decode_decimated(
                    &mut self.carry,
                    &self.read_buf[..n],
                    group_bytes,
                    &mut self.scratch,
                ),
                Decoder::Filtered(ref mut filter) => {
                    filter.decode(&mut self.carry, &self.read_buf[..n], &mut self.scratch)?
                }
            }

            self.buffer
                .reserve_total(self.buffer.len() + self.scratch.len());
            self.buffer.push(&self.scratch);
        }

        let mut samples = vec![0i16; min_samples];
        let n = self.buffer.pop_into(&mut samples);
        debug_assert_eq!(n, min_samples);
        Ok(Some(AudioFrame::new(samples, self.target_rate)))
    }
}

/// Keep the left-channel sample of the first stereo frame of every
/// `group_bytes`-sized group. Incomplete trailing bytes go to `carry`.
fn decode_decimated(carry: &mut Vec<u8>, input: &[u8], group_bytes: usize, out: &mut Vec<i16>) {
    let mut rest = input;

    if !carry.is_empty() {
        let need = group_bytes - carry.len();
        if rest.len() < need {
            carry.extend_from_slice(rest);
            return;
        }
        carry.extend_from_slice(&rest[..need]);
        rest = &rest[need..];
        out.push(i16::from_le_bytes([carry[0], carry[1]]));
        carry.clear();
    }

    let mut groups = rest.chunks_exact(group_bytes);
    for group in &mut groups {
        out.push(i16::from_le_bytes([group[0], group[1]]));
    }
    carry.extend_from_slice(groups.remainder());
}

/// Band-limited left-channel resampler built on rubato.
struct BandLimited {
    /// `None` when source rate == target rate (passthrough).
    resampler: Option<FastFixedIn<f32>>,
    /// Partial input chunks waiting for a full rubato block.
    input_buf: Vec<f32>,
    chunk_size: usize,
    /// Pre-allocated output buffer: `[1][output_frames_max]`.
    output_buf: Vec<Vec<f32>>,
}

impl BandLimited {
    fn new(source_rate: u32, target_rate: u32, chunk_size: usize) -> Result<Self> {
        if source_rate == target_rate {
            return Ok(Self {
                resampler: None,
                input_buf: Vec::new(),
                chunk_size,
                output_buf: Vec::new(),
            });
        }

        let ratio = target_rate as f64 / source_rate as f64;
        let resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0, // fixed ratio
            PolynomialDegree::Cubic,
            chunk_size,
            1, // mono
        )
        .map_err(|e| DittiesError::Resampler(format!("resampler init: {e}")))?;

        let max_out = resampler.output_frames_max();
        info!(
            source_rate,
            target_rate, chunk_size, max_out, "band-limited resampling enabled"
        );

        Ok(Self {
            resampler: Some(resampler),
            input_buf: Vec::with_capacity(chunk_size * 2),
            chunk_size,
            output_buf: vec![vec![0f32; max_out]; 1],
        })
    }

    fn decode(&mut self, carry: &mut Vec<u8>, input: &[u8], out: &mut Vec<i16>) -> Result<()> {
        const FRAME: usize = SOURCE_CHANNELS * BYTES_PER_SAMPLE;

        let mut left = Vec::with_capacity(input.len() / FRAME + 1);
        let mut rest = input;
        if !carry.is_empty() {
            let need = FRAME - carry.len();
            if rest.len() < need {
                carry.extend_from_slice(rest);
                return Ok(());
            }
            carry.extend_from_slice(&rest[..need]);
            rest = &rest[need..];
            left.push(i16::from_le_bytes([carry[0], carry[1]]));
            carry.clear();
        }
        let mut frames = rest.chunks_exact(FRAME);
        for frame in &mut frames {
            left.push(i16::from_le_bytes([frame[0], frame[1]]));
        }
        carry.extend_from_slice(frames.remainder());

        let Some(ref mut resampler) = self.resampler else {
            out.extend_from_slice(&left);
            return Ok(());
        };

        self.input_buf
            .extend(left.iter().map(|&s| s as f32 / 32768.0));

        while self.input_buf.len() >= self.chunk_size {
            let input_slice = &self.input_buf[..self.chunk_size];
            let (_consumed, produced) = resampler
                .process_into_buffer(&[input_slice], &mut self.output_buf, None)
                .map_err(|e| DittiesError::Resampler(e.to_string()))?;
            out.extend(
                self.output_buf[0][..produced]
                    .iter()
                    .map(|&v| (v * 32768.0).round().clamp(-32768.0, 32767.0) as i16),
            );
            self.input_buf.drain(..self.chunk_size);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.input_buf.clear();
        if let Some(ref mut resampler) = self.resampler {
            resampler.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Serves `data` in reads whose sizes cycle through `sizes`.
    struct ChunkedReader {
        data: Vec<u8>,
        pos: usize,
        sizes: Vec<usize>,
        next: usize,
    }

    impl ChunkedReader {
        fn new(data: Vec<u8>, sizes: &[usize]) -> Self {
            Self {
                data,
                pos: 0,
                sizes: sizes.to_vec(),
                next: 0,
            }
        }
    }

    impl AsyncRead for ChunkedReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let this = &mut *self;
            let size = this.sizes[this.next % this.sizes.len()];
            this.next += 1;
            let n = size
                .min(buf.remaining())
                .min(this.data.len() - this.pos);
            buf.put_slice(&this.data[this.pos..this.pos + n]);
            this.pos += n;
            Poll::Ready(Ok(()))
        }
    }

    /// `groups` decimation groups where group `i` carries left sample `i`
    /// and noise everywhere else.
    fn stereo_groups(groups: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(groups * 12);
        for i in 0..groups {
            let left = (i as i16).wrapping_mul(7).wrapping_sub(300);
            bytes.extend_from_slice(&left.to_le_bytes());
            for _ in 0..5 {
                bytes.extend_from_slice(&i16::MAX.to_le_bytes());
            }
        }
        bytes
    }

    fn expected_samples(groups: usize) -> Vec<i16> {
        (0..groups)
            .map(|i| (i as i16).wrapping_mul(7).wrapping_sub(300))
            .collect()
    }

    async fn drain(rs: &mut FrameResampler<ChunkedReader>, frame: usize) -> Vec<i16> {
        let mut out = Vec::new();
        while let Some(f) = rs.pull(frame).await.unwrap() {
            assert_eq!(f.len(), frame);
            assert_eq!(f.sample_rate, 16_000);
            out.extend_from_slice(&f.samples);
        }
        out
    }

    #[tokio::test]
    async fn decimation_keeps_first_left_sample_of_each_group() {
        let mut bytes = Vec::new();
        // One group: L=0x0102, R=junk, then two more stereo frames of junk.
        bytes.extend_from_slice(&[0x02, 0x01, 0xAA, 0xBB]);
        bytes.extend_from_slice(&[0xCC; 8]);
        let reader = ChunkedReader::new(bytes, &[4096]);
        let mut rs = FrameResampler::new(reader, ResamplerConfig::default()).unwrap();

        let frame = rs.pull(1).await.unwrap().expect("one sample");
        assert_eq!(frame.samples, vec![0x0102]);
        assert!(rs.pull(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn output_is_independent_of_read_chunking() {
        let groups = 2_000;
        let frame = 160;
        let expected = &expected_samples(groups)[..(groups / frame) * frame];

        for sizes in [&[3840][..], &[1][..], &[5, 7, 11][..], &[13, 1000, 12, 25][..]] {
            let reader = ChunkedReader::new(stereo_groups(groups), sizes);
            let mut rs = FrameResampler::new(reader, ResamplerConfig::default()).unwrap();
            let got = drain(&mut rs, frame).await;
            assert_eq!(got, expected, "read sizes {sizes:?}");
        }
    }

    #[tokio::test]
    async fn trailing_partial_group_is_discarded_at_end_of_stream() {
        let mut bytes = stereo_groups(3);
        bytes.extend_from_slice(&[0x11; 11]);
        let reader = ChunkedReader::new(bytes, &[4]);
        let mut rs = FrameResampler::new(reader, ResamplerConfig::default()).unwrap();

        assert_eq!(drain(&mut rs, 1).await, expected_samples(3));
        assert!(rs.is_closed());
        // Further pulls keep reporting end of stream instead of blocking.
        assert!(rs.pull(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn short_stream_never_emits_a_partial_frame() {
        let reader = ChunkedReader::new(stereo_groups(100), &[64]);
        let mut rs = FrameResampler::new(reader, ResamplerConfig::default()).unwrap();
        assert!(rs.pull(512).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn leftover_samples_survive_between_pulls() {
        let reader = ChunkedReader::new(stereo_groups(10), &[120]);
        let mut rs = FrameResampler::new(reader, ResamplerConfig::default()).unwrap();
        let first = rs.pull(3).await.unwrap().unwrap();
        assert_eq!(first.samples, expected_samples(10)[..3]);
        assert_eq!(rs.buffered_samples(), 7);
        let second = rs.pull(7).await.unwrap().unwrap();
        assert_eq!(second.samples, expected_samples(10)[3..]);
    }

    #[test]
    fn non_integer_ratio_is_rejected_for_decimation() {
        let config = ResamplerConfig {
            source_rate: 44_100,
            ..ResamplerConfig::default()
        };
        let err = FrameResampler::new(tokio::io::empty(), config).err();
        assert!(matches!(err, Some(DittiesError::Config(_))));
    }

    #[tokio::test]
    async fn filtered_mode_produces_roughly_a_third_of_the_input() {
        // One second of 48 kHz stereo silence.
        let bytes = vec![0u8; 48_000 * 4];
        let reader = ChunkedReader::new(bytes, &[3840]);
        let config = ResamplerConfig {
            mode: ResampleMode::Filtered,
            ..ResamplerConfig::default()
        };
        let mut rs = FrameResampler::new(reader, config).unwrap();
        let got = drain(&mut rs, 160).await;
        let expected = 16_000usize;
        assert!(
            (got.len() as isize - expected as isize).unsigned_abs() <= 400,
            "output len={} expected≈{}",
            got.len(),
            expected
        );
        assert!(got.iter().all(|&s| s == 0));
    }
}
