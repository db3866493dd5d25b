//! Wake-Word Scanner: frame-synchronous detection loop.

use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::WakeWordClassifier;
use crate::audio::resample::FrameResampler;
use crate::error::{DittiesError, Result};

/// A positive classifier result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    /// Index into the classifier's keyword list.
    pub keyword_index: usize,
    /// Frames submitted during the scan that produced this detection.
    pub frames_scanned: u64,
}

/// How a scan ended without being cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Detected(Detection),
    /// The upstream stream closed before any keyword was heard.
    StreamEnded,
}

/// Pulls `frame_length` samples at a time and submits them to the classifier
/// until it reports a keyword.
pub struct WakeWordScanner<C> {
    classifier: C,
    frame_length: usize,
    total_frames: u64,
}

impl<C: WakeWordClassifier> WakeWordScanner<C> {
    /// Pair a classifier with the resampler it will read from.
    ///
    /// # Errors
    /// - `DittiesError::SampleRateMismatch` when the classifier's rate differs
    ///   from the resampler's target rate.
    /// - `DittiesError::Classifier` for a zero frame length.
    pub fn new<R>(classifier: C, resampler: &FrameResampler<R>) -> Result<Self> {
        if classifier.sample_rate() != resampler.target_rate() {
            return Err(DittiesError::SampleRateMismatch {
                expected: classifier.sample_rate(),
                actual: resampler.target_rate(),
            });
        }
        let frame_length = classifier.frame_length();
        if frame_length == 0 {
            return Err(DittiesError::Classifier(
                "classifier reports a zero frame length".into(),
            ));
        }
        Ok(Self {
            classifier,
            frame_length,
            total_frames: 0,
        })
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    /// Frames submitted across every scan so far.
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Scan until a keyword is detected or the stream ends.
    ///
    /// Returns immediately after the first positive frame; no further frames
    /// are pulled within this call.
    ///
    /// # Errors
    /// - `DittiesError::Cancelled` as soon as `cancel` fires, even mid-read.
    /// - Read and classifier errors are propagated.
    pub async fn scan<R: AsyncRead + Unpin>(
        &mut self,
        resampler: &mut FrameResampler<R>,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome> {
        let mut frames_scanned = 0u64;
        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DittiesError::Cancelled),
                pulled = resampler.pull(self.frame_length) => pulled?,
            };
            let Some(frame) = frame else {
                debug!(frames_scanned, "stream ended while waiting for wake word");
                return Ok(ScanOutcome::StreamEnded);
            };

            frames_scanned += 1;
            self.total_frames += 1;
            if let Some(keyword_index) = self.classifier.process(&frame.samples)? {
                debug!(keyword_index, frames_scanned, "wake word detected");
                return Ok(ScanOutcome::Detected(Detection {
                    keyword_index,
                    frames_scanned,
                }));
            }
            trace!(frames_scanned, "no keyword in frame");
        }
    }
}
