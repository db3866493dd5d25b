//! Typed audio frame handed from the Frame Resampler to the classifier and VAD.

/// A contiguous block of mono 16-bit PCM samples at a known sample rate.
///
/// When submitted for detection its length always equals the classifier's
/// `frame_length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Mono signed 16-bit samples.
    pub samples: Vec<i16>,
    /// Sample rate in Hz (e.g. 16000, 48000).
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Returns the duration of this frame in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the frame contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Root-mean-square level normalised to [0.0, 1.0].
    pub fn rms(&self) -> f32 {
        rms(&self.samples)
    }
}

/// RMS of raw samples, normalised to [0.0, 1.0]. Empty input is silent.
pub fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples
        .iter()
        .map(|&s| {
            let v = f64::from(s) / 32768.0;
            v * v
        })
        .sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rms_of_square_wave() {
        let samples: Vec<i16> = (0..320)
            .map(|i| if i % 2 == 0 { 16384 } else { -16384 })
            .collect();
        let frame = AudioFrame::new(samples, 16_000);
        assert_relative_eq!(frame.rms(), 0.5, epsilon = 1e-4);
    }

    #[test]
    fn empty_frame_is_silent() {
        let frame = AudioFrame::new(Vec::new(), 16_000);
        assert!(frame.is_empty());
        assert_eq!(frame.rms(), 0.0);
    }

    #[test]
    fn duration_follows_sample_rate() {
        let frame = AudioFrame::new(vec![0; 512], 16_000);
        assert_relative_eq!(frame.duration_secs(), 0.032, epsilon = 1e-9);
    }
}
