//! `EnergyTriggerClassifier`: development backend without a keyword model.
//!
//! Fires keyword 0 after a run of loud frames, so the whole assistant can be
//! exercised end-to-end (e.g. with a recorded clap or shout) before a real
//! keyword-spotting engine is wired in. Never use it where false alarms
//! matter.

use tracing::debug;

use super::{ClassifierConfig, WakeWordClassifier};
use crate::audio::TARGET_SAMPLE_RATE;
use crate::error::Result;
use crate::vad::{EnergyVad, VoiceActivityDetector};

/// 32 ms at 16 kHz.
pub const DEFAULT_FRAME_LENGTH: usize = 512;

/// Loud-run trigger standing in for a keyword model.
pub struct EnergyTriggerClassifier {
    vad: EnergyVad,
    frame_length: usize,
    /// Consecutive loud frames needed to trigger.
    min_frames: u32,
}

impl EnergyTriggerClassifier {
    /// Build from a classifier config; only the first keyword's sensitivity
    /// is used. Sensitivity 1.0 maps to an RMS threshold of 0.01, 0.0 to 0.21.
    ///
    /// # Errors
    /// Returns the config validation error.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        config.validate()?;
        let sensitivity = config.sensitivities[0];
        let threshold = 0.01 + (1.0 - sensitivity) * 0.2;
        debug!(threshold, "energy trigger classifier configured");
        Ok(Self::new(threshold, 8))
    }

    pub fn new(threshold: f32, min_frames: u32) -> Self {
        Self {
            vad: EnergyVad::new(threshold, 0),
            frame_length: DEFAULT_FRAME_LENGTH,
            min_frames: min_frames.max(1),
        }
    }
}

impl WakeWordClassifier for EnergyTriggerClassifier {
    fn frame_length(&self) -> usize {
        self.frame_length
    }

    fn sample_rate(&self) -> u32 {
        TARGET_SAMPLE_RATE
    }

    fn process(&mut self, frame: &[i16]) -> Result<Option<usize>> {
        self.vad.classify(frame);
        if self.vad.loud_run() >= self.min_frames {
            self.vad.reset();
            return Ok(Some(0));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triggers_after_consecutive_loud_frames() {
        let mut c = EnergyTriggerClassifier::new(0.05, 3);
        let loud = vec![12_000i16; DEFAULT_FRAME_LENGTH];
        let quiet = vec![0i16; DEFAULT_FRAME_LENGTH];

        assert_eq!(c.process(&loud).unwrap(), None);
        assert_eq!(c.process(&quiet).unwrap(), None);
        assert_eq!(c.process(&loud).unwrap(), None);
        assert_eq!(c.process(&loud).unwrap(), None);
        assert_eq!(c.process(&loud).unwrap(), Some(0));
        // Run resets after firing.
        assert_eq!(c.process(&loud).unwrap(), None);
    }

    #[test]
    fn from_config_rejects_invalid_sensitivity() {
        let config = ClassifierConfig {
            model_path: "m".into(),
            keyword_paths: vec!["k".into()],
            sensitivities: vec![2.0],
        };
        assert!(EnergyTriggerClassifier::from_config(&config).is_err());
    }
}
