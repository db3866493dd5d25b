//! Wake-word classification.
//!
//! The `WakeWordClassifier` trait decouples the scanner from any specific
//! keyword-spotting engine. An engine is built from a model file, one keyword
//! file per phrase and a sensitivity per keyword, and then reports per frame
//! which keyword (if any) it heard.

pub mod energy;
pub mod scanner;

pub use energy::EnergyTriggerClassifier;
pub use scanner::{Detection, ScanOutcome, WakeWordScanner};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{DittiesError, Result};

/// Contract for keyword-spotting backends.
pub trait WakeWordClassifier: Send + 'static {
    /// Exact number of samples `process` expects per call.
    fn frame_length(&self) -> usize;

    /// Sample rate (Hz) the frames must be recorded at.
    fn sample_rate(&self) -> u32;

    /// Classify one mono frame.
    ///
    /// # Returns
    /// The index of the detected keyword in the configured keyword list, or
    /// `None` when nothing matched this frame.
    fn process(&mut self, frame: &[i16]) -> Result<Option<usize>>;
}

impl WakeWordClassifier for Box<dyn WakeWordClassifier> {
    fn frame_length(&self) -> usize {
        (**self).frame_length()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn process(&mut self, frame: &[i16]) -> Result<Option<usize>> {
        (**self).process(frame)
    }
}

/// Construction parameters shared by classifier backends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierConfig {
    pub model_path: PathBuf,
    /// One file per wake phrase; detections report an index into this list.
    pub keyword_paths: Vec<PathBuf>,
    /// Per-keyword sensitivity in [0.0, 1.0]. Higher means more detections
    /// and more false alarms.
    pub sensitivities: Vec<f32>,
}

impl ClassifierConfig {
    /// Check the configuration is internally consistent.
    ///
    /// # Errors
    /// `DittiesError::Config` if there are no keywords, the sensitivity count
    /// does not match the keyword count, or a sensitivity is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.keyword_paths.is_empty() {
            return Err(DittiesError::Config(
                "at least one wake-word keyword is required".into(),
            ));
        }
        if self.sensitivities.len() != self.keyword_paths.len() {
            return Err(DittiesError::Config(format!(
                "{} keywords but {} sensitivities",
                self.keyword_paths.len(),
                self.sensitivities.len()
            )));
        }
        if let Some(bad) = self
            .sensitivities
            .iter()
            .find(|s| !(0.0..=1.0).contains(*s))
        {
            return Err(DittiesError::Config(format!(
                "sensitivity {bad} is outside 0.0–1.0"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(keywords: usize, sensitivities: &[f32]) -> ClassifierConfig {
        ClassifierConfig {
            model_path: "params.pv".into(),
            keyword_paths: (0..keywords)
                .map(|i| PathBuf::from(format!("kw{i}.ppn")))
                .collect(),
            sensitivities: sensitivities.to_vec(),
        }
    }

    #[test]
    fn accepts_matching_keywords_and_sensitivities() {
        assert!(config(3, &[0.5, 0.5, 0.5]).validate().is_ok());
    }

    #[test]
    fn rejects_empty_keyword_list() {
        assert!(matches!(
            config(0, &[]).validate(),
            Err(DittiesError::Config(_))
        ));
    }

    #[test]
    fn rejects_count_mismatch() {
        assert!(config(2, &[0.5]).validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_sensitivity() {
        assert!(config(1, &[1.5]).validate().is_err());
        assert!(config(1, &[-0.1]).validate().is_err());
    }
}
