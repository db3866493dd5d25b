//! RMS gate with hangover.
//!
//! A frame at or above `threshold` is speech and re-arms the hangover. Quiet
//! frames still count as speech while hangover remains, so word endings are
//! not clipped. The gate also counts how many loud frames arrived in a row,
//! which the energy trigger uses as its firing condition.

use super::{VadDecision, VoiceActivityDetector};
use crate::buffering::frame::rms;

#[derive(Debug, Clone)]
pub struct EnergyVad {
    threshold: f32,
    hangover_frames: u32,
    hangover_left: u32,
    /// Consecutive frames at or above threshold (hangover frames excluded).
    loud_run: u32,
}

impl EnergyVad {
    /// `threshold` is a normalised RMS level; 0.02 suits voice-channel audio.
    pub fn new(threshold: f32, hangover_frames: u32) -> Self {
        Self {
            threshold,
            hangover_frames,
            hangover_left: 0,
            loud_run: 0,
        }
    }

    pub fn loud_run(&self) -> u32 {
        self.loud_run
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(0.02, 4)
    }
}

impl VoiceActivityDetector for EnergyVad {
    fn classify(&mut self, samples: &[i16]) -> VadDecision {
        if !samples.is_empty() && rms(samples) >= self.threshold {
            self.loud_run = self.loud_run.saturating_add(1);
            self.hangover_left = self.hangover_frames;
            return VadDecision::Speech;
        }
        self.loud_run = 0;
        match self.hangover_left.checked_sub(1) {
            Some(left) => {
                self.hangover_left = left;
                VadDecision::Speech
            }
            None => VadDecision::Silence,
        }
    }

    fn reset(&mut self) {
        self.hangover_left = 0;
        self.loud_run = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIET: [i16; 320] = [0; 320];
    const LOUD: [i16; 320] = [12_000; 320];

    #[test]
    fn hangover_bridges_short_pauses() {
        let mut vad = EnergyVad::new(0.02, 2);
        assert_eq!(vad.classify(&QUIET), VadDecision::Silence);
        assert_eq!(vad.classify(&LOUD), VadDecision::Speech);
        assert_eq!(vad.classify(&QUIET), VadDecision::Speech);
        assert_eq!(vad.classify(&QUIET), VadDecision::Speech);
        assert_eq!(vad.classify(&QUIET), VadDecision::Silence);
    }

    #[test]
    fn loud_run_ignores_hangover() {
        let mut vad = EnergyVad::new(0.02, 5);
        vad.classify(&LOUD);
        vad.classify(&LOUD);
        assert_eq!(vad.loud_run(), 2);
        assert!(vad.classify(&QUIET).is_speech());
        assert_eq!(vad.loud_run(), 0);
    }

    #[test]
    fn reset_drops_pending_hangover() {
        let mut vad = EnergyVad::new(0.02, 5);
        vad.classify(&LOUD);
        vad.reset();
        assert_eq!(vad.classify(&QUIET), VadDecision::Silence);
        assert_eq!(vad.classify(&[]), VadDecision::Silence);
    }
}
