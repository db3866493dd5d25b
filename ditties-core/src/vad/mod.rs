//! Speech/silence gating shared by utterance capture and the energy trigger.

pub mod energy;

pub use energy::EnergyVad;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadDecision {
    Speech,
    /// Below threshold and past any hangover.
    Silence,
}

impl VadDecision {
    pub fn is_speech(self) -> bool {
        self == VadDecision::Speech
    }
}

/// Frame-by-frame voice activity detector. Implementors may keep state
/// between frames, so feed one stream per instance.
pub trait VoiceActivityDetector: Send + 'static {
    fn classify(&mut self, samples: &[i16]) -> VadDecision;

    fn reset(&mut self);
}
