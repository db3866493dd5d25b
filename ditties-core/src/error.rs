use thiserror::Error;

/// All errors produced by ditties-core.
#[derive(Debug, Error)]
pub enum DittiesError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("wake-word classifier error: {0}")]
    Classifier(String),

    #[error("classifier expects {expected} Hz audio but the resampler produces {actual} Hz")]
    SampleRateMismatch { expected: u32, actual: u32 },

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("resampler error: {0}")]
    Resampler(String),

    #[error("transcription error: {0}")]
    Transcription(String),

    #[error("song catalog error: {0}")]
    Catalog(String),

    #[error("playback error: {0}")]
    Playback(String),

    #[error("voice channel disconnected")]
    Disconnected,

    #[error("worker is already running")]
    AlreadyRunning,

    #[error("worker is still stopping")]
    Stopping,

    #[error("worker is not running")]
    NotRunning,

    #[error("operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DittiesError {
    /// `true` for faults that abandon the current frame/utterance but never
    /// end the owning loop.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DittiesError::Io(_)
                | DittiesError::AudioStream(_)
                | DittiesError::Transcription(_)
                | DittiesError::Catalog(_)
                | DittiesError::Playback(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DittiesError>;
