//! Utterance Pipeline: hand the raw stream to a transcription collaborator
//! after a wake word and normalise what comes back.
//!
//! Transcription failures never escape this module as errors: they are
//! logged and reported as "no utterance", so one bad network call cannot end
//! a listener. Only cancellation is propagated.

pub mod capture;

#[cfg(feature = "wit")]
pub mod wit;

#[cfg(feature = "wit")]
pub use wit::{WitConfig, WitTranscriber};

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{DittiesError, Result};

/// A named intent extracted from transcribed speech.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub name: String,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub slots: BTreeMap<String, String>,
}

/// Text plus intents recognised after one wake word.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    #[serde(default)]
    pub intents: Vec<Intent>,
}

impl Utterance {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            intents: Vec::new(),
        }
    }

    pub fn intent(&self, name: &str) -> Option<&Intent> {
        self.intents.iter().find(|i| i.name == name)
    }
}

/// Contract for speech-to-text/intent services.
///
/// The implementation reads the raw participant stream (interleaved 48 kHz
/// stereo s16le) and decides for itself where the utterance ends.
#[async_trait]
pub trait Transcriber: Send + Sync + 'static {
    /// # Returns
    /// `Ok(None)` if nothing intelligible was captured.
    ///
    /// # Errors
    /// Any failure; the caller logs it and drops the utterance.
    async fn transcribe(
        &self,
        stream: &mut (dyn AsyncRead + Send + Unpin),
        cancel: &CancellationToken,
    ) -> Result<Option<Utterance>>;
}

/// Run the transcription collaborator and normalise its result.
///
/// Whitespace is trimmed; empty text is treated exactly like no utterance.
///
/// # Errors
/// Only `DittiesError::Cancelled`. Every other failure is logged and mapped
/// to `Ok(None)`.
pub async fn capture_and_transcribe(
    transcriber: &dyn Transcriber,
    stream: &mut (dyn AsyncRead + Send + Unpin),
    cancel: &CancellationToken,
) -> Result<Option<Utterance>> {
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(DittiesError::Cancelled),
        r = transcriber.transcribe(stream, cancel) => r,
    };

    match result {
        Ok(Some(mut utterance)) => {
            let trimmed = utterance.text.trim();
            if trimmed.is_empty() {
                debug!("transcription returned empty text");
                return Ok(None);
            }
            utterance.text = trimmed.to_string();
            Ok(Some(utterance))
        }
        Ok(None) => {
            debug!("transcription captured nothing");
            Ok(None)
        }
        Err(DittiesError::Cancelled) => Err(DittiesError::Cancelled),
        Err(e) => {
            warn!("transcription failed, dropping utterance: {e}");
            Ok(None)
        }
    }
}
