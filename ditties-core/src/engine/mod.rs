//! `VoiceAssistant`: one listener per speaking participant.
//!
//! ## Lifecycle
//!
//! ```text
//! VoiceAssistant::new()            classifier built once and checked against the resampler
//!     └─► Worker::new(name, Arc<VoiceAssistant>)
//!         └─► start()              source opened, pipeline::run inside a `listener` span
//!             └─► stop()           cancel fires, "Goodbye, <name>" announced, run exits
//! ```
//!
//! A listener run ends on its own when the participant's stream ends; the
//! host decides whether to start it again.

pub mod pipeline;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};

use crate::audio::resample::{FrameResampler, ResamplerConfig};
use crate::audio::AudioSource;
use crate::command::CommandInterpreter;
use crate::error::{DittiesError, Result};
use crate::ipc::events::CommandEvent;
use crate::playback::PlaybackWorker;
use crate::transcribe::Transcriber;
use crate::wake::{WakeWordClassifier, WakeWordScanner};
use crate::worker::{WorkUnit, Worker};

pub use pipeline::{DiagnosticsSnapshot, PipelineDiagnostics};

const COMMAND_EVENT_CAP: usize = 64;

/// Builds a fresh classifier for every listener run.
pub type ClassifierFactory =
    Arc<dyn Fn() -> Result<Box<dyn WakeWordClassifier>> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Source/target rates and resample mode. Default: 48 kHz → 16 kHz, decimate.
    pub resampler: ResamplerConfig,
    /// Name used in greetings. Default: "Dank Ditties bot".
    pub bot_name: String,
    /// Announce "Goodbye, <name>" when a listener is stopped. Default: true.
    pub say_goodbye: bool,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            resampler: ResamplerConfig::default(),
            bot_name: "Dank Ditties bot".into(),
            say_goodbye: true,
        }
    }
}

/// Wake word → transcription → command loop for one participant.
///
/// Run it under a [`Worker`]; see [`VoiceAssistant::into_worker`].
pub struct VoiceAssistant {
    config: AssistantConfig,
    source: Arc<dyn AudioSource>,
    classifier_factory: ClassifierFactory,
    transcriber: Arc<dyn Transcriber>,
    interpreter: Arc<CommandInterpreter>,
    playback: Arc<PlaybackWorker>,
    command_tx: broadcast::Sender<CommandEvent>,
    diagnostics: Arc<PipelineDiagnostics>,
}

impl VoiceAssistant {
    /// # Errors
    /// Fatal configuration errors: the factory fails, the classifier's frame
    /// length is zero, or its sample rate differs from the resampler target.
    pub fn new(
        config: AssistantConfig,
        source: Arc<dyn AudioSource>,
        classifier_factory: ClassifierFactory,
        transcriber: Arc<dyn Transcriber>,
        interpreter: Arc<CommandInterpreter>,
        playback: Arc<PlaybackWorker>,
    ) -> Result<Self> {
        // Probe once so a mismatch surfaces here instead of inside a run.
        let probe = FrameResampler::new(tokio::io::empty(), config.resampler)?;
        WakeWordScanner::new(classifier_factory()?, &probe)?;

        let (command_tx, _) = broadcast::channel(COMMAND_EVENT_CAP);
        Ok(Self {
            config,
            source,
            classifier_factory,
            transcriber,
            interpreter,
            playback,
            command_tx,
            diagnostics: Arc::new(PipelineDiagnostics::default()),
        })
    }

    /// Share a command-event channel across several listeners.
    pub fn with_command_events(mut self, tx: broadcast::Sender<CommandEvent>) -> Self {
        self.command_tx = tx;
        self
    }

    pub fn participant(&self) -> &str {
        self.source.participant()
    }

    pub fn subscribe_commands(&self) -> broadcast::Receiver<CommandEvent> {
        self.command_tx.subscribe()
    }

    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Wrap in a worker named `listener:<participant>`.
    pub fn into_worker(self) -> Worker<VoiceAssistant> {
        let name = format!("listener:{}", self.participant());
        Worker::new(name, Arc::new(self))
    }
}

#[async_trait]
impl WorkUnit for VoiceAssistant {
    async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        let participant = self.source.participant().to_string();
        let span = info_span!("listener", participant = %participant);

        async {
            let ctx = pipeline::PipelineContext {
                config: &self.config,
                source: self.source.as_ref(),
                classifier_factory: &self.classifier_factory,
                transcriber: self.transcriber.as_ref(),
                interpreter: self.interpreter.as_ref(),
                playback: self.playback.as_ref(),
                command_tx: &self.command_tx,
                diagnostics: &self.diagnostics,
            };
            match pipeline::run(&ctx, &cancel).await {
                Ok(()) => Ok(()),
                Err(DittiesError::Cancelled) => {
                    info!("listener stopped");
                    if self.config.say_goodbye {
                        self.playback.say(format!("Goodbye, {participant}"));
                    }
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        .instrument(span)
        .await
    }
}
