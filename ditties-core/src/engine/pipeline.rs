//! Per-listener loop.
//!
//! ## Stages (per wake word)
//!
//! ```text
//! 1. FrameResampler::pull(frame_length)  raw 48 kHz stereo → 16 kHz mono
//! 2. WakeWordScanner::scan               classifier per frame, stop at first match
//! 3. capture_and_transcribe              same raw stream → Utterance | none
//! 4. CommandInterpreter::interpret       Utterance → Action
//! 5. Action::execute                     PlaybackWorker mutations + announcement
//! 6. resampler.reset()                   drop stale samples, back to 1
//! ```
//!
//! Stages run strictly in order for one listener. Transient faults abandon
//! the current frame or utterance; only `MAX_CONSECUTIVE_FAULTS` in a row
//! end the run.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{AssistantConfig, ClassifierFactory};
use crate::audio::resample::FrameResampler;
use crate::audio::AudioSource;
use crate::command::CommandInterpreter;
use crate::error::{DittiesError, Result};
use crate::ipc::events::CommandEvent;
use crate::playback::PlaybackWorker;
use crate::transcribe::{capture_and_transcribe, Transcriber};
use crate::wake::{ScanOutcome, WakeWordScanner};

const MAX_CONSECUTIVE_FAULTS: usize = 3;

#[derive(Default)]
pub struct PipelineDiagnostics {
    pub streams_opened: AtomicUsize,
    pub frames_scanned: AtomicUsize,
    pub detections: AtomicUsize,
    pub utterances: AtomicUsize,
    pub empty_utterances: AtomicUsize,
    pub commands: AtomicUsize,
    pub not_understood: AtomicUsize,
    pub stream_faults: AtomicUsize,
}

impl PipelineDiagnostics {
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            streams_opened: self.streams_opened.load(Ordering::Relaxed),
            frames_scanned: self.frames_scanned.load(Ordering::Relaxed),
            detections: self.detections.load(Ordering::Relaxed),
            utterances: self.utterances.load(Ordering::Relaxed),
            empty_utterances: self.empty_utterances.load(Ordering::Relaxed),
            commands: self.commands.load(Ordering::Relaxed),
            not_understood: self.not_understood.load(Ordering::Relaxed),
            stream_faults: self.stream_faults.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub streams_opened: usize,
    pub frames_scanned: usize,
    pub detections: usize,
    pub utterances: usize,
    pub empty_utterances: usize,
    pub commands: usize,
    pub not_understood: usize,
    pub stream_faults: usize,
}

/// Everything one listener run borrows, passed as one struct.
pub struct PipelineContext<'a> {
    pub config: &'a AssistantConfig,
    pub source: &'a dyn AudioSource,
    pub classifier_factory: &'a ClassifierFactory,
    pub transcriber: &'a dyn Transcriber,
    pub interpreter: &'a CommandInterpreter,
    pub playback: &'a PlaybackWorker,
    pub command_tx: &'a broadcast::Sender<CommandEvent>,
    pub diagnostics: &'a PipelineDiagnostics,
}

/// Listen until the stream ends or `cancel` fires.
///
/// # Errors
/// - `DittiesError::Cancelled` when `cancel` fires.
/// - Configuration errors (classifier/resampler mismatch) before the first
///   frame is read.
/// - The last fault after `MAX_CONSECUTIVE_FAULTS` transient ones in a row.
pub async fn run(ctx: &PipelineContext<'_>, cancel: &CancellationToken) -> Result<()> {
    let participant = ctx.source.participant();

    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(DittiesError::Cancelled),
        s = ctx.source.open() => s?,
    };
    let Some(stream) = opened else {
        info!("participant has no audio stream");
        return Ok(());
    };
    ctx.diagnostics.streams_opened.fetch_add(1, Ordering::Relaxed);

    let mut resampler = FrameResampler::new(stream, ctx.config.resampler)?;
    let mut scanner = WakeWordScanner::new((ctx.classifier_factory)()?, &resampler)?;
    info!(frame_length = scanner.frame_length(), "listening for wake word");

    let mut faults = 0usize;
    loop {
        let before = scanner.total_frames();
        let outcome = scanner.scan(&mut resampler, cancel).await;
        ctx.diagnostics
            .frames_scanned
            .fetch_add((scanner.total_frames() - before) as usize, Ordering::Relaxed);

        let detection = match outcome {
            Ok(ScanOutcome::Detected(d)) => {
                faults = 0;
                d
            }
            Ok(ScanOutcome::StreamEnded) => {
                info!(frames = scanner.total_frames(), "audio stream ended");
                return Ok(());
            }
            Err(DittiesError::Cancelled) => return Err(DittiesError::Cancelled),
            Err(e) if e.is_transient() => {
                ctx.diagnostics.stream_faults.fetch_add(1, Ordering::Relaxed);
                faults += 1;
                if faults >= MAX_CONSECUTIVE_FAULTS {
                    return Err(e);
                }
                warn!(faults, "audio fault, abandoning frame: {e}");
                resampler.reset();
                continue;
            }
            Err(e) => return Err(e),
        };

        ctx.diagnostics.detections.fetch_add(1, Ordering::Relaxed);
        info!(
            keyword = detection.keyword_index,
            frames = detection.frames_scanned,
            "wake word heard"
        );

        let utterance =
            capture_and_transcribe(ctx.transcriber, resampler.stream_mut(), cancel).await?;
        // Samples decoded before the utterance are stale now.
        resampler.reset();

        let Some(utterance) = utterance else {
            ctx.diagnostics
                .empty_utterances
                .fetch_add(1, Ordering::Relaxed);
            debug!("nothing to interpret");
            continue;
        };
        ctx.diagnostics.utterances.fetch_add(1, Ordering::Relaxed);

        let action = ctx
            .interpreter
            .interpret(&utterance, ctx.playback.current_song().as_ref());
        info!(text = %utterance.text, action = action.kind(), "command");
        ctx.diagnostics.commands.fetch_add(1, Ordering::Relaxed);
        if matches!(action, crate::command::Action::NotUnderstood) {
            ctx.diagnostics.not_understood.fetch_add(1, Ordering::Relaxed);
        }

        let reply = action.execute(ctx.playback, &ctx.config.bot_name);
        let _ = ctx.command_tx.send(CommandEvent {
            participant: participant.to_string(),
            text: utterance.text,
            action: action.kind().to_string(),
            reply,
        });
    }
}
