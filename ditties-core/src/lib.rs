//! # ditties-core
//!
//! Voice-channel music assistant engine.
//!
//! ## Architecture
//!
//! ```text
//! AudioSource ─► FrameResampler ─► WakeWordScanner ─(detection)─► capture_and_transcribe
//!   (48 kHz stereo)  (16 kHz mono)     (classifier)                   (same raw stream)
//!                                                                          │
//!                                                              CommandInterpreter
//!                                                                          │
//!                      chat commands ─────────────────────────► PlaybackWorker ─► AudioSink
//! ```
//!
//! Every listener and the playback worker run under a [`worker::Worker`],
//! which reports each stop exactly once so a host supervisor can restart.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod catalog;
pub mod command;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod playback;
pub mod transcribe;
pub mod vad;
pub mod wake;
pub mod worker;

// Convenience re-exports for downstream crates
pub use audio::resample::{FrameResampler, ResampleMode, ResamplerConfig};
pub use audio::{AudioSource, AudioStream};
pub use catalog::{MemoryCatalog, Song, SongCatalog, SongId};
pub use command::{Action, CommandInterpreter};
pub use engine::{AssistantConfig, ClassifierFactory, VoiceAssistant};
pub use error::DittiesError;
pub use ipc::events::{
    CommandEvent, PlaybackStatus, PlaybackStatusEvent, StopReason, WorkerStoppedEvent,
};
pub use playback::{AudioSink, PlaybackConfig, PlaybackWorker};
pub use transcribe::{capture_and_transcribe, Intent, Transcriber, Utterance};
pub use wake::{ClassifierConfig, EnergyTriggerClassifier, WakeWordClassifier, WakeWordScanner};
pub use worker::{supervise, StopHandle, WorkUnit, Worker, WorkerState};

#[cfg(feature = "wit")]
pub use transcribe::{WitConfig, WitTranscriber};
