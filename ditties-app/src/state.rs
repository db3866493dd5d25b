//! Shared host state handed to the chat handler and background tasks.

use std::sync::Arc;

use ditties_core::{MemoryCatalog, PlaybackStatus, PlaybackWorker, VoiceAssistant, Worker};
use parking_lot::Mutex;
use serde::Serialize;

use crate::settings::AppSettings;

pub struct AppState {
    pub settings: AppSettings,
    pub catalog: Arc<MemoryCatalog>,
    /// Wrapped in `Arc` so the supervisor and listeners share one worker.
    pub playback: Arc<PlaybackWorker>,
    pub listeners: Mutex<Vec<Arc<Worker<VoiceAssistant>>>>,
}

impl AppState {
    pub fn new(settings: AppSettings, catalog: Arc<MemoryCatalog>, playback: Arc<PlaybackWorker>) -> Self {
        Self {
            settings,
            catalog,
            playback,
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn add_listener(&self, listener: Arc<Worker<VoiceAssistant>>) {
        self.listeners.lock().push(listener);
    }

    pub fn diagnostics_snapshot(&self) -> AppDiagnostics {
        let listeners = self.listeners.lock();
        let mut diag = AppDiagnostics {
            playback_status: self.playback.status(),
            queued: self.playback.queue_snapshot().len(),
            listeners: listeners.len(),
            listeners_running: listeners.iter().filter(|l| l.is_running()).count(),
            ..AppDiagnostics::default()
        };
        for l in listeners.iter() {
            let snap = l.unit().diagnostics();
            diag.frames_scanned += snap.frames_scanned;
            diag.detections += snap.detections;
            diag.utterances += snap.utterances;
            diag.commands += snap.commands;
        }
        diag
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDiagnostics {
    pub playback_status: PlaybackStatus,
    pub queued: usize,
    pub listeners: usize,
    pub listeners_running: usize,
    pub frames_scanned: usize,
    pub detections: usize,
    pub utterances: usize,
    pub commands: usize,
}

impl Default for AppDiagnostics {
    fn default() -> Self {
        Self {
            playback_status: PlaybackStatus::Idle,
            queued: 0,
            listeners: 0,
            listeners_running: 0,
            frames_scanned: 0,
            detections: 0,
            utterances: 0,
            commands: 0,
        }
    }
}
