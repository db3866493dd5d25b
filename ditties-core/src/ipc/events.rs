//! Events broadcast by the core over `tokio::sync::broadcast`.
//!
//! | Event | Source |
//! |-------|--------|
//! | `WorkerStoppedEvent` | every supervised worker, once per run |
//! | `PlaybackStatusEvent` | the playback queue worker on state changes |
//! | `CommandEvent` | a listener after interpreting an utterance |

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Worker lifecycle
// ---------------------------------------------------------------------------

/// Emitted exactly once per run, after the unit of work has fully exited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStoppedEvent {
    /// Worker name, e.g. `"playback"` or `"listener:alice"`.
    pub worker: String,
    /// 1-based run counter of the worker that stopped.
    pub run: u64,
    pub reason: StopReason,
}

impl WorkerStoppedEvent {
    /// Anything other than an explicit `stop()`.
    pub fn is_unexpected(&self) -> bool {
        !matches!(self.reason, StopReason::Requested)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "lowercase")]
pub enum StopReason {
    /// `stop()` was called.
    Requested,
    /// The unit of work returned on its own.
    Completed,
    /// The unit of work returned an error or panicked.
    Failed(String),
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Idle,
    Starting,
    Playing,
    Stopping,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStatusEvent {
    pub status: PlaybackStatus,
    /// Title of the song playing when the event was raised.
    pub now_playing: Option<String>,
    pub queued: usize,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// One interpreted voice command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEvent {
    pub participant: String,
    pub text: String,
    /// Action kind, e.g. `"enqueue"`, `"skip"`, `"notUnderstood"`.
    pub action: String,
    pub reply: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_event_serializes_reason_with_detail() {
        let event = WorkerStoppedEvent {
            worker: "playback".into(),
            run: 3,
            reason: StopReason::Failed("disconnected".into()),
        };
        let json = serde_json::to_value(&event).expect("serialize stopped event");
        assert_eq!(json["worker"], "playback");
        assert_eq!(json["run"], 3);
        assert_eq!(json["reason"]["kind"], "failed");
        assert_eq!(json["reason"]["detail"], "disconnected");
        assert!(event.is_unexpected());

        let requested = WorkerStoppedEvent {
            reason: StopReason::Requested,
            ..event
        };
        assert!(!requested.is_unexpected());
    }

    #[test]
    fn playback_status_event_uses_camel_case() {
        let event = PlaybackStatusEvent {
            status: PlaybackStatus::Playing,
            now_playing: Some("All Star".into()),
            queued: 2,
        };
        let json = serde_json::to_value(&event).expect("serialize status event");
        assert_eq!(json["status"], "playing");
        assert_eq!(json["nowPlaying"], "All Star");
        assert_eq!(json["queued"], 2);
    }
}
