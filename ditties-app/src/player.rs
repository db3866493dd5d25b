//! Stand-in audio sink: logs what would be played and waits it out.

use std::time::Duration;

use async_trait::async_trait;
use ditties_core::error::Result;
use ditties_core::{AudioSink, Song};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Rough speaking rate for announcements.
const MS_PER_WORD: u64 = 350;

pub struct SimulatedSink {
    song_duration: Duration,
}

impl SimulatedSink {
    pub fn new(song_duration: Duration) -> Self {
        Self { song_duration }
    }
}

#[async_trait]
impl AudioSink for SimulatedSink {
    async fn play_song(&self, song: &Song, cancel: CancellationToken) -> Result<()> {
        info!(title = %song.title, url = %song.url, "playing");
        tokio::select! {
            _ = cancel.cancelled() => info!(title = %song.title, "playback interrupted"),
            _ = tokio::time::sleep(self.song_duration) => info!(title = %song.title, "song finished"),
        }
        Ok(())
    }

    async fn speak(&self, text: &str, cancel: CancellationToken) -> Result<()> {
        info!(text, "announcing");
        let words = text.split_whitespace().count() as u64;
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(Duration::from_millis(words * MS_PER_WORD)) => {}
        }
        Ok(())
    }
}
