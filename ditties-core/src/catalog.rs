//! Song catalog collaborator.
//!
//! The catalog owns song metadata. The core only reads identifiers, titles
//! and readiness, and asks for new user requests to be recorded.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DittiesError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SongId(pub String);

impl SongId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SongId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: SongId,
    pub title: String,
    pub url: String,
    /// `true` only once the catalog has fully fetched and processed the song.
    #[serde(default)]
    pub is_ready: bool,
    #[serde(default)]
    pub requested_by: Option<String>,
    #[serde(default)]
    pub requested_at: Option<DateTime<Utc>>,
}

impl Song {
    pub fn new(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: SongId::new(id),
            title: title.into(),
            url: url.into(),
            is_ready: true,
            requested_by: None,
            requested_at: None,
        }
    }
}

/// Contract for song metadata stores.
#[async_trait]
pub trait SongCatalog: Send + Sync + 'static {
    /// Snapshot of every song, in catalog order.
    fn songs(&self) -> Vec<Song>;

    fn get(&self, id: &SongId) -> Option<Song>;

    /// Record a user request by URL. The returned song is not ready yet.
    async fn add_user_request(&self, url: &str, requested_by: &str) -> Result<Song>;

    /// Ready songs only, in catalog order.
    fn ready_songs(&self) -> Vec<Song> {
        self.songs().into_iter().filter(|s| s.is_ready).collect()
    }
}

/// In-memory catalog, optionally seeded from a JSON array of songs.
pub struct MemoryCatalog {
    songs: RwLock<Vec<Song>>,
    next_request: AtomicU64,
    /// Mark user requests ready immediately (no fetch step).
    ready_on_request: bool,
}

impl MemoryCatalog {
    pub fn new(songs: Vec<Song>) -> Self {
        Self {
            songs: RwLock::new(songs),
            next_request: AtomicU64::new(1),
            ready_on_request: false,
        }
    }

    pub fn ready_on_request(mut self, ready: bool) -> Self {
        self.ready_on_request = ready;
        self
    }

    /// Load a JSON array of [`Song`] records.
    ///
    /// # Errors
    /// `DittiesError::Io` if the file cannot be read, `DittiesError::Catalog`
    /// if it is not a valid song list.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let songs: Vec<Song> = serde_json::from_str(&raw)
            .map_err(|e| DittiesError::Catalog(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), songs = songs.len(), "song catalog loaded");
        Ok(Self::new(songs))
    }

    pub fn insert(&self, song: Song) {
        let mut songs = self.songs.write();
        if let Some(existing) = songs.iter_mut().find(|s| s.id == song.id) {
            *existing = song;
        } else {
            songs.push(song);
        }
    }

    /// Flag a song as fetched. Returns `false` for unknown ids.
    pub fn mark_ready(&self, id: &SongId) -> bool {
        let mut songs = self.songs.write();
        match songs.iter_mut().find(|s| &s.id == id) {
            Some(song) => {
                song.is_ready = true;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl SongCatalog for MemoryCatalog {
    fn songs(&self) -> Vec<Song> {
        self.songs.read().clone()
    }

    fn get(&self, id: &SongId) -> Option<Song> {
        self.songs.read().iter().find(|s| &s.id == id).cloned()
    }

    async fn add_user_request(&self, url: &str, requested_by: &str) -> Result<Song> {
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(DittiesError::Catalog(format!("not a song URL: {url:?}")));
        }
        let n = self.next_request.fetch_add(1, Ordering::Relaxed);
        let song = Song {
            id: SongId(format!("req-{n}")),
            title: url.to_string(),
            url: url.to_string(),
            is_ready: self.ready_on_request,
            requested_by: Some(requested_by.to_string()),
            requested_at: Some(Utc::now()),
        };
        info!(id = %song.id, url, requested_by, "user song request recorded");
        self.songs.write().push(song.clone());
        Ok(song)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn user_requests_start_not_ready() {
        let catalog = MemoryCatalog::new(vec![Song::new("a", "All Star", "https://x/a")]);
        let song = catalog
            .add_user_request("https://example.com/song", "alice")
            .await
            .unwrap();
        assert!(!song.is_ready);
        assert_eq!(song.requested_by.as_deref(), Some("alice"));
        assert!(song.requested_at.is_some());
        assert_eq!(catalog.songs().len(), 2);
        assert_eq!(catalog.ready_songs().len(), 1);

        assert!(catalog.mark_ready(&song.id));
        assert_eq!(catalog.ready_songs().len(), 2);
    }

    #[tokio::test]
    async fn rejects_non_url_requests() {
        let catalog = MemoryCatalog::new(Vec::new());
        let err = catalog.add_user_request("never gonna", "bob").await;
        assert!(matches!(err, Err(DittiesError::Catalog(_))));
    }

    #[test]
    fn json_records_default_to_not_ready() {
        let songs: Vec<Song> = serde_json::from_str(
            r#"[{"id":"1","title":"All Star","url":"https://x/1"},
                {"id":"2","title":"Sandstorm","url":"https://x/2","isReady":true}]"#,
        )
        .unwrap();
        assert!(!songs[0].is_ready);
        assert!(songs[1].is_ready);
        assert_eq!(songs[1].id, SongId::from("2"));
    }
}
