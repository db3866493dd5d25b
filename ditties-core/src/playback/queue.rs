//! Pending queue plus the currently playing song.
//!
//! Plain data guarded by the worker's mutex. Holds the invariant that the
//! current song is never also pending.

use std::collections::VecDeque;

use tokio_util::sync::CancellationToken;

use crate::catalog::{Song, SongId};

#[derive(Debug, Default)]
pub struct PlaybackQueue {
    pending: VecDeque<SongId>,
    current: Option<Song>,
    /// Ends the current song early. Replaced for every song.
    skip: Option<CancellationToken>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `id`. Refused when it is already playing or already pending.
    pub fn enqueue(&mut self, id: SongId) -> bool {
        if self.current.as_ref().is_some_and(|s| s.id == id) || self.pending.contains(&id) {
            return false;
        }
        self.pending.push_back(id);
        true
    }

    pub fn pop_front(&mut self) -> Option<SongId> {
        self.pending.pop_front()
    }

    /// Put a song that could not be played yet at the back of the line.
    pub fn rotate_back(&mut self, id: SongId) {
        if !self.pending.contains(&id) {
            self.pending.push_back(id);
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn pending(&self) -> Vec<SongId> {
        self.pending.iter().cloned().collect()
    }

    /// Mark `song` as playing. Any pending copy of it is removed.
    pub fn begin(&mut self, song: Song, skip: CancellationToken) {
        self.pending.retain(|id| id != &song.id);
        self.current = Some(song);
        self.skip = Some(skip);
    }

    /// Clear the current song if it is still `id`.
    pub fn finish(&mut self, id: &SongId) {
        if self.current.as_ref().is_some_and(|s| &s.id == id) {
            self.current = None;
            self.skip = None;
        }
    }

    pub fn clear_current(&mut self) {
        self.current = None;
        self.skip = None;
    }

    pub fn current(&self) -> Option<&Song> {
        self.current.as_ref()
    }

    /// End the current song early. `false` when nothing is playing.
    pub fn skip(&mut self) -> bool {
        match (&self.current, &self.skip) {
            (Some(_), Some(token)) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> SongId {
        SongId::from(s)
    }

    #[test]
    fn current_song_is_never_pending() {
        let mut q = PlaybackQueue::new();
        assert!(q.enqueue(id("a")));
        assert!(q.enqueue(id("b")));
        assert!(!q.enqueue(id("a")));

        q.begin(Song::new("a", "A", "https://x/a"), CancellationToken::new());
        assert_eq!(q.pending(), vec![id("b")]);
        assert!(!q.enqueue(id("a")));
    }

    #[test]
    fn skip_cancels_once_and_only_while_playing() {
        let mut q = PlaybackQueue::new();
        assert!(!q.skip());

        let token = CancellationToken::new();
        q.begin(Song::new("a", "A", "https://x/a"), token.clone());
        assert!(q.skip());
        assert!(token.is_cancelled());
        assert!(!q.skip());

        q.finish(&id("a"));
        assert!(q.current().is_none());
        assert!(!q.skip());
    }

    #[test]
    fn finish_ignores_a_song_that_is_no_longer_current() {
        let mut q = PlaybackQueue::new();
        q.begin(Song::new("b", "B", "https://x/b"), CancellationToken::new());
        q.finish(&id("a"));
        assert_eq!(q.current().map(|s| s.title.as_str()), Some("B"));
    }
}
