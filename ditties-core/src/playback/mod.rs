//! Playback Queue Worker.
//!
//! ## State machine
//!
//! ```text
//! Idle/Stopped ─try_ensure_started()─► Starting ─► Playing
//! Playing ─stop()─► Stopping ─► Stopped
//! Playing ─(queue exhausted | sink error | disconnect)─► Stopped + WorkerStoppedEvent
//! ```
//!
//! The worker never restarts itself. A supervisor watching
//! [`PlaybackWorker::subscribe_stopped`] calls `try_ensure_started()` again.
//!
//! ## Concurrency
//!
//! The pending queue and current song live in one [`PlaybackQueue`] behind a
//! `parking_lot::Mutex`. Every public operation takes the lock once and
//! never across an `.await`. Only the song loop advances the queue, so a
//! `try_skip()` racing with the natural end of a song cancels at most the
//! song that is current at that instant.
//!
//! Each run drives two loops: songs, and an announcement overlay fed by
//! `say()`. Announcements never touch queue state.

pub mod queue;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::{Song, SongCatalog, SongId};
use crate::error::{DittiesError, Result};
pub use crate::ipc::events::PlaybackStatus;
use crate::ipc::events::{PlaybackStatusEvent, WorkerStoppedEvent};
use crate::worker::{WorkUnit, Worker};
pub use queue::PlaybackQueue;

const STATUS_EVENT_CAP: usize = 64;
/// Older announcements are dropped past this many waiting.
const MAX_PENDING_ANNOUNCEMENTS: usize = 16;

/// Where songs and announcements are actually played.
#[async_trait]
pub trait AudioSink: Send + Sync + 'static {
    /// Play `song` to the end, or until `cancel` fires (skip or stop).
    ///
    /// # Errors
    /// `DittiesError::Disconnected` ends the run; other errors skip the song.
    async fn play_song(&self, song: &Song, cancel: CancellationToken) -> Result<()>;

    /// Speak `text` over whatever is playing.
    async fn speak(&self, text: &str, cancel: CancellationToken) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Pick a random ready song when the queue is empty. Default: true.
    pub autoplay: bool,
    /// Retry interval while only not-ready songs are pending and autoplay
    /// has nothing to offer. Default: 5 s.
    pub pending_poll_interval: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            autoplay: true,
            pending_poll_interval: Duration::from_secs(5),
        }
    }
}

enum NextSong {
    Play(Song, CancellationToken),
    /// Only not-ready songs are pending and nothing can be autoplayed.
    Wait,
    Exhausted,
}

/// Shared state of the worker; one instance outlives every run.
struct PlaybackRunner {
    config: PlaybackConfig,
    catalog: Arc<dyn SongCatalog>,
    sink: Arc<dyn AudioSink>,
    queue: Mutex<PlaybackQueue>,
    enqueued: Notify,
    announcements: Mutex<VecDeque<String>>,
    announced: Notify,
    status: Mutex<PlaybackStatus>,
    status_tx: broadcast::Sender<PlaybackStatusEvent>,
}

impl PlaybackRunner {
    fn set_status(&self, status: PlaybackStatus) {
        let mut guard = self.status.lock();
        self.set_status_locked(&mut guard, status);
    }

    fn set_status_locked(&self, guard: &mut PlaybackStatus, status: PlaybackStatus) {
        *guard = status;
        let (now_playing, queued) = {
            let q = self.queue.lock();
            (q.current().map(|s| s.title.clone()), q.pending_len())
        };
        let _ = self.status_tx.send(PlaybackStatusEvent {
            status,
            now_playing,
            queued,
        });
    }

    fn next_song(&self, cancel: &CancellationToken) -> NextSong {
        let mut q = self.queue.lock();
        for _ in 0..q.pending_len() {
            let Some(id) = q.pop_front() else { break };
            match self.catalog.get(&id) {
                Some(song) if song.is_ready => {
                    let skip = cancel.child_token();
                    q.begin(song.clone(), skip.clone());
                    return NextSong::Play(song, skip);
                }
                Some(_) => {
                    debug!(id = %id, "song not ready yet, rotating to the back");
                    q.rotate_back(id);
                }
                None => warn!(id = %id, "queued song is not in the catalog, dropping"),
            }
        }
        // Not-ready songs stay queued; autoplay fills in until one is ready.
        if self.config.autoplay {
            let ready = self.catalog.ready_songs();
            if let Some(song) = ready.choose(&mut rand::thread_rng()) {
                debug!(title = %song.title, waiting = q.pending_len(), "autoplay");
                let skip = cancel.child_token();
                q.begin(song.clone(), skip.clone());
                return NextSong::Play(song.clone(), skip);
            }
        }
        if q.pending_len() > 0 {
            return NextSong::Wait;
        }
        NextSong::Exhausted
    }

    async fn song_loop(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            match self.next_song(cancel) {
                NextSong::Play(song, skip) => {
                    info!(id = %song.id, title = %song.title, "now playing");
                    self.set_status(PlaybackStatus::Playing);
                    let played = self.sink.play_song(&song, skip.clone()).await;
                    self.queue.lock().finish(&song.id);
                    match played {
                        Ok(()) if skip.is_cancelled() && !cancel.is_cancelled() => {
                            info!(title = %song.title, "song skipped");
                        }
                        Ok(()) => {}
                        Err(DittiesError::Disconnected) => return Err(DittiesError::Disconnected),
                        Err(e) => warn!(title = %song.title, "playback failed: {e}"),
                    }
                }
                NextSong::Wait => {
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        _ = self.enqueued.notified() => {}
                        _ = tokio::time::sleep(self.config.pending_poll_interval) => {}
                    }
                }
                NextSong::Exhausted => {
                    info!("queue exhausted");
                    return Ok(());
                }
            }
        }
    }

    /// Speaks queued announcements until `cancel` fires, or until
    /// `songs_done` fires and nothing is left to say.
    async fn announcement_loop(
        &self,
        cancel: &CancellationToken,
        songs_done: &CancellationToken,
    ) -> Result<()> {
        loop {
            let next = self.announcements.lock().pop_front();
            match next {
                Some(text) => {
                    debug!(text = %text, "announcing");
                    match self.sink.speak(&text, cancel.child_token()).await {
                        Ok(()) => {}
                        Err(DittiesError::Disconnected) => return Err(DittiesError::Disconnected),
                        Err(e) => warn!("announcement failed: {e}"),
                    }
                }
                None => {
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        _ = songs_done.cancelled() => return Ok(()),
                        _ = self.announced.notified() => {}
                    }
                }
            }
            if cancel.is_cancelled() {
                return Ok(());
            }
        }
    }
}

#[async_trait]
impl WorkUnit for PlaybackRunner {
    async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        self.set_status(PlaybackStatus::Playing);

        // Either loop failing ends the other.
        let run = cancel.child_token();
        let songs_done = CancellationToken::new();
        let (songs, announcements) = tokio::join!(
            async {
                let r = self.song_loop(&run).await;
                songs_done.cancel();
                if r.is_err() {
                    run.cancel();
                }
                r
            },
            async {
                let r = self.announcement_loop(&run, &songs_done).await;
                if r.is_err() {
                    run.cancel();
                }
                r
            },
        );

        self.queue.lock().clear_current();
        self.set_status(PlaybackStatus::Stopped);
        songs?;
        announcements?;
        Ok(())
    }
}

/// Owns the playback queue and drives an [`AudioSink`].
///
/// `PlaybackWorker` is `Send + Sync`; wrap it in an `Arc` to share it
/// between listeners and the chat-command handler.
pub struct PlaybackWorker {
    runner: Arc<PlaybackRunner>,
    worker: Worker<PlaybackRunner>,
}

impl PlaybackWorker {
    pub fn new(
        config: PlaybackConfig,
        catalog: Arc<dyn SongCatalog>,
        sink: Arc<dyn AudioSink>,
    ) -> Self {
        let (status_tx, _) = broadcast::channel(STATUS_EVENT_CAP);
        let runner = Arc::new(PlaybackRunner {
            config,
            catalog,
            sink,
            queue: Mutex::new(PlaybackQueue::new()),
            enqueued: Notify::new(),
            announcements: Mutex::new(VecDeque::new()),
            announced: Notify::new(),
            status: Mutex::new(PlaybackStatus::Idle),
            status_tx,
        });
        let worker = Worker::new("playback", Arc::clone(&runner));
        Self { runner, worker }
    }

    /// Start a run unless one is active. Returns `true` only when a new run
    /// was launched; calling it while starting or playing is a no-op.
    pub fn try_ensure_started(&self) -> bool {
        let mut status = self.runner.status.lock();
        match self.worker.start() {
            Ok(run) => {
                debug!(run, "playback starting");
                if *status != PlaybackStatus::Playing {
                    self.runner
                        .set_status_locked(&mut status, PlaybackStatus::Starting);
                }
                true
            }
            Err(e) => {
                debug!("playback already active: {e}");
                false
            }
        }
    }

    /// End the current song early. No-op when nothing is playing.
    pub fn try_skip(&self) -> bool {
        let skipped = self.runner.queue.lock().skip();
        if skipped {
            info!("skip requested");
        }
        skipped
    }

    /// Stop playback and wait for the run to exit. Afterwards
    /// `current_song()` is `None`.
    pub async fn stop(&self) {
        if self.worker.is_running() {
            self.runner.set_status(PlaybackStatus::Stopping);
        }
        self.worker.stop().await;
        self.runner.queue.lock().clear_current();
    }

    /// Append a song to the pending queue. Does not start playback.
    /// Returns `false` when the song is already playing or pending.
    pub fn enqueue(&self, id: SongId) -> bool {
        let added = self.runner.queue.lock().enqueue(id.clone());
        if added {
            debug!(id = %id, "song enqueued");
            self.runner.enqueued.notify_one();
        }
        added
    }

    /// Queue an announcement. Returns without waiting for it to be spoken.
    pub fn say(&self, text: impl Into<String>) {
        let text = text.into();
        {
            let mut pending = self.runner.announcements.lock();
            if pending.len() >= MAX_PENDING_ANNOUNCEMENTS {
                if let Some(dropped) = pending.pop_front() {
                    warn!(text = %dropped, "announcement backlog full, dropping oldest");
                }
            }
            pending.push_back(text);
        }
        self.runner.announced.notify_one();
    }

    pub fn current_song(&self) -> Option<Song> {
        self.runner.queue.lock().current().cloned()
    }

    pub fn queue_snapshot(&self) -> Vec<SongId> {
        self.runner.queue.lock().pending()
    }

    pub fn status(&self) -> PlaybackStatus {
        *self.runner.status.lock()
    }

    pub fn subscribe_stopped(&self) -> broadcast::Receiver<WorkerStoppedEvent> {
        self.worker.subscribe()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<PlaybackStatusEvent> {
        self.runner.status_tx.subscribe()
    }
}
