use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ditties_core::error::Result;
use ditties_core::{
    supervise, AudioSink, MemoryCatalog, PlaybackConfig, PlaybackStatus, PlaybackWorker, Song,
    SongId,
};
use tokio_util::sync::CancellationToken;

/// Plays every song until cancelled.
#[derive(Default)]
struct EndlessSink {
    songs_started: AtomicUsize,
}

#[async_trait]
impl AudioSink for EndlessSink {
    async fn play_song(&self, _song: &Song, cancel: CancellationToken) -> Result<()> {
        self.songs_started.fetch_add(1, Ordering::SeqCst);
        cancel.cancelled().await;
        Ok(())
    }

    async fn speak(&self, _text: &str, _cancel: CancellationToken) -> Result<()> {
        Ok(())
    }
}

fn catalog(n: usize) -> Arc<MemoryCatalog> {
    Arc::new(MemoryCatalog::new(
        (0..n)
            .map(|i| Song::new(i.to_string(), format!("Song {i}"), format!("https://x/{i}")))
            .collect(),
    ))
}

fn config(autoplay: bool) -> PlaybackConfig {
    PlaybackConfig {
        autoplay,
        pending_poll_interval: Duration::from_millis(10),
    }
}

async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition reached in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_enqueues_are_never_lost() {
    let worker = Arc::new(PlaybackWorker::new(
        config(false),
        catalog(64),
        Arc::new(EndlessSink::default()),
    ));

    let tasks: Vec<_> = (0..64)
        .map(|i| {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { worker.enqueue(SongId::new(i.to_string())) })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap());
    }

    let mut queued = worker.queue_snapshot();
    queued.sort_by_key(|id| id.as_str().parse::<usize>().unwrap());
    let expected: Vec<SongId> = (0..64).map(|i| SongId::new(i.to_string())).collect();
    assert_eq!(queued, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_skips_advance_one_song_at_a_time() {
    let sink = Arc::new(EndlessSink::default());
    let worker = Arc::new(PlaybackWorker::new(config(false), catalog(3), sink.clone()));
    for i in 0..3 {
        worker.enqueue(SongId::new(i.to_string()));
    }
    worker.try_ensure_started();
    eventually(|| worker.current_song().is_some()).await;

    // Many callers skip at once. Each skip that lands ends exactly one
    // song; the rest are no-ops.
    let skips: Vec<_> = (0..8)
        .map(|_| {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { worker.try_skip() })
        })
        .collect();
    let mut landed = 0;
    for s in skips {
        if s.await.unwrap() {
            landed += 1;
        }
    }
    assert!((1..=3).contains(&landed), "landed {landed}");

    let expected = (landed + 1).min(3);
    eventually(|| sink.songs_started.load(Ordering::SeqCst) == expected).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(sink.songs_started.load(Ordering::SeqCst), expected);
    if landed < 3 {
        assert_eq!(
            worker.current_song().map(|s| s.title),
            Some(format!("Song {landed}"))
        );
    }

    worker.stop().await;
    assert!(worker.current_song().is_none());
    assert_eq!(worker.status(), PlaybackStatus::Stopped);
}

#[tokio::test]
async fn skip_on_an_idle_worker_is_a_noop() {
    let worker = PlaybackWorker::new(config(false), catalog(1), Arc::new(EndlessSink::default()));
    assert!(!worker.try_skip());
    assert!(worker.queue_snapshot().is_empty());
    assert_eq!(worker.status(), PlaybackStatus::Idle);
}

#[tokio::test]
async fn supervisor_restarts_an_exhausted_queue() {
    let worker = Arc::new(PlaybackWorker::new(
        config(false),
        catalog(2),
        Arc::new(EndlessSink::default()),
    ));
    let restarts = Arc::new(AtomicUsize::new(0));
    let cancel = CancellationToken::new();

    let supervisor = {
        let worker = Arc::clone(&worker);
        let restarts = Arc::clone(&restarts);
        tokio::spawn(supervise(
            worker.subscribe_stopped(),
            Duration::from_millis(10),
            cancel.clone(),
            move |_| {
                restarts.fetch_add(1, Ordering::SeqCst);
                worker.try_ensure_started();
            },
        ))
    };

    // Nothing queued and no autoplay: the run ends by itself.
    worker.try_ensure_started();
    eventually(|| restarts.load(Ordering::SeqCst) >= 1).await;

    // After a restart the worker picks up newly queued songs.
    worker.enqueue(SongId::from("1"));
    eventually(|| worker.current_song().map(|s| s.title) == Some("Song 1".into())).await;

    // An explicit stop is not restarted.
    let before = restarts.load(Ordering::SeqCst);
    worker.stop().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(restarts.load(Ordering::SeqCst), before);
    assert!(worker.current_song().is_none());

    cancel.cancel();
    supervisor.await.unwrap();
}
