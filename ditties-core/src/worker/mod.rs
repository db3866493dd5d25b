//! Supervised worker lifecycle.
//!
//! ```text
//! Worker::new(name, unit)         state = NotStarted
//!     └─► start()                 unit spawned with a fresh CancellationToken, state = Running
//!         └─► stop()              token cancelled, state = StopRequested
//!             └─► (unit exits)    state = Stopped, WorkerStoppedEvent sent, StopHandle resolves
//! ```
//!
//! Every run ends with exactly one [`WorkerStoppedEvent`], whether the unit
//! returned, failed, panicked or was cancelled. Failures are logged here and
//! never propagate further. Restarting is the job of an observer (see
//! [`supervise`]); a worker never restarts itself.

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{DittiesError, Result};
use crate::ipc::events::{StopReason, WorkerStoppedEvent};

const STOPPED_EVENT_CAP: usize = 32;

/// A cancellable unit of background work.
#[async_trait]
pub trait WorkUnit: Send + Sync + 'static {
    /// Run until done or until `cancel` fires. Returning `Ok(())` after
    /// cancellation is the expected way to exit.
    async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkerState {
    NotStarted,
    Running,
    StopRequested,
    Stopped,
}

struct RunSlot {
    state: WorkerState,
    run: u64,
    stop_requested: bool,
    cancel: Option<CancellationToken>,
    exited: Option<watch::Receiver<bool>>,
}

pub struct Worker<W: WorkUnit + ?Sized> {
    name: String,
    unit: Arc<W>,
    slot: Arc<Mutex<RunSlot>>,
    stopped_tx: broadcast::Sender<WorkerStoppedEvent>,
}

impl<W: WorkUnit + ?Sized> Worker<W> {
    pub fn new(name: impl Into<String>, unit: Arc<W>) -> Self {
        let (stopped_tx, _) = broadcast::channel(STOPPED_EVENT_CAP);
        Self {
            name: name.into(),
            unit,
            slot: Arc::new(Mutex::new(RunSlot {
                state: WorkerState::NotStarted,
                run: 0,
                stop_requested: false,
                cancel: None,
                exited: None,
            })),
            stopped_tx,
        }
    }

    pub fn unit(&self) -> &Arc<W> {
        &self.unit
    }

    pub fn state(&self) -> WorkerState {
        self.slot.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == WorkerState::Running
    }

    /// Number of runs started so far.
    pub fn run_count(&self) -> u64 {
        self.slot.lock().run
    }

    /// Stop events for every future run of this worker.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerStoppedEvent> {
        self.stopped_tx.subscribe()
    }

    /// Spawn a new run on the current Tokio runtime.
    ///
    /// # Errors
    /// - `DittiesError::AlreadyRunning` while a run is active.
    /// - `DittiesError::Stopping` while a requested stop is still unwinding.
    pub fn start(&self) -> Result<u64> {
        let mut slot = self.slot.lock();
        match slot.state {
            WorkerState::Running => return Err(DittiesError::AlreadyRunning),
            WorkerState::StopRequested => return Err(DittiesError::Stopping),
            WorkerState::NotStarted | WorkerState::Stopped => {}
        }

        slot.run += 1;
        let run = slot.run;
        let cancel = CancellationToken::new();
        let (exited_tx, exited_rx) = watch::channel(false);
        slot.state = WorkerState::Running;
        slot.stop_requested = false;
        slot.cancel = Some(cancel.clone());
        slot.exited = Some(exited_rx);
        drop(slot);

        let unit = Arc::clone(&self.unit);
        let task = tokio::spawn(async move { unit.run(cancel).await });

        let name = self.name.clone();
        let slot = Arc::clone(&self.slot);
        let stopped_tx = self.stopped_tx.clone();
        tokio::spawn(async move {
            let outcome = task.await;

            let reason = {
                let mut guard = slot.lock();
                let reason = if guard.stop_requested {
                    if let Ok(Err(e)) = &outcome {
                        warn!(worker = %name, run, "error while stopping: {e:#}");
                    }
                    StopReason::Requested
                } else {
                    match outcome {
                        Ok(Ok(())) => StopReason::Completed,
                        Ok(Err(e)) => {
                            error!(worker = %name, run, "worker failed: {e:#}");
                            StopReason::Failed(format!("{e:#}"))
                        }
                        Err(join) => {
                            error!(worker = %name, run, "worker task aborted: {join}");
                            StopReason::Failed(if join.is_panic() {
                                "panicked".to_string()
                            } else {
                                join.to_string()
                            })
                        }
                    }
                };
                guard.state = WorkerState::Stopped;
                guard.cancel = None;
                reason
            };

            info!(worker = %name, run, reason = ?reason, "worker stopped");
            let _ = stopped_tx.send(WorkerStoppedEvent {
                worker: name,
                run,
                reason,
            });
            let _ = exited_tx.send(true);
        });

        info!(worker = %self.name, run, "worker started");
        Ok(run)
    }

    /// Request cancellation of the active run. The returned handle resolves
    /// once the unit has fully exited; immediately if nothing is running.
    pub fn stop(&self) -> StopHandle {
        let mut slot = self.slot.lock();
        match slot.state {
            WorkerState::Running => {
                slot.state = WorkerState::StopRequested;
                slot.stop_requested = true;
                if let Some(cancel) = &slot.cancel {
                    cancel.cancel();
                }
                debug!(worker = %self.name, run = slot.run, "stop requested");
                StopHandle {
                    exited: slot.exited.clone(),
                }
            }
            WorkerState::StopRequested => StopHandle {
                exited: slot.exited.clone(),
            },
            WorkerState::NotStarted | WorkerState::Stopped => StopHandle { exited: None },
        }
    }
}

/// Resolves once the stopped run has fully exited.
#[must_use = "a StopHandle does nothing unless awaited"]
pub struct StopHandle {
    exited: Option<watch::Receiver<bool>>,
}

impl StopHandle {
    pub async fn wait(self) {
        if let Some(mut exited) = self.exited {
            // Err means the monitor went away, which only happens after it ran.
            let _ = exited.wait_for(|done| *done).await;
        }
    }
}

impl IntoFuture for StopHandle {
    type Output = ();
    type IntoFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

/// Call `restart` `restart_delay` after every unexpected stop, until
/// `cancel` fires or the event channel closes.
pub async fn supervise<F>(
    mut events: broadcast::Receiver<WorkerStoppedEvent>,
    restart_delay: Duration,
    cancel: CancellationToken,
    mut restart: F,
) where
    F: FnMut(&WorkerStoppedEvent) + Send,
{
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            e = events.recv() => e,
        };
        match event {
            Ok(event) if event.is_unexpected() => {
                info!(worker = %event.worker, run = event.run, "restarting after unexpected stop");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(restart_delay) => {}
                }
                restart(&event);
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "supervisor lagged behind stop events");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
