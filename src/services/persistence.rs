//! Persistence service — one debounced slide writer per editing session.
//!
//! DESIGN
//! ======
//! The writer task owns the debounce timer. `schedule` replaces the pending
//! slides array and restarts the quiet window; when the window elapses the
//! latest array is written once. `flush` writes immediately, superseding
//! whatever was pending, and reports the result over a oneshot. The session
//! task never awaits Postgres on the edit hot path.
//!
//! ERROR HANDLING
//! ==============
//! Debounced writes are fire-and-forget: a failure is logged and the array
//! is dropped, with no retry and no rollback of the session's mirror. The
//! next successful write carries the full latest state anyway. Flushes
//! return the store error to the caller so immediate operations can abort.
//!
//! Shutdown flushes the pending write before the task exits.
//!
//! WRITE TRACKING
//! ==============
//! Every array is published on a watch channel just before it is sent to the
//! store, so the session can recognise the delivery of its own write even
//! when that delivery overtakes the write's acknowledgement.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::doc::{PresentationPatch, Slide};
use crate::frame::now_ms;
use crate::store::{DocumentStore, StoreError};

const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 500;
const DEFAULT_WRITER_QUEUE_CAPACITY: usize = 64;

/// Tuning knobs for a session writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterConfig {
    /// Quiet window before a scheduled write is issued.
    pub debounce: Duration,
    /// Bounded command queue capacity.
    pub queue_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_SAVE_DEBOUNCE_MS),
            queue_capacity: DEFAULT_WRITER_QUEUE_CAPACITY,
        }
    }
}

enum Command {
    Schedule(Vec<Slide>),
    Flush { slides: Option<Vec<Slide>>, ack: oneshot::Sender<Result<(), StoreError>> },
    Shutdown { ack: oneshot::Sender<()> },
}

/// Handle to a running writer task.
pub struct SlideWriter {
    tx: mpsc::Sender<Command>,
    handle: JoinHandle<()>,
    last_write: watch::Receiver<Option<Vec<Slide>>>,
}

impl SlideWriter {
    /// Spawn the writer for one presentation.
    #[must_use]
    pub fn spawn(store: Arc<dyn DocumentStore>, presentation_id: Uuid, config: WriterConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (last_tx, last_write) = watch::channel(None);
        let target = Target { store, presentation_id, last_write: last_tx };
        let handle = tokio::spawn(run(target, config.debounce, rx));
        Self { tx, handle, last_write }
    }

    /// The array most recently sent to the store, if a write started since
    /// the last call.
    pub fn take_last_write(&mut self) -> Option<Vec<Slide>> {
        if !self.last_write.has_changed().unwrap_or(false) {
            return None;
        }
        self.last_write.borrow_and_update().clone()
    }

    /// Queue `slides` for a debounced write, restarting the quiet window.
    pub async fn schedule(&self, slides: Vec<Slide>) {
        if self.tx.send(Command::Schedule(slides)).await.is_err() {
            warn!("slide writer stopped; dropping scheduled write");
        }
    }

    /// Write now. `Some(slides)` writes that array; `None` writes whatever
    /// is pending, if anything. Either way the pending write is cleared.
    ///
    /// # Errors
    ///
    /// Returns the store error from the write, or `Unavailable` if the
    /// writer task has stopped.
    pub async fn flush(&self, slides: Option<Vec<Slide>>) -> Result<(), StoreError> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Command::Flush { slides, ack })
            .await
            .map_err(|_| StoreError::Unavailable("slide writer stopped".into()))?;
        done.await
            .map_err(|_| StoreError::Unavailable("slide writer dropped flush".into()))?
    }

    /// Flush pending work and stop the task.
    pub async fn shutdown(self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Shutdown { ack }).await.is_ok() && done.await.is_err() {
            warn!("slide writer exited before acknowledging shutdown");
        }
        if let Err(e) = self.handle.await {
            warn!(error = %e, "slide writer task ended abnormally");
        }
    }
}

struct Target {
    store: Arc<dyn DocumentStore>,
    presentation_id: Uuid,
    last_write: watch::Sender<Option<Vec<Slide>>>,
}

async fn run(target: Target, debounce: Duration, mut rx: mpsc::Receiver<Command>) {
    let presentation_id = target.presentation_id;
    let mut pending: Option<Vec<Slide>> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(Command::Schedule(slides)) => {
                    pending = Some(slides);
                    deadline = Some(Instant::now() + debounce);
                }
                Some(Command::Flush { slides, ack }) => {
                    deadline = None;
                    let result = match slides.or_else(|| pending.take()) {
                        Some(slides) => write(&target, slides).await,
                        None => Ok(()),
                    };
                    pending = None;
                    if ack.send(result).is_err() {
                        debug!(%presentation_id, "flush caller went away before the ack");
                    }
                }
                Some(Command::Shutdown { ack }) => {
                    flush_pending(&target, pending.take()).await;
                    if ack.send(()).is_err() {
                        debug!(%presentation_id, "shutdown caller went away before the ack");
                    }
                    break;
                }
                None => {
                    flush_pending(&target, pending.take()).await;
                    break;
                }
            },
            () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                flush_pending(&target, pending.take()).await;
            }
        }
    }
    debug!(%presentation_id, "slide writer stopped");
}

async fn flush_pending(target: &Target, pending: Option<Vec<Slide>>) {
    let Some(slides) = pending else {
        return;
    };
    let count = slides.len();
    if let Err(e) = write(target, slides).await {
        error!(error = %e, presentation_id = %target.presentation_id, count, "debounced slide write failed");
    }
}

async fn write(target: &Target, slides: Vec<Slide>) -> Result<(), StoreError> {
    let presentation_id = target.presentation_id;
    let count = slides.len();
    target.last_write.send_replace(Some(slides.clone()));
    target
        .store
        .update(presentation_id, PresentationPatch::slides(slides, now_ms()))
        .await?;
    debug!(%presentation_id, count, "slides written");
    Ok(())
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
