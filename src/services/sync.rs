//! Synchronization engine — converges a session's surface with the shared
//! presentation document.
//!
//! ARCHITECTURE
//! ============
//! Remote → local: the engine holds a store subscription. Each delivery is a
//! full document; the session mirror is replaced wholesale and the surface is
//! reloaded only when the active slide's data differs from what it shows.
//! A reload is followed by a delayed second render pass (`render_settle`).
//!
//! Local → remote: surface listeners push object events into a channel. The
//! engine folds the live surface into the active slide of the mirror and
//! hands the whole slides array to the session's `SlideWriter`, which
//! debounces. `force_save` and `persist` bypass the debounce.
//!
//! MERGE POLICY
//! ============
//! Last writer wins on the whole slides array. A session that writes from a
//! stale mirror overwrites concurrent edits to other slides.
//!
//! ECHO SUPPRESSION
//! ================
//! A delivery whose active slide equals the surface is not reloaded. A
//! delivery whose slides array equals the last array this session sent to
//! the store is the echo of that write; the surface has only moved on with
//! newer local edits, so it is not reloaded either. The record is dropped
//! once the surface is reloaded from someone else's write, so content that
//! merely matches an older write of ours is always applied.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use super::persistence::{SlideWriter, WriterConfig};
use super::role::Action;
use super::session::Session;
use crate::doc::Slide;
use crate::store::{DocumentStore, StoreError, Subscription};
use crate::surface::{EventKind, ListenerId, SurfaceEvent};

const DEFAULT_RENDER_SETTLE_MS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub writer: WriterConfig,
    /// Delay before the second render pass after a reload.
    pub render_settle: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { writer: WriterConfig::default(), render_settle: Duration::from_millis(DEFAULT_RENDER_SETTLE_MS) }
    }
}

/// Outcome of applying one remote delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteUpdate {
    /// The document does not exist.
    Missing,
    /// The document had no slides and this session wrote the first one.
    Bootstrapped,
    /// Mirror replaced; `reloaded` says whether the surface was reloaded.
    Applied { reloaded: bool },
}

/// Something the engine needs the session task to handle.
#[derive(Debug)]
pub enum SyncEvent {
    Remote,
    Local(SurfaceEvent),
    Settle,
    /// The store dropped the subscription.
    Closed,
}

pub struct SyncEngine {
    subscription: Subscription,
    writer: Option<SlideWriter>,
    changes_tx: mpsc::UnboundedSender<SurfaceEvent>,
    changes_rx: mpsc::UnboundedReceiver<SurfaceEvent>,
    listeners: Vec<ListenerId>,
    settle_at: Option<Instant>,
    render_settle: Duration,
    /// Last slides array this session sent to the store.
    last_write: Option<Vec<Slide>>,
}

impl SyncEngine {
    /// Subscribe, start the writer, attach surface listeners, and apply the
    /// first delivery (the current document).
    ///
    /// # Errors
    ///
    /// Returns the store error if the subscription cannot be opened.
    pub async fn mount(
        store: Arc<dyn DocumentStore>,
        session: &mut Session,
        config: SyncConfig,
    ) -> Result<(Self, RemoteUpdate), StoreError> {
        let subscription = store.subscribe(session.presentation_id).await?;
        let writer = SlideWriter::spawn(store, session.presentation_id, config.writer);
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();

        let mut engine = Self {
            subscription,
            writer: Some(writer),
            changes_tx,
            changes_rx,
            listeners: Vec::new(),
            settle_at: None,
            render_settle: config.render_settle,
            last_write: None,
        };
        engine.attach(session);

        let first = engine.apply_remote(session).await;
        info!(
            presentation_id = %session.presentation_id,
            username = %session.username,
            role = %session.role,
            ?first,
            "sync engine mounted"
        );
        Ok((engine, first))
    }

    fn attach(&mut self, session: &mut Session) {
        for kind in EventKind::ALL {
            let tx = self.changes_tx.clone();
            let id = session.surface.on(
                kind,
                Box::new(move |event| {
                    if tx.send(event.clone()).is_err() {
                        debug!(kind = event.kind.name(), "sync engine gone; dropping surface event");
                    }
                }),
            );
            self.listeners.push(id);
        }
    }

    /// Wait for the next remote delivery, local edit, or settle timer.
    pub async fn next_event(&mut self) -> SyncEvent {
        let settle_at = self.settle_at;
        tokio::select! {
            changed = self.subscription.changed() => match changed {
                Ok(()) => SyncEvent::Remote,
                Err(_) => SyncEvent::Closed,
            },
            Some(event) = self.changes_rx.recv() => SyncEvent::Local(event),
            () = sleep_until(settle_at.unwrap_or_else(Instant::now)), if settle_at.is_some() => SyncEvent::Settle,
        }
    }

    /// Apply the latest delivered document to the session.
    pub async fn apply_remote(&mut self, session: &mut Session) -> RemoteUpdate {
        let delivered = self.subscription.borrow_and_update().clone();
        let Some(doc) = delivered else {
            debug!(presentation_id = %session.presentation_id, "presentation missing");
            return RemoteUpdate::Missing;
        };

        session.apply_document(&doc);

        if session.slides.is_empty() {
            if !session.can(Action::AddSlide) {
                session.load_current();
                return RemoteUpdate::Applied { reloaded: true };
            }
            let slides = vec![Slide::empty()];
            match self.persist(slides.clone()).await {
                Ok(()) => {
                    session.slides = slides;
                    session.current_slide_index = 0;
                    session.load_current();
                    info!(presentation_id = %session.presentation_id, "bootstrapped first slide");
                    return RemoteUpdate::Bootstrapped;
                }
                Err(e) => {
                    warn!(error = %e, presentation_id = %session.presentation_id, "first slide bootstrap failed");
                    session.load_current();
                    return RemoteUpdate::Applied { reloaded: true };
                }
            }
        }

        let Some(remote) = session.current_slide().map(|s| s.canvas_data.clone()) else {
            return RemoteUpdate::Applied { reloaded: false };
        };
        self.track_writes();
        let shown = session.surface.serialize();
        if remote == shown {
            return RemoteUpdate::Applied { reloaded: false };
        }
        if self.last_write.as_ref() == Some(&session.slides) {
            debug!(
                presentation_id = %session.presentation_id,
                index = session.current_slide_index,
                "skipping echo of our own write"
            );
            return RemoteUpdate::Applied { reloaded: false };
        }

        session.load_current();
        self.last_write = None;
        self.settle_at = Some(Instant::now() + self.render_settle);
        RemoteUpdate::Applied { reloaded: true }
    }

    /// Fold a local edit into the mirror and schedule a debounced write.
    /// Returns false when the edit was ignored.
    pub async fn on_local_change(&mut self, session: &mut Session, event: &SurfaceEvent) -> bool {
        self.drain_changes();
        if !session.role.can_edit() {
            debug!(kind = event.kind.name(), "ignoring surface event from read-only session");
            return false;
        }
        if session.current_slide().is_none() {
            return false;
        }
        let slides = session.slides_with_live_edits();
        session.slides.clone_from(&slides);
        if let Some(writer) = &self.writer {
            writer.schedule(slides).await;
        }
        true
    }

    /// Write the live surface now, superseding any pending debounced write.
    ///
    /// # Errors
    ///
    /// Returns the store error; the mirror is left unchanged in that case.
    pub async fn force_save(&mut self, session: &mut Session) -> Result<(), StoreError> {
        self.drain_changes();
        if !session.role.can_edit() || session.current_slide().is_none() {
            return Ok(());
        }
        let slides = session.slides_with_live_edits();
        self.persist(slides.clone()).await?;
        session.slides = slides;
        Ok(())
    }

    /// Write `slides` immediately, superseding any pending debounced write.
    ///
    /// # Errors
    ///
    /// Returns the store error from the write.
    pub async fn persist(&mut self, slides: Vec<Slide>) -> Result<(), StoreError> {
        self.drain_changes();
        let Some(writer) = &self.writer else {
            return Err(StoreError::Unavailable("sync engine unmounted".into()));
        };
        writer.flush(Some(slides)).await
    }

    /// Second render pass after a reload.
    pub fn on_settle(&mut self, session: &mut Session) {
        self.settle_at = None;
        session.surface.render_all();
    }

    /// Whether a settle pass is armed.
    #[cfg(test)]
    #[must_use]
    pub fn settle_pending(&self) -> bool {
        self.settle_at.is_some()
    }

    /// Flush outstanding local edits, detach listeners, and stop the writer.
    pub async fn unmount(mut self, session: &mut Session) {
        let dirty = self.drain_changes();
        if dirty && session.role.can_edit() && session.current_slide().is_some() {
            if let Some(writer) = &self.writer {
                writer.schedule(session.slides_with_live_edits()).await;
            }
        }
        for id in self.listeners.drain(..) {
            session.surface.off(id);
        }
        if let Some(writer) = self.writer.take() {
            writer.shutdown().await;
        }
        info!(presentation_id = %session.presentation_id, username = %session.username, "sync engine unmounted");
    }

    /// Discard queued surface events. Returns whether any were queued.
    fn drain_changes(&mut self) -> bool {
        let mut any = false;
        while self.changes_rx.try_recv().is_ok() {
            any = true;
        }
        any
    }

    /// Pick up the array of any write the writer started since the last
    /// delivery.
    fn track_writes(&mut self) {
        if let Some(slides) = self.writer.as_mut().and_then(SlideWriter::take_last_write) {
            self.last_write = Some(slides);
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;
