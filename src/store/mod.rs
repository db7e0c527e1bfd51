//! Document store — one real-time document per presentation.
//!
//! ARCHITECTURE
//! ============
//! `DocumentStore` is the remote-store boundary: whole-document reads,
//! whole-field writes, and a subscription that delivers a full snapshot
//! after every committed write. `MemoryStore` keeps documents in process;
//! `PgStore` keeps them in Postgres. Both fan out through `Hub`.
//!
//! TRADE-OFFS
//! ==========
//! Writes are unconditional overwrites of the fields they carry. There is
//! no version check, so two editors writing the slides array within the same
//! window resolve as last-writer-wins in commit order.

pub mod memory;
pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{RwLock, watch};
use uuid::Uuid;

use crate::doc::{NewPresentation, Presentation, PresentationPatch, PresentationSummary};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Receiver side of a document subscription. `None` means the document
/// does not exist.
pub type Subscription = watch::Receiver<Option<Presentation>>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("presentation not found: {0}")]
    NotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt document {id}: {source}")]
    Corrupt {
        id: Uuid,
        #[source]
        source: serde_json::Error,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl crate::frame::ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_PRESENTATION_NOT_FOUND",
            Self::Database(_) => "E_DATABASE",
            Self::Corrupt { .. } => "E_CORRUPT_DOCUMENT",
            Self::Unavailable(_) => "E_STORE_UNAVAILABLE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Unavailable(_))
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document and return it with its assigned id.
    async fn create(&self, draft: NewPresentation) -> Result<Presentation, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Presentation>, StoreError>;

    /// All documents, newest first.
    async fn list(&self) -> Result<Vec<PresentationSummary>, StoreError>;

    /// Replace the fields present in `patch`.
    ///
    /// # Errors
    ///
    /// `NotFound` when the document does not exist.
    async fn update(&self, id: Uuid, patch: PresentationPatch) -> Result<(), StoreError>;

    /// Subscribe to full-document deliveries. The receiver starts marked
    /// changed so the first `changed().await` yields the current document.
    async fn subscribe(&self, id: Uuid) -> Result<Subscription, StoreError>;
}

// =============================================================================
// FAN-OUT HUB
// =============================================================================

/// Per-document latest-value channels shared by store implementations.
#[derive(Default)]
pub struct Hub {
    channels: RwLock<HashMap<Uuid, watch::Sender<Option<Presentation>>>>,
}

impl Hub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a receiver seeded with `current`. Existing subscribers are only
    /// notified if `current` differs from what they last saw.
    pub async fn subscribe(&self, id: Uuid, current: Option<Presentation>) -> Subscription {
        let mut channels = self.channels.write().await;
        let sender = channels
            .entry(id)
            .or_insert_with(|| watch::channel(None).0);
        sender.send_if_modified(|latest| {
            if *latest == current {
                return false;
            }
            *latest = current;
            true
        });
        let mut rx = sender.subscribe();
        rx.mark_changed();
        rx
    }

    /// Deliver a committed document to every subscriber.
    pub async fn publish(&self, doc: &Presentation) {
        let mut channels = self.channels.write().await;
        let Some(sender) = channels.get(&doc.id) else {
            return;
        };
        if sender.receiver_count() == 0 {
            channels.remove(&doc.id);
            return;
        }
        sender.send_replace(Some(doc.clone()));
    }

    /// Tell subscribers the document no longer exists.
    pub async fn publish_missing(&self, id: Uuid) {
        let mut channels = self.channels.write().await;
        if let Some(sender) = channels.remove(&id) {
            sender.send_replace(None);
        }
    }

    /// Number of documents with live channels.
    #[cfg(test)]
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use tokio::sync::Mutex;

    use super::*;
    use crate::doc::{CREATOR_NAME, Slide, User};
    use crate::services::role::Role;

    /// Draft with `slide_count` empty slides and the given users.
    #[must_use]
    pub fn draft(slide_count: usize, users: &[(&str, Role)]) -> NewPresentation {
        NewPresentation {
            name: "Test deck".into(),
            slides: (0..slide_count).map(|_| Slide::empty()).collect(),
            users: users
                .iter()
                .map(|(name, role)| User { name: (*name).to_string(), role: *role })
                .collect(),
            created_at: 1_700_000_000_000,
        }
    }

    /// Create a one-slide deck owned by the default creator.
    pub async fn seed(store: &dyn DocumentStore) -> Presentation {
        store
            .create(draft(1, &[(CREATOR_NAME, Role::Creator)]))
            .await
            .expect("seed presentation")
    }

    /// `MemoryStore` wrapper that records slide writes and can fail on demand.
    pub struct RecordingStore {
        pub inner: MemoryStore,
        pub updates: AtomicUsize,
        pub fail_updates: AtomicBool,
        pub written: Mutex<Vec<PresentationPatch>>,
    }

    impl RecordingStore {
        #[must_use]
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                inner: MemoryStore::new(),
                updates: AtomicUsize::new(0),
                fail_updates: AtomicBool::new(false),
                written: Mutex::new(Vec::new()),
            })
        }

        pub fn update_count(&self) -> usize {
            self.updates.load(Ordering::SeqCst)
        }

        pub fn set_failing(&self, failing: bool) {
            self.fail_updates.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl DocumentStore for RecordingStore {
        async fn create(&self, draft: NewPresentation) -> Result<Presentation, StoreError> {
            self.inner.create(draft).await
        }

        async fn get(&self, id: Uuid) -> Result<Option<Presentation>, StoreError> {
            self.inner.get(id).await
        }

        async fn list(&self) -> Result<Vec<PresentationSummary>, StoreError> {
            self.inner.list().await
        }

        async fn update(&self, id: Uuid, patch: PresentationPatch) -> Result<(), StoreError> {
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("injected failure".into()));
            }
            self.updates.fetch_add(1, Ordering::SeqCst);
            self.written.lock().await.push(patch.clone());
            self.inner.update(id, patch).await
        }

        async fn subscribe(&self, id: Uuid) -> Result<Subscription, StoreError> {
            self.inner.subscribe(id).await
        }
    }
}
