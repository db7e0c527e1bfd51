//! In-process document store.
//!
//! Used when no `DATABASE_URL` is configured, and by tests. Commits are
//! serialized by the document map's write lock, so deliveries arrive in
//! commit order.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DocumentStore, Hub, StoreError, Subscription};
use crate::doc::{NewPresentation, Presentation, PresentationPatch, PresentationSummary};

#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<Uuid, Presentation>>,
    hub: Hub,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document verbatim, keeping its id. Test seeding only.
    #[cfg(test)]
    pub async fn insert(&self, doc: Presentation) {
        self.hub.publish(&doc).await;
        self.docs.write().await.insert(doc.id, doc);
    }

    /// Remove a document and deliver its absence to subscribers.
    pub async fn delete(&self, id: Uuid) -> bool {
        let removed = self.docs.write().await.remove(&id).is_some();
        if removed {
            self.hub.publish_missing(id).await;
        }
        removed
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, draft: NewPresentation) -> Result<Presentation, StoreError> {
        let doc = Presentation {
            id: Uuid::new_v4(),
            name: draft.name,
            slides: draft.slides,
            users: draft.users,
            created_at: draft.created_at,
            last_edited: draft.created_at,
        };
        self.docs.write().await.insert(doc.id, doc.clone());
        Ok(doc)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Presentation>, StoreError> {
        Ok(self.docs.read().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<PresentationSummary>, StoreError> {
        let mut rows: Vec<PresentationSummary> = self.docs.read().await.values().map(Presentation::summary).collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(rows)
    }

    async fn update(&self, id: Uuid, patch: PresentationPatch) -> Result<(), StoreError> {
        let mut docs = self.docs.write().await;
        let doc = docs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        doc.apply(patch);
        // Publish under the write lock so deliveries keep commit order.
        self.hub.publish(doc).await;
        Ok(())
    }

    async fn subscribe(&self, id: Uuid) -> Result<Subscription, StoreError> {
        let docs = self.docs.read().await;
        Ok(self.hub.subscribe(id, docs.get(&id).cloned()).await)
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
