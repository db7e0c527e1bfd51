//! Postgres-backed document store.
//!
//! DESIGN
//! ======
//! One row per presentation; `slides` and `users` are JSONB arrays written
//! whole. Updates use `COALESCE` so a patch only replaces the columns it
//! carries, and `RETURNING` hands back the committed row for fan-out.
//!
//! Fan-out is in-process: subscribers attached to this server see every
//! write made through this server. Writes are serialized through
//! `write_lock` so deliveries follow commit order. Subscribing reads the row
//! under the same lock, so the seed handed to the hub is never older than
//! the last published write.

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{DocumentStore, Hub, StoreError, Subscription};
use crate::doc::{NewPresentation, Presentation, PresentationPatch, PresentationSummary, Slide, User};

type Row = (Uuid, String, serde_json::Value, serde_json::Value, i64, i64);

const SELECT_COLUMNS: &str = "id, name, slides, users, created_at, last_edited";

pub struct PgStore {
    pool: PgPool,
    hub: Hub,
    write_lock: Mutex<()>,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool, hub: Hub::new(), write_lock: Mutex::new(()) }
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Presentation>, StoreError> {
        let row = sqlx::query_as::<_, Row>(&format!("SELECT {SELECT_COLUMNS} FROM presentations WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(decode_row).transpose()
    }
}

fn decode_row((id, name, slides, users, created_at, last_edited): Row) -> Result<Presentation, StoreError> {
    let slides: Vec<Slide> = serde_json::from_value(slides).map_err(|source| StoreError::Corrupt { id, source })?;
    let users: Vec<User> = serde_json::from_value(users).map_err(|source| StoreError::Corrupt { id, source })?;
    Ok(Presentation { id, name, slides, users, created_at, last_edited })
}

fn encode<T: serde::Serialize>(id: Uuid, value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value).map_err(|source| StoreError::Corrupt { id, source })
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn create(&self, draft: NewPresentation) -> Result<Presentation, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO presentations (id, name, slides, users, created_at, last_edited)
             VALUES ($1, $2, $3, $4, $5, $5)",
        )
        .bind(id)
        .bind(&draft.name)
        .bind(encode(id, &draft.slides)?)
        .bind(encode(id, &draft.users)?)
        .bind(draft.created_at)
        .execute(&self.pool)
        .await?;

        Ok(Presentation {
            id,
            name: draft.name,
            slides: draft.slides,
            users: draft.users,
            created_at: draft.created_at,
            last_edited: draft.created_at,
        })
    }

    async fn get(&self, id: Uuid) -> Result<Option<Presentation>, StoreError> {
        self.fetch(id).await
    }

    async fn list(&self) -> Result<Vec<PresentationSummary>, StoreError> {
        let rows = sqlx::query_as::<_, (Uuid, String, i64, i64, i32)>(
            "SELECT id, name, created_at, last_edited, jsonb_array_length(slides)
             FROM presentations
             ORDER BY created_at DESC, name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, created_at, last_edited, slide_count)| PresentationSummary {
                id,
                name,
                created_at,
                last_edited,
                slide_count: usize::try_from(slide_count).unwrap_or(0),
            })
            .collect())
    }

    async fn update(&self, id: Uuid, patch: PresentationPatch) -> Result<(), StoreError> {
        let slides = patch.slides.as_ref().map(|s| encode(id, s)).transpose()?;
        let users = patch.users.as_ref().map(|u| encode(id, u)).transpose()?;

        let _guard = self.write_lock.lock().await;
        let row = sqlx::query_as::<_, Row>(&format!(
            "UPDATE presentations
             SET slides = COALESCE($2, slides),
                 users = COALESCE($3, users),
                 last_edited = $4
             WHERE id = $1
             RETURNING {SELECT_COLUMNS}"
        ))
        .bind(id)
        .bind(slides)
        .bind(users)
        .bind(patch.last_edited)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound(id))?;

        let doc = decode_row(row)?;
        self.hub.publish(&doc).await;
        Ok(())
    }

    async fn subscribe(&self, id: Uuid) -> Result<Subscription, StoreError> {
        let _guard = self.write_lock.lock().await;
        let current = self.fetch(id).await?;
        Ok(self.hub.subscribe(id, current).await)
    }
}

#[cfg(test)]
#[path = "postgres_test.rs"]
mod tests;
