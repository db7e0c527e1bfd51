//! Presentation service — create, list, join, role assignment, presence.
//!
//! DESIGN
//! ======
//! Identity is a name handed out by the server: the creator is always
//! `Annon0`, joiners get `Annon{n}` where `n` starts at the current user
//! count plus one and is bumped until unique. Joining and role changes
//! rewrite the whole `users` array (last writer wins, same as slides).
//!
//! Presence is process-local: it counts open editing sessions per name and
//! is never written to the document.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::role::{Action, Role, permits};
use crate::doc::{
    CREATOR_NAME, DEFAULT_PRESENTATION_NAME, JOINER_PREFIX, NewPresentation, Presentation, PresentationPatch,
    PresentationSummary, Slide, User,
};
use crate::frame::{ErrorCode, now_ms};
use crate::store::{DocumentStore, StoreError};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PresentationError {
    #[error("presentation not found: {0}")]
    NotFound(Uuid),
    #[error("only the creator may change roles")]
    NotCreator,
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("the creator cannot change their own role")]
    OwnRole,
    #[error("the creator role cannot be assigned")]
    CreatorReserved,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PresentationError {
    /// Permission failures that are silently ignored on the editing socket.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::NotCreator)
    }
}

impl ErrorCode for PresentationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_PRESENTATION_NOT_FOUND",
            Self::NotCreator => "E_DENIED",
            Self::UserNotFound(_) => "E_USER_NOT_FOUND",
            Self::OwnRole => "E_OWN_ROLE",
            Self::CreatorReserved => "E_CREATOR_RESERVED",
            Self::Store(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.retryable(),
            _ => false,
        }
    }
}

/// Who the caller is within a presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub role: Role,
}

/// A user row with live presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserStatus {
    pub name: String,
    pub role: Role,
    pub online: bool,
}

// =============================================================================
// DIRECTORY
// =============================================================================

/// Create a presentation with one empty slide owned by the default creator.
///
/// # Errors
///
/// Returns the store error if the insert fails.
pub async fn create(store: &dyn DocumentStore, name: Option<&str>) -> Result<Identity, PresentationError> {
    let name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_PRESENTATION_NAME);
    let doc = store
        .create(NewPresentation {
            name: name.to_owned(),
            slides: vec![Slide::empty()],
            users: vec![User { name: CREATOR_NAME.into(), role: Role::Creator }],
            created_at: now_ms(),
        })
        .await?;
    info!(presentation_id = %doc.id, name = %doc.name, "presentation created");
    Ok(Identity { id: doc.id, name: doc.name, username: CREATOR_NAME.into(), role: Role::Creator })
}

/// Summaries, newest first, optionally filtered by a case-insensitive name
/// substring.
///
/// # Errors
///
/// Returns the store error if listing fails.
pub async fn list(
    store: &dyn DocumentStore,
    search: Option<&str>,
) -> Result<Vec<PresentationSummary>, PresentationError> {
    let rows = store.list().await?;
    let Some(needle) = search.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(rows);
    };
    let needle = needle.to_lowercase();
    Ok(rows
        .into_iter()
        .filter(|row| row.name.to_lowercase().contains(&needle))
        .collect())
}

/// Fetch a presentation or fail with `NotFound`.
///
/// # Errors
///
/// `NotFound` when absent; the store error if the read fails.
pub async fn get(store: &dyn DocumentStore, id: Uuid) -> Result<Presentation, PresentationError> {
    store.get(id).await?.ok_or(PresentationError::NotFound(id))
}

/// Next free joiner name.
#[must_use]
pub fn joiner_name(users: &[User]) -> String {
    let taken: HashSet<&str> = users.iter().map(|u| u.name.as_str()).collect();
    let mut n = users.len() + 1;
    loop {
        let candidate = format!("{JOINER_PREFIX}{n}");
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        n += 1;
    }
}

/// Join as a new viewer with a generated name.
///
/// # Errors
///
/// `NotFound` when the presentation does not exist; the store error if the
/// users write fails.
pub async fn join(store: &dyn DocumentStore, id: Uuid) -> Result<Identity, PresentationError> {
    let doc = get(store, id).await?;
    let username = joiner_name(&doc.users);
    let mut users = doc.users;
    users.push(User { name: username.clone(), role: Role::Viewer });
    store
        .update(id, PresentationPatch::users(users, now_ms()))
        .await
        .map_err(|e| match e {
            StoreError::NotFound(id) => PresentationError::NotFound(id),
            other => PresentationError::Store(other),
        })?;
    info!(presentation_id = %id, %username, "user joined");
    Ok(Identity { id, name: doc.name, username, role: Role::Viewer })
}

/// Assign `role` to `target`. Only the creator may do this, never to
/// themselves, and the creator role itself is not assignable.
///
/// # Errors
///
/// `NotCreator`, `OwnRole`, `CreatorReserved`, `UserNotFound`, `NotFound`,
/// or the store error.
pub async fn set_role(
    store: &dyn DocumentStore,
    id: Uuid,
    actor: &str,
    target: &str,
    role: Role,
) -> Result<Vec<User>, PresentationError> {
    let doc = get(store, id).await?;
    let actor_role = doc.user(actor).map_or(Role::Viewer, |u| u.role);
    if !permits(actor_role, Action::ChangeRole) {
        debug!(presentation_id = %id, actor, "role change denied");
        return Err(PresentationError::NotCreator);
    }
    if actor == target {
        return Err(PresentationError::OwnRole);
    }
    if role == Role::Creator {
        return Err(PresentationError::CreatorReserved);
    }

    let mut users = doc.users;
    let user = users
        .iter_mut()
        .find(|u| u.name == target)
        .ok_or_else(|| PresentationError::UserNotFound(target.to_owned()))?;
    user.role = role;

    store
        .update(id, PresentationPatch::users(users.clone(), now_ms()))
        .await?;
    info!(presentation_id = %id, target, %role, "role changed");
    Ok(users)
}

// =============================================================================
// PRESENCE
// =============================================================================

/// Open editing sessions per presentation, counted per name.
#[derive(Default)]
pub struct Presence {
    online: RwLock<HashMap<Uuid, HashMap<String, usize>>>,
}

impl Presence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn enter(&self, id: Uuid, name: &str) {
        let mut online = self.online.write().await;
        *online.entry(id).or_default().entry(name.to_owned()).or_default() += 1;
    }

    pub async fn leave(&self, id: Uuid, name: &str) {
        let mut online = self.online.write().await;
        let Some(names) = online.get_mut(&id) else {
            return;
        };
        if let Some(count) = names.get_mut(name) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                names.remove(name);
            }
        }
        if names.is_empty() {
            online.remove(&id);
        }
    }

    pub async fn online(&self, id: Uuid) -> HashSet<String> {
        self.online
            .read()
            .await
            .get(&id)
            .map(|names| names.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Users of a presentation with their presence flag.
///
/// # Errors
///
/// `NotFound` when the presentation does not exist.
pub async fn users_with_presence(
    store: &dyn DocumentStore,
    presence: &Presence,
    id: Uuid,
) -> Result<Vec<UserStatus>, PresentationError> {
    let doc = get(store, id).await?;
    let online = presence.online(id).await;
    Ok(doc
        .users
        .into_iter()
        .map(|u| UserStatus { online: online.contains(&u.name), name: u.name, role: u.role })
        .collect())
}

#[cfg(test)]
#[path = "presentation_test.rs"]
mod tests;
