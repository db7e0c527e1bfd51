//! Document model: presentations, slides, and users as stored and fanned out.
//!
//! DESIGN
//! ======
//! One document per presentation. Writers replace whole fields (`slides`,
//! `users`, `lastEdited`) through `PresentationPatch`; there is no
//! field-level merge and no version check. Field names on the wire follow
//! the document store's camelCase shape.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::role::Role;
use crate::surface::snapshot::Snapshot;

/// Name given to the user who creates a presentation.
pub const CREATOR_NAME: &str = "Annon0";

/// Name prefix for auto-generated joiner identities.
pub const JOINER_PREFIX: &str = "Annon";

/// Default presentation name.
pub const DEFAULT_PRESENTATION_NAME: &str = "New Presentation";

// =============================================================================
// SLIDE
// =============================================================================

/// One canvas page. `canvas_data` is a serialized drawing-surface snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub canvas_data: String,
}

impl Slide {
    /// A new slide with a fresh id holding an empty-canvas snapshot.
    #[must_use]
    pub fn empty() -> Self {
        Self { id: Some(Uuid::new_v4().to_string()), canvas_data: Snapshot::empty().to_json() }
    }

    #[must_use]
    pub fn with_canvas_data(&self, canvas_data: String) -> Self {
        Self { id: self.id.clone(), canvas_data }
    }
}

// =============================================================================
// USER
// =============================================================================

/// A participant. The name doubles as identity; there is no auth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub role: Role,
}

// =============================================================================
// PRESENTATION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presentation {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub slides: Vec<Slide>,
    #[serde(default)]
    pub users: Vec<User>,
    pub created_at: i64,
    pub last_edited: i64,
}

impl Presentation {
    /// Look up a user by name.
    #[must_use]
    pub fn user(&self, name: &str) -> Option<&User> {
        self.users.iter().find(|u| u.name == name)
    }

    #[must_use]
    pub fn summary(&self) -> PresentationSummary {
        PresentationSummary {
            id: self.id,
            name: self.name.clone(),
            created_at: self.created_at,
            last_edited: self.last_edited,
            slide_count: self.slides.len(),
        }
    }

    /// Apply a whole-field patch. Absent fields are left untouched.
    pub fn apply(&mut self, patch: PresentationPatch) {
        if let Some(slides) = patch.slides {
            self.slides = slides;
        }
        if let Some(users) = patch.users {
            self.users = users;
        }
        self.last_edited = patch.last_edited;
    }
}

/// Fields of a presentation to create.
#[derive(Debug, Clone)]
pub struct NewPresentation {
    pub name: String,
    pub slides: Vec<Slide>,
    pub users: Vec<User>,
    pub created_at: i64,
}

/// Whole-field replacement. Every write stamps `last_edited`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresentationPatch {
    pub slides: Option<Vec<Slide>>,
    pub users: Option<Vec<User>>,
    pub last_edited: i64,
}

impl PresentationPatch {
    #[must_use]
    pub fn slides(slides: Vec<Slide>, last_edited: i64) -> Self {
        Self { slides: Some(slides), users: None, last_edited }
    }

    #[must_use]
    pub fn users(users: Vec<User>, last_edited: i64) -> Self {
        Self { slides: None, users: Some(users), last_edited }
    }
}

/// Listing-page row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationSummary {
    pub id: Uuid,
    pub name: String,
    pub created_at: i64,
    pub last_edited: i64,
    pub slide_count: usize,
}

#[cfg(test)]
#[path = "doc_test.rs"]
mod tests;
