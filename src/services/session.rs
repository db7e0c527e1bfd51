//! Session service — per-connection editing context.
//!
//! DESIGN
//! ======
//! A `Session` is created when a socket opens a presentation and dropped
//! when the socket closes. It holds the caller's identity and role, the
//! local mirror of `slides` and `users`, the active slide index, and the
//! drawing surface that shows the active slide. Operations receive it
//! explicitly; nothing about a session is process-global.

use tracing::warn;
use uuid::Uuid;

use super::role::{Action, Role, permits};
use crate::doc::{Presentation, Slide, User};
use crate::surface::DrawingSurface;

pub struct Session {
    pub presentation_id: Uuid,
    pub username: String,
    pub role: Role,
    pub slides: Vec<Slide>,
    pub users: Vec<User>,
    pub current_slide_index: usize,
    pub surface: Box<dyn DrawingSurface>,
}

impl Session {
    /// Fresh session with nothing loaded. Role stays `Viewer` until the
    /// first document delivery names this user.
    #[must_use]
    pub fn new(presentation_id: Uuid, username: impl Into<String>, surface: Box<dyn DrawingSurface>) -> Self {
        Self {
            presentation_id,
            username: username.into(),
            role: Role::Viewer,
            slides: Vec::new(),
            users: Vec::new(),
            current_slide_index: 0,
            surface,
        }
    }

    #[must_use]
    pub fn can(&self, action: Action) -> bool {
        permits(self.role, action)
    }

    #[must_use]
    pub fn current_slide(&self) -> Option<&Slide> {
        self.slides.get(self.current_slide_index)
    }

    /// Replace the mirror with a delivered document, refresh this user's
    /// role, and clamp the active index.
    pub fn apply_document(&mut self, doc: &Presentation) {
        self.slides.clone_from(&doc.slides);
        self.users.clone_from(&doc.users);
        self.refresh_role();
        self.clamp_index();
    }

    /// Role comes from the users list; unknown names are viewers.
    pub fn refresh_role(&mut self) {
        self.role = self
            .users
            .iter()
            .find(|u| u.name == self.username)
            .map_or(Role::Viewer, |u| u.role);
    }

    pub fn clamp_index(&mut self) {
        self.current_slide_index = self.current_slide_index.min(self.slides.len().saturating_sub(1));
    }

    /// The mirror with the active slide replaced by what the surface shows.
    /// Every other slide is copied through untouched.
    #[must_use]
    pub fn slides_with_live_edits(&self) -> Vec<Slide> {
        let mut slides = self.slides.clone();
        if let Some(slide) = slides.get_mut(self.current_slide_index) {
            slide.canvas_data = self.surface.serialize();
        }
        slides
    }

    /// Load the active slide into the surface. A slide that fails to parse
    /// leaves the surface blank. Returns whether the snapshot loaded.
    pub fn load_current(&mut self) -> bool {
        self.surface.clear();
        let loaded = match self.slides.get(self.current_slide_index) {
            Some(slide) => match self.surface.load_snapshot(&slide.canvas_data) {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        error = %e,
                        presentation_id = %self.presentation_id,
                        index = self.current_slide_index,
                        "slide snapshot failed to load; showing blank canvas"
                    );
                    false
                }
            },
            None => false,
        };
        self.surface.render_all();
        loaded
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
