//! Slide service — add, remove, and switch slides within a session.
//!
//! DESIGN
//! ======
//! Every operation re-checks the role gate. Structural changes (add/remove)
//! persist the whole slides array immediately through the sync engine and
//! only then update the session; a failed write leaves the session as it
//! was. Switching persists the live edits of the slide being left before
//! loading the target, so leaving a slide never discards its last edits.

use tracing::{debug, info};

use super::role::Action;
use super::session::Session;
use super::sync::SyncEngine;
use crate::doc::Slide;
use crate::frame::ErrorCode;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SlideError {
    #[error("action not permitted for role {0}")]
    Denied(crate::services::role::Role),
    #[error("cannot remove the last slide")]
    LastSlide,
    #[error("slide index {index} out of range (0..{len})")]
    OutOfRange { index: usize, len: usize },
    #[error("slide not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SlideError {
    /// Guard failures that must look like "nothing happened" to the caller.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Denied(_) | Self::LastSlide)
    }
}

impl ErrorCode for SlideError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Denied(_) => "E_DENIED",
            Self::LastSlide => "E_LAST_SLIDE",
            Self::OutOfRange { .. } => "E_SLIDE_OUT_OF_RANGE",
            Self::NotFound(_) => "E_SLIDE_NOT_FOUND",
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

/// Which slide to switch to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlideTarget {
    Index(usize),
    Id(String),
}

/// Append an empty slide after the live deck and make it active.
///
/// # Errors
///
/// `Denied` for viewers; `Store` if the write fails.
pub async fn add_slide(session: &mut Session, engine: &mut SyncEngine) -> Result<usize, SlideError> {
    if !session.can(Action::AddSlide) {
        debug!(username = %session.username, role = %session.role, "add slide denied");
        return Err(SlideError::Denied(session.role));
    }

    let mut slides = session.slides_with_live_edits();
    slides.push(Slide::empty());
    let index = slides.len() - 1;
    engine.persist(slides.clone()).await?;

    session.slides = slides;
    session.current_slide_index = index;
    session.load_current();
    info!(presentation_id = %session.presentation_id, index, "slide added");
    Ok(index)
}

/// Remove the active slide and show the one before it.
///
/// # Errors
///
/// `Denied` for viewers; `LastSlide` when one slide remains; `Store` if
/// the write fails.
pub async fn remove_slide(session: &mut Session, engine: &mut SyncEngine) -> Result<usize, SlideError> {
    if !session.can(Action::RemoveSlide) {
        debug!(username = %session.username, role = %session.role, "remove slide denied");
        return Err(SlideError::Denied(session.role));
    }
    if session.slides.len() <= 1 {
        debug!(presentation_id = %session.presentation_id, "refusing to remove the last slide");
        return Err(SlideError::LastSlide);
    }

    let removed = session.current_slide_index;
    let mut slides = session.slides.clone();
    slides.remove(removed);
    let index = removed.saturating_sub(1);
    engine.persist(slides.clone()).await?;

    session.slides = slides;
    session.current_slide_index = index;
    session.load_current();
    info!(presentation_id = %session.presentation_id, removed, index, "slide removed");
    Ok(index)
}

/// Make `target` the active slide. Editors save the slide being left first;
/// viewers navigate without writing.
///
/// # Errors
///
/// `OutOfRange` / `NotFound` for a bad target; `Store` if saving the slide
/// being left fails, in which case the switch does not happen.
pub async fn switch_slide(
    session: &mut Session,
    engine: &mut SyncEngine,
    target: &SlideTarget,
) -> Result<usize, SlideError> {
    let index = resolve(session, target)?;
    if index == session.current_slide_index {
        return Ok(index);
    }

    if session.role.can_edit() {
        let slides = session.slides_with_live_edits();
        engine.persist(slides.clone()).await?;
        session.slides = slides;
    }

    session.current_slide_index = index;
    session.load_current();
    debug!(presentation_id = %session.presentation_id, index, "switched slide");
    Ok(index)
}

fn resolve(session: &Session, target: &SlideTarget) -> Result<usize, SlideError> {
    match target {
        SlideTarget::Index(index) => {
            if *index < session.slides.len() {
                Ok(*index)
            } else {
                Err(SlideError::OutOfRange { index: *index, len: session.slides.len() })
            }
        }
        SlideTarget::Id(id) => session
            .slides
            .iter()
            .position(|s| s.id.as_deref() == Some(id.as_str()))
            .ok_or_else(|| SlideError::NotFound(id.clone())),
    }
}

#[cfg(test)]
#[path = "slides_test.rs"]
mod tests;
