//! Drawing surface — the object-graph canvas a session edits.
//!
//! ARCHITECTURE
//! ============
//! `DrawingSurface` is the capability the synchronization engine consumes:
//! load/serialize snapshots, clear, render, add/remove/modify objects,
//! selection, and object-level change events. `Canvas` is the in-memory
//! implementation each editing session owns.
//!
//! EVENTS
//! ======
//! Mutations made through the surface (`add_object`, `remove_object`,
//! `modify_object`, `add_path`) notify listeners registered with `on`.
//! `load_snapshot` and `clear` are silent: reloading remote content must
//! never look like a local edit, or every delivery would echo back as a write.

pub mod canvas;
pub mod raster;
pub mod snapshot;
pub mod tools;

pub use canvas::Canvas;

use snapshot::{CanvasObject, SnapshotError};

/// Canvas width in pixels; also the export page width.
pub const CANVAS_WIDTH: f64 = 1024.0;

/// Canvas height in pixels; also the export page height.
pub const CANVAS_HEIGHT: f64 = 768.0;

/// Default canvas background.
pub const CANVAS_BACKGROUND: &str = "#1C232B";

// =============================================================================
// EVENTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ObjectAdded,
    ObjectModified,
    ObjectRemoved,
    PathCreated,
}

impl EventKind {
    pub const ALL: [EventKind; 4] =
        [EventKind::ObjectAdded, EventKind::ObjectModified, EventKind::ObjectRemoved, EventKind::PathCreated];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ObjectAdded => "object:added",
            Self::ObjectModified => "object:modified",
            Self::ObjectRemoved => "object:removed",
            Self::PathCreated => "path:created",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceEvent {
    pub kind: EventKind,
    pub object_id: Option<String>,
}

/// Listener callback.
pub type Handler = Box<dyn FnMut(&SurfaceEvent) + Send>;

/// Registration handle returned by `on`, consumed by `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Free-drawing brush.
#[derive(Debug, Clone, PartialEq)]
pub struct Brush {
    pub width: f64,
    pub color: String,
}

impl Default for Brush {
    fn default() -> Self {
        Self { width: 5.0, color: "#000".into() }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("object not found: {0}")]
    ObjectNotFound(String),
    #[error("no active object")]
    NoActiveObject,
    #[error("invalid object: {0}")]
    InvalidObject(String),
}

impl crate::frame::ErrorCode for SurfaceError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => "E_SNAPSHOT",
            Self::ObjectNotFound(_) => "E_OBJECT_NOT_FOUND",
            Self::NoActiveObject => "E_NO_ACTIVE_OBJECT",
            Self::InvalidObject(_) => "E_INVALID_OBJECT",
        }
    }
}

// =============================================================================
// CAPABILITY
// =============================================================================

pub trait DrawingSurface: Send {
    /// Canvas dimensions `(width, height)`.
    fn size(&self) -> (f64, f64);

    /// Replace the object graph with a serialized snapshot. Silent.
    ///
    /// # Errors
    ///
    /// Returns a snapshot error if `raw` cannot be parsed; the surface is
    /// left unchanged in that case.
    fn load_snapshot(&mut self, raw: &str) -> Result<(), SurfaceError>;

    /// Serialize the current object graph.
    fn serialize(&self) -> String;

    /// Drop every object and the selection. Silent.
    fn clear(&mut self);

    /// Run a render pass.
    fn render_all(&mut self);

    /// Add an object, assigning an id when it has none. Returns the id.
    fn add_object(&mut self, object: CanvasObject) -> String;

    /// Add a completed freehand path. Fires `path:created` and `object:added`.
    fn add_path(&mut self, path: CanvasObject) -> String;

    fn remove_object(&mut self, id: &str) -> Option<CanvasObject>;

    /// Edit one object in place. Returns false when the id is unknown.
    fn modify_object(&mut self, id: &str, edit: &mut dyn FnMut(&mut CanvasObject)) -> bool;

    fn objects(&self) -> &[CanvasObject];

    fn active_objects(&self) -> Vec<&CanvasObject>;

    /// Replace the selection; unknown ids are ignored.
    fn set_active_objects(&mut self, ids: &[String]);

    fn discard_active_object(&mut self);

    /// Toggle free drawing. `Some(brush)` enters drawing mode.
    fn set_drawing_mode(&mut self, brush: Option<Brush>);

    fn is_drawing_mode(&self) -> bool;

    fn on(&mut self, kind: EventKind, handler: Handler) -> ListenerId;

    fn off(&mut self, id: ListenerId) -> bool;

    /// The first selected object, if any.
    fn active_object(&self) -> Option<&CanvasObject> {
        self.active_objects().into_iter().next()
    }
}
