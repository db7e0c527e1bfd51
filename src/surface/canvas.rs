//! In-memory drawing surface owned by one editing session.

use uuid::Uuid;

use super::snapshot::{CanvasObject, Snapshot};
use super::{
    Brush, CANVAS_BACKGROUND, CANVAS_HEIGHT, CANVAS_WIDTH, DrawingSurface, EventKind, Handler, ListenerId,
    SurfaceError, SurfaceEvent,
};

struct Listener {
    id: ListenerId,
    kind: EventKind,
    handler: Handler,
}

pub struct Canvas {
    width: f64,
    height: f64,
    background: Option<String>,
    objects: Vec<CanvasObject>,
    /// Snapshot-level fields this crate does not model.
    extra: serde_json::Map<String, serde_json::Value>,
    active: Vec<String>,
    brush: Option<Brush>,
    listeners: Vec<Listener>,
    next_listener: u64,
    render_passes: u64,
}

impl Canvas {
    /// A 1024×768 canvas with the default background.
    #[must_use]
    pub fn new() -> Self {
        Self::with_size(CANVAS_WIDTH, CANVAS_HEIGHT)
    }

    #[must_use]
    pub fn with_size(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            background: Some(CANVAS_BACKGROUND.to_owned()),
            objects: Vec::new(),
            extra: serde_json::Map::new(),
            active: Vec::new(),
            brush: None,
            listeners: Vec::new(),
            next_listener: 1,
            render_passes: 0,
        }
    }

    /// Number of render passes run so far.
    #[cfg(test)]
    #[must_use]
    pub fn render_passes(&self) -> u64 {
        self.render_passes
    }

    #[cfg(test)]
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    #[cfg(test)]
    #[must_use]
    pub fn brush(&self) -> Option<&Brush> {
        self.brush.as_ref()
    }

    fn emit(&mut self, kind: EventKind, object_id: Option<&str>) {
        let event = SurfaceEvent { kind, object_id: object_id.map(str::to_owned) };
        for listener in &mut self.listeners {
            if listener.kind == kind {
                (listener.handler)(&event);
            }
        }
    }

    fn insert(&mut self, mut object: CanvasObject) -> String {
        let id = object
            .id
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone();
        self.objects.push(object);
        id
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawingSurface for Canvas {
    fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    fn load_snapshot(&mut self, raw: &str) -> Result<(), SurfaceError> {
        let snapshot = Snapshot::parse(raw)?;
        self.objects.clear();
        self.active.clear();
        if snapshot.background.is_some() {
            self.background = snapshot.background;
        }
        self.extra = snapshot.extra;
        for object in snapshot.objects {
            self.insert(object);
        }
        Ok(())
    }

    fn serialize(&self) -> String {
        Snapshot {
            version: super::snapshot::SNAPSHOT_VERSION.to_owned(),
            background: self.background.clone(),
            objects: self.objects.clone(),
            extra: self.extra.clone(),
        }
        .to_json()
    }

    fn clear(&mut self) {
        self.objects.clear();
        self.active.clear();
        self.extra.clear();
    }

    fn render_all(&mut self) {
        self.render_passes += 1;
    }

    fn add_object(&mut self, object: CanvasObject) -> String {
        let id = self.insert(object);
        self.emit(EventKind::ObjectAdded, Some(&id));
        id
    }

    fn add_path(&mut self, path: CanvasObject) -> String {
        let id = self.insert(path);
        self.emit(EventKind::ObjectAdded, Some(&id));
        self.emit(EventKind::PathCreated, Some(&id));
        id
    }

    fn remove_object(&mut self, id: &str) -> Option<CanvasObject> {
        let index = self
            .objects
            .iter()
            .position(|o| o.id.as_deref() == Some(id))?;
        let removed = self.objects.remove(index);
        self.active.retain(|a| a != id);
        self.emit(EventKind::ObjectRemoved, Some(id));
        Some(removed)
    }

    fn modify_object(&mut self, id: &str, edit: &mut dyn FnMut(&mut CanvasObject)) -> bool {
        let Some(object) = self
            .objects
            .iter_mut()
            .find(|o| o.id.as_deref() == Some(id))
        else {
            return false;
        };
        edit(object);
        self.emit(EventKind::ObjectModified, Some(id));
        true
    }

    fn objects(&self) -> &[CanvasObject] {
        &self.objects
    }

    fn active_objects(&self) -> Vec<&CanvasObject> {
        self.active
            .iter()
            .filter_map(|id| self.objects.iter().find(|o| o.id.as_deref() == Some(id.as_str())))
            .collect()
    }

    fn set_active_objects(&mut self, ids: &[String]) {
        self.active = ids
            .iter()
            .filter(|id| self.objects.iter().any(|o| o.id.as_deref() == Some(id.as_str())))
            .cloned()
            .collect();
    }

    fn discard_active_object(&mut self) {
        self.active.clear();
    }

    fn set_drawing_mode(&mut self, brush: Option<Brush>) {
        self.brush = brush;
    }

    fn is_drawing_mode(&self) -> bool {
        self.brush.is_some()
    }

    fn on(&mut self, kind: EventKind, handler: Handler) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push(Listener { id, kind, handler });
        id
    }

    fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }
}

#[cfg(test)]
#[path = "canvas_test.rs"]
mod tests;
