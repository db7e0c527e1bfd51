//! Canvas tools: shape factories, selection/drawing modes, style setters.
//!
//! Shapes are placed near the canvas center and become the active object.
//! Style setters act on the active object only; font setters additionally
//! require it to be a textbox and report `false` otherwise.

use super::snapshot::{CanvasObject, Fill, Gradient, ObjectKind};
use super::{Brush, DrawingSurface, SurfaceError};

const SHAPE_SIZE: f64 = 100.0;
const SHAPE_FILL: &str = "rgba(0,0,0,0.1)";
const SHAPE_STROKE: &str = "#000";
const SHAPE_STROKE_WIDTH: f64 = 2.0;
const TEXT_PLACEHOLDER: &str = "Click to edit text";
const TEXT_WIDTH: f64 = 200.0;
const TEXT_FONT_SIZE: f64 = 20.0;
const IMAGE_SCALE: f64 = 0.5;

/// Shapes the toolbar can insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Rectangle,
    Circle,
    Triangle,
    Text,
}

impl Shape {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "rectangle" | "rect" => Some(Self::Rectangle),
            "circle" => Some(Self::Circle),
            "triangle" => Some(Self::Triangle),
            "text" | "textbox" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Style change applied to the active object.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleChange {
    StrokeWidth(f64),
    Stroke(String),
    Fill(String),
    Gradient { start: String, end: String },
    FontFamily(String),
    FontWeight(String),
}

fn centered_shape(surface: &dyn DrawingSurface, kind: ObjectKind) -> CanvasObject {
    let (w, h) = surface.size();
    let mut obj = CanvasObject::new(kind);
    obj.left = w / 2.0 - SHAPE_SIZE / 2.0;
    obj.top = h / 2.0 - SHAPE_SIZE / 2.0;
    obj.fill = Some(Fill::Color(SHAPE_FILL.into()));
    obj.stroke = Some(SHAPE_STROKE.into());
    obj.stroke_width = SHAPE_STROKE_WIDTH;
    obj
}

/// Build the object a shape tool inserts, without adding it.
#[must_use]
pub fn shape_object(surface: &dyn DrawingSurface, shape: Shape) -> CanvasObject {
    match shape {
        Shape::Rectangle | Shape::Triangle => {
            let kind = if shape == Shape::Rectangle { ObjectKind::Rect } else { ObjectKind::Triangle };
            let mut obj = centered_shape(surface, kind);
            obj.width = SHAPE_SIZE;
            obj.height = SHAPE_SIZE;
            obj
        }
        Shape::Circle => {
            let mut obj = centered_shape(surface, ObjectKind::Circle);
            obj.radius = Some(SHAPE_SIZE / 2.0);
            obj
        }
        Shape::Text => {
            let (w, h) = surface.size();
            let mut obj = CanvasObject::new(ObjectKind::Textbox);
            obj.left = w / 2.0;
            obj.top = h / 2.0;
            obj.origin_x = Some("center".into());
            obj.origin_y = Some("center".into());
            obj.width = TEXT_WIDTH;
            obj.height = TEXT_FONT_SIZE * 1.16;
            obj.text = Some(TEXT_PLACEHOLDER.into());
            obj.font_size = Some(TEXT_FONT_SIZE);
            obj.fill = Some(Fill::Color("#000000".into()));
            obj.text_align = Some("center".into());
            obj
        }
    }
}

/// Insert a shape and make it the active object. Returns its id.
pub fn create_shape(surface: &mut dyn DrawingSurface, shape: Shape) -> String {
    let obj = shape_object(surface, shape);
    let id = surface.add_object(obj);
    surface.set_active_objects(std::slice::from_ref(&id));
    id
}

/// Insert an image from a URL (usually a `data:` URL) centered at half scale.
///
/// `natural_size` is the decoded pixel size when known.
///
/// # Errors
///
/// Returns `InvalidObject` for an empty source.
pub fn create_image(
    surface: &mut dyn DrawingSurface,
    src: &str,
    natural_size: Option<(f64, f64)>,
) -> Result<String, SurfaceError> {
    if src.trim().is_empty() {
        return Err(SurfaceError::InvalidObject("image source is empty".into()));
    }
    let (w, h) = surface.size();
    let (nw, nh) = natural_size.unwrap_or((w / 2.0, h / 2.0));
    let mut obj = CanvasObject::new(ObjectKind::Image);
    obj.left = w / 2.0;
    obj.top = h / 2.0;
    obj.origin_x = Some("center".into());
    obj.origin_y = Some("center".into());
    obj.width = nw;
    obj.height = nh;
    obj.scale_x = IMAGE_SCALE;
    obj.scale_y = IMAGE_SCALE;
    obj.src = Some(src.to_owned());
    let id = surface.add_object(obj);
    surface.set_active_objects(std::slice::from_ref(&id));
    Ok(id)
}

/// Leave drawing mode; objects stay selectable.
pub fn enable_select(surface: &mut dyn DrawingSurface) {
    surface.set_drawing_mode(None);
}

/// Enter free drawing with the default pencil brush.
pub fn enable_drawing(surface: &mut dyn DrawingSurface) {
    surface.set_drawing_mode(Some(Brush::default()));
}

/// Build a freehand path object from brush points.
///
/// # Errors
///
/// Returns `InvalidObject` when fewer than two points are given.
pub fn path_from_points(points: &[(f64, f64)], brush: &Brush) -> Result<CanvasObject, SurfaceError> {
    let [first, rest @ ..] = points else {
        return Err(SurfaceError::InvalidObject("path needs at least two points".into()));
    };
    if rest.is_empty() {
        return Err(SurfaceError::InvalidObject("path needs at least two points".into()));
    }

    let mut commands = Vec::with_capacity(points.len());
    commands.push(vec![serde_json::json!("M"), serde_json::json!(first.0), serde_json::json!(first.1)]);
    for (x, y) in rest {
        commands.push(vec![serde_json::json!("L"), serde_json::json!(x), serde_json::json!(y)]);
    }

    let (min_x, min_y, max_x, max_y) = points.iter().fold(
        (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        |(ax, ay, bx, by), (x, y)| (ax.min(*x), ay.min(*y), bx.max(*x), by.max(*y)),
    );

    let mut obj = CanvasObject::new(ObjectKind::Path);
    obj.left = min_x;
    obj.top = min_y;
    obj.width = max_x - min_x;
    obj.height = max_y - min_y;
    obj.stroke = Some(brush.color.clone());
    obj.stroke_width = brush.width;
    obj.path = Some(commands);
    Ok(obj)
}

/// Delete every selected object. Returns how many were removed.
pub fn delete_selected(surface: &mut dyn DrawingSurface) -> usize {
    let ids: Vec<String> = surface
        .active_objects()
        .iter()
        .filter_map(|o| o.id.clone())
        .collect();
    let removed = ids
        .iter()
        .filter(|id| surface.remove_object(id).is_some())
        .count();
    if removed > 0 {
        surface.discard_active_object();
        surface.render_all();
    }
    removed
}

/// Apply a style change to the active object. Returns whether anything changed.
pub fn apply_style(surface: &mut dyn DrawingSurface, change: &StyleChange) -> bool {
    let Some(active) = surface.active_object() else {
        return false;
    };
    let Some(id) = active.id.clone() else {
        return false;
    };
    let is_textbox = active.object_kind() == ObjectKind::Textbox;
    if matches!(change, StyleChange::FontFamily(_) | StyleChange::FontWeight(_)) && !is_textbox {
        return false;
    }

    let changed = surface.modify_object(&id, &mut |obj| match change {
        StyleChange::StrokeWidth(width) => obj.stroke_width = *width,
        StyleChange::Stroke(color) => obj.stroke = Some(color.clone()),
        StyleChange::Fill(color) => obj.fill = Some(Fill::Color(color.clone())),
        StyleChange::Gradient { start, end } => {
            let (w, h) = obj.intrinsic_size();
            obj.fill = Some(Fill::Gradient(Gradient::linear(start, end, w, h)));
        }
        StyleChange::FontFamily(font) => obj.font_family = Some(font.clone()),
        StyleChange::FontWeight(weight) => obj.font_weight = Some(serde_json::json!(weight)),
    });
    if changed {
        surface.render_all();
    }
    changed
}

#[cfg(test)]
#[path = "tools_test.rs"]
mod tests;
