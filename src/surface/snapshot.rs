//! Snapshot format: the versioned, serialized object graph of a slide.
//!
//! The shape is `{"version": "6.6.1", "background": "#1C232B", "objects": [..]}`.
//! Objects carry a `type` tag plus geometry and style fields. Fields this
//! crate does not model are kept in `extra` so a snapshot written by a newer
//! renderer survives a load/serialize cycle untouched.

use serde::{Deserialize, Serialize};

use super::CANVAS_BACKGROUND;

/// Format version stamped on snapshots this crate writes.
pub const SNAPSHOT_VERSION: &str = "6.6.1";

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot data is empty")]
    Empty,
    #[error("malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),
}

// =============================================================================
// OBJECT KIND
// =============================================================================

/// Known object types. Unknown tags are preserved as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Rect,
    Circle,
    Triangle,
    Textbox,
    Image,
    Path,
    Other,
}

impl ObjectKind {
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Rect => "rect",
            Self::Circle => "circle",
            Self::Triangle => "triangle",
            Self::Textbox => "textbox",
            Self::Image => "image",
            Self::Path => "path",
            Self::Other => "object",
        }
    }

    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "rect" => Self::Rect,
            "circle" => Self::Circle,
            "triangle" => Self::Triangle,
            "textbox" | "text" | "i-text" => Self::Textbox,
            "image" => Self::Image,
            "path" => Self::Path,
            _ => Self::Other,
        }
    }
}

// =============================================================================
// FILL
// =============================================================================

/// Solid CSS color or a linear gradient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fill {
    Color(String),
    Gradient(Gradient),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gradient {
    #[serde(rename = "type", default = "linear")]
    pub kind: String,
    pub coords: GradientCoords,
    pub color_stops: Vec<ColorStop>,
}

fn linear() -> String {
    "linear".into()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientCoords {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub offset: f64,
    pub color: String,
}

impl Gradient {
    /// Diagonal two-stop gradient across a `width` × `height` box.
    #[must_use]
    pub fn linear(start: &str, end: &str, width: f64, height: f64) -> Self {
        Self {
            kind: linear(),
            coords: GradientCoords { x1: 0.0, y1: 0.0, x2: width, y2: height },
            color_stops: vec![
                ColorStop { offset: 0.0, color: start.to_owned() },
                ColorStop { offset: 1.0, color: end.to_owned() },
            ],
        }
    }
}

// =============================================================================
// OBJECT
// =============================================================================

fn one() -> f64 {
    1.0
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_one(v: &f64) -> bool {
    (*v - 1.0).abs() < f64::EPSILON
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(v: &f64) -> bool {
    v.abs() < f64::EPSILON
}

/// One drawable on a slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasObject {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub scale_x: f64,
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub scale_y: f64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub angle: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_y: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<Fill>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default = "one")]
    pub stroke_width: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_align: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Path commands such as `["M", x, y]`, `["Q", cx, cy, x, y]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Vec<serde_json::Value>>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CanvasObject {
    /// A bare object of the given kind at the origin.
    #[must_use]
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind: kind.tag().to_owned(),
            id: None,
            left: 0.0,
            top: 0.0,
            width: 0.0,
            height: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
            origin_x: None,
            origin_y: None,
            fill: None,
            stroke: None,
            stroke_width: 1.0,
            radius: None,
            text: None,
            font_size: None,
            font_family: None,
            font_weight: None,
            text_align: None,
            src: None,
            path: None,
            extra: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn object_kind(&self) -> ObjectKind {
        ObjectKind::from_tag(&self.kind)
    }

    /// Unscaled width and height. Circles derive both from `radius`.
    #[must_use]
    pub fn intrinsic_size(&self) -> (f64, f64) {
        match (self.object_kind(), self.radius) {
            (ObjectKind::Circle, Some(r)) => (r * 2.0, r * 2.0),
            _ => (self.width, self.height),
        }
    }

    /// Axis-aligned box `(x, y, w, h)` in canvas coordinates, honoring
    /// origin and scale. Rotation is ignored.
    #[must_use]
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let (w, h) = self.intrinsic_size();
        let w = w * self.scale_x;
        let h = h * self.scale_y;
        let x = match self.origin_x.as_deref() {
            Some("center") => self.left - w / 2.0,
            Some("right") => self.left - w,
            _ => self.left,
        };
        let y = match self.origin_y.as_deref() {
            Some("center") => self.top - h / 2.0,
            Some("bottom") => self.top - h,
            _ => self.top,
        };
        (x, y, w, h)
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default)]
    pub objects: Vec<CanvasObject>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_version() -> String {
    SNAPSHOT_VERSION.into()
}

impl Snapshot {
    /// Snapshot with zero objects at the current format version. Serializes
    /// byte-for-byte like a freshly created canvas.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            version: default_version(),
            background: Some(CANVAS_BACKGROUND.to_owned()),
            objects: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    /// Parse serialized canvas data.
    ///
    /// # Errors
    ///
    /// Returns `Empty` for blank input and `Malformed` for anything that is
    /// not a snapshot object.
    pub fn parse(raw: &str) -> Result<Self, SnapshotError> {
        if raw.trim().is_empty() {
            return Err(SnapshotError::Empty);
        }
        Ok(serde_json::from_str(raw)?)
    }

    /// Serialize to the string stored in `Slide::canvas_data`.
    #[must_use]
    pub fn to_json(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => {
                // Unreachable for this shape (string keys only); keep the invariant anyway.
                tracing::error!(error = %e, "snapshot serialization failed; writing empty snapshot");
                format!(r#"{{"version":"{SNAPSHOT_VERSION}","objects":[]}}"#)
            }
        }
    }
}

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod tests;
