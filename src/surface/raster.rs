//! Rasterizer: paints a snapshot onto a fixed-size RGB image for export.
//!
//! Covers rectangles, circles, triangles, freehand paths, `data:` URL images
//! and solid or linear-gradient fills. Textboxes paint their box as a faint
//! block in the text color; there is no glyph shaping here. Unknown object
//! types are skipped.

#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]

use base64::Engine;
use tiny_skia::{
    Color, FillRule, GradientStop, IntSize, LinearGradient, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Point,
    Rect, SpreadMode, Stroke, Transform,
};

use super::CANVAS_BACKGROUND;
use super::snapshot::{CanvasObject, Fill, ObjectKind, Snapshot};

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("invalid raster size {0}x{1}")]
    InvalidSize(u32, u32),
}

/// Paint `snapshot` onto a `width` × `height` pixmap.
///
/// # Errors
///
/// Returns `InvalidSize` if the pixmap cannot be allocated.
pub fn rasterize(snapshot: &Snapshot, width: u32, height: u32) -> Result<Pixmap, RasterError> {
    let mut pixmap = Pixmap::new(width, height).ok_or(RasterError::InvalidSize(width, height))?;
    pixmap.fill(Color::WHITE);

    let background = snapshot.background.as_deref().unwrap_or(CANVAS_BACKGROUND);
    if let Some(color) = parse_color(background) {
        pixmap.fill(blend_over_white(color));
    }

    for object in &snapshot.objects {
        paint_object(&mut pixmap, object);
    }
    Ok(pixmap)
}

/// Blank page in the default background, used for slides that fail to parse.
///
/// # Errors
///
/// Returns `InvalidSize` if the pixmap cannot be allocated.
pub fn blank(width: u32, height: u32) -> Result<Pixmap, RasterError> {
    rasterize(&Snapshot::empty(), width, height)
}

/// Flatten a pixmap into packed 8-bit RGB, dropping alpha.
#[must_use]
pub fn to_rgb(pixmap: &Pixmap) -> Vec<u8> {
    let mut out = Vec::with_capacity((pixmap.width() * pixmap.height() * 3) as usize);
    for pixel in pixmap.pixels() {
        let c = pixel.demultiply();
        out.extend_from_slice(&[c.red(), c.green(), c.blue()]);
    }
    out
}

fn blend_over_white(color: Color) -> Color {
    let a = color.alpha();
    Color::from_rgba(
        color.red() * a + (1.0 - a),
        color.green() * a + (1.0 - a),
        color.blue() * a + (1.0 - a),
        1.0,
    )
    .unwrap_or(Color::WHITE)
}

// =============================================================================
// OBJECTS
// =============================================================================

fn paint_object(pixmap: &mut Pixmap, object: &CanvasObject) {
    let (x, y, w, h) = object.bounds();
    if !(x.is_finite() && y.is_finite() && w.is_finite() && h.is_finite()) {
        return;
    }
    let transform = Transform::from_rotate_at(object.angle as f32, (x + w / 2.0) as f32, (y + h / 2.0) as f32)
        .pre_translate(x as f32, y as f32)
        .pre_scale(object.scale_x as f32, object.scale_y as f32);
    let (iw, ih) = object.intrinsic_size();

    match object.object_kind() {
        ObjectKind::Rect => {
            if let Some(rect) = Rect::from_xywh(0.0, 0.0, iw as f32, ih as f32) {
                fill_and_stroke(pixmap, &PathBuilder::from_rect(rect), object, transform);
            }
        }
        ObjectKind::Circle => {
            let r = (iw / 2.0) as f32;
            if let Some(path) = PathBuilder::from_circle(r, r, r) {
                fill_and_stroke(pixmap, &path, object, transform);
            }
        }
        ObjectKind::Triangle => {
            let mut pb = PathBuilder::new();
            pb.move_to((iw / 2.0) as f32, 0.0);
            pb.line_to(iw as f32, ih as f32);
            pb.line_to(0.0, ih as f32);
            pb.close();
            if let Some(path) = pb.finish() {
                fill_and_stroke(pixmap, &path, object, transform);
            }
        }
        ObjectKind::Textbox => paint_text_block(pixmap, object, iw, ih, transform),
        ObjectKind::Path => {
            // Path commands are absolute canvas coordinates.
            if let Some(path) = build_path(object) {
                let rotation =
                    Transform::from_rotate_at(object.angle as f32, (x + w / 2.0) as f32, (y + h / 2.0) as f32);
                stroke(pixmap, &path, object, rotation);
            }
        }
        ObjectKind::Image => paint_image(pixmap, object, transform),
        ObjectKind::Other => {}
    }
}

fn fill_and_stroke(pixmap: &mut Pixmap, path: &Path, object: &CanvasObject, transform: Transform) {
    if let Some(paint) = fill_paint(object) {
        pixmap.fill_path(path, &paint, FillRule::Winding, transform, None);
    }
    stroke(pixmap, path, object, transform);
}

fn stroke(pixmap: &mut Pixmap, path: &Path, object: &CanvasObject, transform: Transform) {
    let Some(color) = object.stroke.as_deref().and_then(parse_color) else {
        return;
    };
    if object.stroke_width <= 0.0 {
        return;
    }
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = true;
    let stroke = Stroke { width: object.stroke_width as f32, ..Stroke::default() };
    pixmap.stroke_path(path, &paint, &stroke, transform, None);
}

fn fill_paint(object: &CanvasObject) -> Option<Paint<'static>> {
    let mut paint = Paint::default();
    paint.anti_alias = true;
    match object.fill.as_ref()? {
        Fill::Color(raw) => paint.set_color(parse_color(raw)?),
        Fill::Gradient(gradient) => {
            let stops: Vec<GradientStop> = gradient
                .color_stops
                .iter()
                .filter_map(|s| Some(GradientStop::new(s.offset as f32, parse_color(&s.color)?)))
                .collect();
            let c = gradient.coords;
            paint.shader = LinearGradient::new(
                Point::from_xy(c.x1 as f32, c.y1 as f32),
                Point::from_xy(c.x2 as f32, c.y2 as f32),
                stops,
                SpreadMode::Pad,
                Transform::identity(),
            )?;
        }
    }
    Some(paint)
}

fn paint_text_block(pixmap: &mut Pixmap, object: &CanvasObject, w: f64, h: f64, transform: Transform) {
    let color = match object.fill.as_ref() {
        Some(Fill::Color(raw)) => parse_color(raw),
        _ => None,
    }
    .unwrap_or(Color::BLACK);
    let Some(rect) = Rect::from_xywh(0.0, 0.0, w as f32, h as f32) else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color(Color::from_rgba(color.red(), color.green(), color.blue(), 0.25).unwrap_or(color));
    pixmap.fill_path(&PathBuilder::from_rect(rect), &paint, FillRule::Winding, transform, None);
}

fn build_path(object: &CanvasObject) -> Option<Path> {
    let commands = object.path.as_ref()?;
    let mut pb = PathBuilder::new();
    for command in commands {
        let Some((op, args)) = command.split_first() else {
            continue;
        };
        let nums: Vec<f32> = args
            .iter()
            .filter_map(serde_json::Value::as_f64)
            .map(|v| v as f32)
            .collect();
        match (op.as_str().unwrap_or(""), nums.as_slice()) {
            ("M", [x, y]) => pb.move_to(*x, *y),
            ("L", [x, y]) => pb.line_to(*x, *y),
            ("Q", [cx, cy, x, y]) => pb.quad_to(*cx, *cy, *x, *y),
            ("C", [c1x, c1y, c2x, c2y, x, y]) => pb.cubic_to(*c1x, *c1y, *c2x, *c2y, *x, *y),
            ("Z" | "z", []) => pb.close(),
            _ => {}
        }
    }
    pb.finish()
}

fn paint_image(pixmap: &mut Pixmap, object: &CanvasObject, transform: Transform) {
    let Some(image) = object.src.as_deref().and_then(decode_data_url) else {
        return;
    };
    let (iw, ih) = object.intrinsic_size();
    let sx = if image.width() == 0 { 1.0 } else { iw as f32 / image.width() as f32 };
    let sy = if image.height() == 0 { 1.0 } else { ih as f32 / image.height() as f32 };
    let paint = PixmapPaint { quality: tiny_skia::FilterQuality::Bilinear, ..PixmapPaint::default() };
    pixmap.draw_pixmap(0, 0, image.as_ref(), &paint, transform.pre_scale(sx, sy), None);
}

/// Decode a base64 `data:` URL into a premultiplied pixmap.
fn decode_data_url(src: &str) -> Option<Pixmap> {
    let payload = src.strip_prefix("data:")?;
    let (meta, body) = payload.split_once(',')?;
    if !meta.ends_with(";base64") {
        return None;
    }
    let bytes = base64::engine::general_purpose::STANDARD.decode(body.trim()).ok()?;
    let decoded = match image::load_from_memory(&bytes) {
        Ok(img) => img.to_rgba8(),
        Err(e) => {
            tracing::warn!(error = %e, "skipping undecodable slide image");
            return None;
        }
    };
    let size = IntSize::from_wh(decoded.width(), decoded.height())?;
    let mut data = decoded.into_raw();
    for px in data.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        for channel in &mut px[..3] {
            *channel = ((u16::from(*channel) * a + 127) / 255) as u8;
        }
    }
    Pixmap::from_vec(data, size)
}

// =============================================================================
// COLORS
// =============================================================================

/// Parse `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(..)`, `rgba(..)` and a few names.
#[must_use]
pub fn parse_color(raw: &str) -> Option<Color> {
    let s = raw.trim();
    if let Some(hex) = s.strip_prefix('#') {
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();
        return match hex.len() {
            3 => {
                let short = |i: usize| u8::from_str_radix(&hex.get(i..=i)?.repeat(2), 16).ok();
                Some(Color::from_rgba8(short(0)?, short(1)?, short(2)?, 255))
            }
            6 => Some(Color::from_rgba8(channel(0..2)?, channel(2..4)?, channel(4..6)?, 255)),
            8 => Some(Color::from_rgba8(channel(0..2)?, channel(2..4)?, channel(4..6)?, channel(6..8)?)),
            _ => None,
        };
    }

    let lower = s.to_ascii_lowercase();
    if let Some(inner) = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let parts: Vec<f32> = inner
            .split(',')
            .map(|p| p.trim().parse::<f32>())
            .collect::<Result<_, _>>()
            .ok()?;
        let to_u8 = |v: f32| v.clamp(0.0, 255.0).round() as u8;
        return match parts.as_slice() {
            [r, g, b] => Some(Color::from_rgba8(to_u8(*r), to_u8(*g), to_u8(*b), 255)),
            [r, g, b, a] => Some(Color::from_rgba8(to_u8(*r), to_u8(*g), to_u8(*b), to_u8(a * 255.0))),
            _ => None,
        };
    }

    match lower.as_str() {
        "black" => Some(Color::BLACK),
        "white" => Some(Color::WHITE),
        "red" => Some(Color::from_rgba8(255, 0, 0, 255)),
        "green" => Some(Color::from_rgba8(0, 128, 0, 255)),
        "blue" => Some(Color::from_rgba8(0, 0, 255, 255)),
        "transparent" => Some(Color::TRANSPARENT),
        _ => None,
    }
}

#[cfg(test)]
#[path = "raster_test.rs"]
mod tests;
