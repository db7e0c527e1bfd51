//! Export service — slides to a multi-page PDF.
//!
//! Each slide is rasterized at canvas size and placed as a full-page RGB
//! image XObject on a page of the same size, pages in slide order. A slide
//! whose snapshot does not parse becomes a blank page.

#![allow(clippy::cast_possible_wrap)]

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use tracing::{info, warn};

use crate::doc::Slide;
use crate::frame::ErrorCode;
use crate::surface::raster::{self, RasterError};
use crate::surface::snapshot::Snapshot;
use crate::surface::{CANVAS_HEIGHT, CANVAS_WIDTH};

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const PAGE_WIDTH: u32 = CANVAS_WIDTH as u32;
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const PAGE_HEIGHT: u32 = CANVAS_HEIGHT as u32;

const IMAGE_NAME: &str = "Slide";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("nothing to export")]
    Empty,
    #[error("slide index {index} out of range (0..{len})")]
    OutOfRange { index: usize, len: usize },
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error("pdf error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("pdf write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorCode for ExportError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Empty => "E_EXPORT_EMPTY",
            Self::OutOfRange { .. } => "E_SLIDE_OUT_OF_RANGE",
            Self::Raster(_) => "E_RASTER",
            Self::Pdf(_) | Self::Io(_) => "E_PDF",
        }
    }
}

/// What to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportScope {
    /// One slide by index.
    Current(usize),
    All,
}

impl ExportScope {
    /// Parse `current` / `all` against the active index.
    #[must_use]
    pub fn parse(raw: Option<&str>, current: usize) -> Option<Self> {
        match raw.unwrap_or("all") {
            "current" => Some(Self::Current(current)),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

/// Select the slides a scope covers.
///
/// # Errors
///
/// `OutOfRange` for a bad index; `Empty` when there is nothing to export.
pub fn select(slides: &[Slide], scope: ExportScope) -> Result<&[Slide], ExportError> {
    let selected = match scope {
        ExportScope::All => slides,
        ExportScope::Current(index) => {
            let Some(slide) = slides.get(index..=index) else {
                return Err(ExportError::OutOfRange { index, len: slides.len() });
            };
            slide
        }
    };
    if selected.is_empty() {
        return Err(ExportError::Empty);
    }
    Ok(selected)
}

/// Render `slides` into a PDF, one page per slide.
///
/// # Errors
///
/// `Empty` when `slides` is empty; raster or PDF assembly errors otherwise.
pub fn render_pdf(slides: &[Slide]) -> Result<Vec<u8>, ExportError> {
    if slides.is_empty() {
        return Err(ExportError::Empty);
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(slides.len());

    for (index, slide) in slides.iter().enumerate() {
        let pixmap = match Snapshot::parse(&slide.canvas_data) {
            Ok(snapshot) => raster::rasterize(&snapshot, PAGE_WIDTH, PAGE_HEIGHT)?,
            Err(e) => {
                warn!(error = %e, index, "exporting unreadable slide as a blank page");
                raster::blank(PAGE_WIDTH, PAGE_HEIGHT)?
            }
        };

        let mut image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(PAGE_WIDTH),
                "Height" => i64::from(PAGE_HEIGHT),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8_i64,
            },
            raster::to_rgb(&pixmap),
        );
        image.compress()?;
        let image_id = doc.add_object(image);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        i64::from(PAGE_WIDTH).into(),
                        0_i64.into(),
                        0_i64.into(),
                        i64::from(PAGE_HEIGHT).into(),
                        0_i64.into(),
                        0_i64.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0_i64.into(), 0_i64.into(), i64::from(PAGE_WIDTH).into(), i64::from(PAGE_HEIGHT).into()],
            "Resources" => dictionary! {
                "XObject" => dictionary! { IMAGE_NAME => image_id },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    info!(pages = slides.len(), bytes = out.len(), "pdf exported");
    Ok(out)
}

#[cfg(test)]
#[path = "export_test.rs"]
mod tests;
