use super::*;
use crate::surface::tools::{Shape, create_shape};
use crate::surface::{Canvas, DrawingSurface};

fn slide_with_shape() -> Slide {
    let mut canvas = Canvas::new();
    create_shape(&mut canvas, Shape::Rectangle);
    Slide::empty().with_canvas_data(canvas.serialize())
}

#[test]
fn one_page_per_slide_in_order() {
    let slides = vec![Slide::empty(), slide_with_shape(), Slide::empty()];
    let pdf = render_pdf(&slides).unwrap();
    assert!(pdf.starts_with(b"%PDF-1.5"));

    let doc = Document::load_mem(&pdf).unwrap();
    assert_eq!(doc.get_pages().len(), 3);
}

#[test]
fn malformed_slide_becomes_blank_page() {
    let slides = vec![Slide::empty().with_canvas_data("not a snapshot".into())];
    let doc = Document::load_mem(&render_pdf(&slides).unwrap()).unwrap();
    assert_eq!(doc.get_pages().len(), 1);
}

#[test]
fn empty_deck_is_rejected() {
    assert!(matches!(render_pdf(&[]), Err(ExportError::Empty)));
}

#[test]
fn scope_selects_current_or_all() {
    let slides = vec![Slide::empty(), slide_with_shape()];
    assert_eq!(select(&slides, ExportScope::All).unwrap().len(), 2);
    assert_eq!(select(&slides, ExportScope::Current(1)).unwrap(), &slides[1..]);
    assert!(matches!(
        select(&slides, ExportScope::Current(5)),
        Err(ExportError::OutOfRange { index: 5, len: 2 })
    ));

    assert_eq!(ExportScope::parse(Some("current"), 1), Some(ExportScope::Current(1)));
    assert_eq!(ExportScope::parse(None, 1), Some(ExportScope::All));
    assert_eq!(ExportScope::parse(Some("some"), 0), None);
}
