use super::*;
use crate::doc::{NewPresentation, User};
use crate::services::role::Role;
use crate::services::sync::test_helpers::{open, pump_remote};
use crate::store::DocumentStore;
use crate::store::test_helpers::RecordingStore;
use crate::surface::snapshot::Snapshot;
use crate::surface::tools::{Shape, create_shape};
use crate::surface::{Canvas, DrawingSurface};
use uuid::Uuid;

fn object_count(canvas_data: &str) -> usize {
    Snapshot::parse(canvas_data).expect("snapshot parses").objects.len()
}

fn slide_with_shapes(count: usize) -> Slide {
    let mut canvas = Canvas::new();
    for _ in 0..count {
        create_shape(&mut canvas, Shape::Triangle);
    }
    Slide::empty().with_canvas_data(canvas.serialize())
}

async fn seed_deck(store: &RecordingStore, slides: Vec<Slide>, users: &[(&str, Role)]) -> Uuid {
    store
        .inner
        .create(NewPresentation {
            name: "deck".into(),
            slides,
            users: users
                .iter()
                .map(|(name, role)| User { name: (*name).to_string(), role: *role })
                .collect(),
            created_at: 1,
        })
        .await
        .expect("seed")
        .id
}

async fn stored(store: &RecordingStore, id: Uuid) -> Vec<Slide> {
    store.get(id).await.unwrap().expect("document exists").slides
}

// =============================================================================
// add / remove
// =============================================================================

#[tokio::test]
async fn add_slide_appends_empty_slide_and_switches_to_it() {
    let store = RecordingStore::new();
    let id = seed_deck(&store, vec![Slide::empty()], &[("Annon0", Role::Creator)]).await;
    let (mut s, mut engine) = open(store.clone(), id, "Annon0").await;
    create_shape(s.surface.as_mut(), Shape::Rectangle);

    let index = add_slide(&mut s, &mut engine).await.unwrap();
    assert_eq!(index, 1);
    assert_eq!(s.current_slide_index, 1);
    assert!(s.surface.objects().is_empty());

    let slides = stored(&store, id).await;
    assert_eq!(slides.len(), 2);
    assert_eq!(object_count(&slides[0].canvas_data), 1, "live edits fold into the slide being left");
    assert_eq!(object_count(&slides[1].canvas_data), 0);
    assert_ne!(slides[0].id, slides[1].id);
    engine.unmount(&mut s).await;
}

#[tokio::test]
async fn viewer_cannot_add_or_remove() {
    let store = RecordingStore::new();
    let id = seed_deck(&store, vec![Slide::empty(), Slide::empty()], &[("v", Role::Viewer)]).await;
    let (mut s, mut engine) = open(store.clone(), id, "v").await;
    let before = stored(&store, id).await;

    assert!(matches!(add_slide(&mut s, &mut engine).await, Err(SlideError::Denied(Role::Viewer))));
    assert!(matches!(remove_slide(&mut s, &mut engine).await, Err(SlideError::Denied(Role::Viewer))));
    assert_eq!(store.update_count(), 0);
    assert_eq!(stored(&store, id).await, before);
    assert_eq!(s.slides.len(), 2);
    engine.unmount(&mut s).await;
}

#[tokio::test]
async fn last_slide_cannot_be_removed() {
    let store = RecordingStore::new();
    let id = seed_deck(&store, vec![Slide::empty()], &[("Annon0", Role::Creator)]).await;
    let (mut s, mut engine) = open(store.clone(), id, "Annon0").await;

    let err = remove_slide(&mut s, &mut engine).await.unwrap_err();
    assert!(matches!(err, SlideError::LastSlide));
    assert!(err.is_silent());
    assert_eq!(s.slides.len(), 1);
    assert_eq!(stored(&store, id).await.len(), 1);
    assert_eq!(store.update_count(), 0);
    engine.unmount(&mut s).await;
}

#[tokio::test]
async fn remove_slide_shows_previous_slide() {
    let store = RecordingStore::new();
    let id = seed_deck(
        &store,
        vec![slide_with_shapes(1), slide_with_shapes(2), Slide::empty()],
        &[("e", Role::Editor)],
    )
    .await;
    let (mut s, mut engine) = open(store.clone(), id, "e").await;
    switch_slide(&mut s, &mut engine, &SlideTarget::Index(1)).await.unwrap();

    let index = remove_slide(&mut s, &mut engine).await.unwrap();
    assert_eq!(index, 0);
    assert_eq!(s.surface.objects().len(), 1);
    assert_eq!(stored(&store, id).await.len(), 2);

    let index = remove_slide(&mut s, &mut engine).await.unwrap();
    assert_eq!(index, 0, "removing the first slide stays at 0");
    assert!(s.surface.objects().is_empty());
    engine.unmount(&mut s).await;
}

#[tokio::test]
async fn failed_add_leaves_session_unchanged() {
    let store = RecordingStore::new();
    let id = seed_deck(&store, vec![Slide::empty()], &[("Annon0", Role::Creator)]).await;
    let (mut s, mut engine) = open(store.clone(), id, "Annon0").await;
    let before = s.slides.clone();

    store.set_failing(true);
    let err = add_slide(&mut s, &mut engine).await.unwrap_err();
    assert!(matches!(err, SlideError::Store(_)));
    assert!(!err.is_silent());
    assert_eq!(s.slides, before);
    assert_eq!(s.current_slide_index, 0);

    store.set_failing(false);
    engine.unmount(&mut s).await;
}

// =============================================================================
// switch
// =============================================================================

#[tokio::test]
async fn switch_persists_edits_of_the_slide_being_left() {
    let store = RecordingStore::new();
    let id = seed_deck(&store, vec![Slide::empty(), slide_with_shapes(2)], &[("e", Role::Editor)]).await;
    let (mut s, mut engine) = open(store.clone(), id, "e").await;

    create_shape(s.surface.as_mut(), Shape::Circle);
    switch_slide(&mut s, &mut engine, &SlideTarget::Index(1)).await.unwrap();

    let slides = stored(&store, id).await;
    assert_eq!(object_count(&slides[0].canvas_data), 1);
    assert_eq!(s.current_slide_index, 1);
    assert_eq!(s.surface.objects().len(), 2);
    engine.unmount(&mut s).await;
}

#[tokio::test]
async fn switch_aborts_when_saving_fails() {
    let store = RecordingStore::new();
    let id = seed_deck(&store, vec![Slide::empty(), slide_with_shapes(2)], &[("e", Role::Editor)]).await;
    let (mut s, mut engine) = open(store.clone(), id, "e").await;
    create_shape(s.surface.as_mut(), Shape::Circle);

    store.set_failing(true);
    assert!(switch_slide(&mut s, &mut engine, &SlideTarget::Index(1)).await.is_err());
    assert_eq!(s.current_slide_index, 0);
    assert_eq!(s.surface.objects().len(), 1, "unsaved edits stay on screen");

    store.set_failing(false);
    engine.unmount(&mut s).await;
}

#[tokio::test]
async fn viewer_switch_navigates_without_writing() {
    let store = RecordingStore::new();
    let id = seed_deck(&store, vec![Slide::empty(), slide_with_shapes(3)], &[("v", Role::Viewer)]).await;
    let (mut s, mut engine) = open(store.clone(), id, "v").await;

    switch_slide(&mut s, &mut engine, &SlideTarget::Index(1)).await.unwrap();
    assert_eq!(s.surface.objects().len(), 3);
    assert_eq!(store.update_count(), 0);
    engine.unmount(&mut s).await;
}

#[tokio::test]
async fn switch_to_current_is_a_no_op() {
    let store = RecordingStore::new();
    let id = seed_deck(&store, vec![Slide::empty(), Slide::empty()], &[("e", Role::Editor)]).await;
    let (mut s, mut engine) = open(store.clone(), id, "e").await;

    assert_eq!(switch_slide(&mut s, &mut engine, &SlideTarget::Index(0)).await.unwrap(), 0);
    assert_eq!(store.update_count(), 0);
    engine.unmount(&mut s).await;
}

#[tokio::test]
async fn switch_by_id_and_bad_targets() {
    let store = RecordingStore::new();
    let id = seed_deck(&store, vec![Slide::empty(), slide_with_shapes(1)], &[("v", Role::Viewer)]).await;
    let (mut s, mut engine) = open(store.clone(), id, "v").await;
    let target = s.slides[1].id.clone().expect("seeded slides have ids");

    assert_eq!(switch_slide(&mut s, &mut engine, &SlideTarget::Id(target)).await.unwrap(), 1);
    assert!(matches!(
        switch_slide(&mut s, &mut engine, &SlideTarget::Index(9)).await,
        Err(SlideError::OutOfRange { index: 9, len: 2 })
    ));
    assert!(matches!(
        switch_slide(&mut s, &mut engine, &SlideTarget::Id("nope".into())).await,
        Err(SlideError::NotFound(_))
    ));
    engine.unmount(&mut s).await;
}

// =============================================================================
// scenario
// =============================================================================

#[tokio::test]
async fn creator_and_viewer_scenario() {
    let store = RecordingStore::new();
    let id = seed_deck(&store, vec![Slide::empty()], &[("Annon0", Role::Creator), ("Annon2", Role::Viewer)]).await;
    let (mut creator, mut creator_engine) = open(store.clone(), id, "Annon0").await;

    create_shape(creator.surface.as_mut(), Shape::Rectangle);
    creator_engine.force_save(&mut creator).await.unwrap();
    assert_eq!(object_count(&stored(&store, id).await[0].canvas_data), 1);

    add_slide(&mut creator, &mut creator_engine).await.unwrap();
    let slides = stored(&store, id).await;
    assert_eq!(slides.len(), 2);
    assert_eq!(object_count(&slides[1].canvas_data), 0);
    assert_eq!(creator.current_slide_index, 1);

    let (mut viewer, mut viewer_engine) = open(store.clone(), id, "Annon2").await;
    assert_eq!(viewer.role, Role::Viewer);
    assert!(remove_slide(&mut viewer, &mut viewer_engine).await.is_err());
    assert_eq!(stored(&store, id).await.len(), 2);

    pump_remote(&mut creator_engine, &mut creator).await;
    remove_slide(&mut creator, &mut creator_engine).await.unwrap();
    let slides = stored(&store, id).await;
    assert_eq!(slides.len(), 1);
    assert_eq!(creator.current_slide_index, 0);
    assert_eq!(object_count(&slides[0].canvas_data), 1);

    viewer_engine.unmount(&mut viewer).await;
    creator_engine.unmount(&mut creator).await;
}
