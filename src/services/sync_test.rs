use super::test_helpers::{open, pump_local, pump_remote};
use super::*;
use crate::doc::{NewPresentation, PresentationPatch, User};
use crate::services::role::Role;
use crate::services::slides::{SlideTarget, switch_slide};
use crate::store::test_helpers::RecordingStore;
use crate::surface::snapshot::Snapshot;
use crate::surface::tools::{Shape, create_shape};
use crate::surface::{Canvas, DrawingSurface};
use tokio::time::sleep;
use uuid::Uuid;

fn slide_with_shapes(count: usize) -> Slide {
    let mut canvas = Canvas::new();
    for _ in 0..count {
        create_shape(&mut canvas, Shape::Rectangle);
    }
    Slide::empty().with_canvas_data(canvas.serialize())
}

fn object_count(canvas_data: &str) -> usize {
    Snapshot::parse(canvas_data).expect("stored snapshot parses").objects.len()
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
// mount / remote apply
// =============================================================================

#[tokio::test]
async fn mount_loads_current_slide_and_role() {
    let store = RecordingStore::new();
    let id = seed_deck(&store, vec![slide_with_shapes(2), Slide::empty()], &[("Annon0", Role::Creator)]).await;

    let (mut session, engine) = open(store.clone(), id, "Annon0").await;
    assert_eq!(session.role, Role::Creator);
    assert_eq!(session.slides.len(), 2);
    assert_eq!(session.current_slide_index, 0);
    assert_eq!(session.surface.objects().len(), 2);
    assert_eq!(store.update_count(), 0);
    engine.unmount(&mut session).await;
}

#[tokio::test]
async fn mount_on_missing_document_reports_missing() {
    let store = RecordingStore::new();
    let mut session = Session::new(Uuid::new_v4(), "Annon0", Box::new(Canvas::new()));
    let (engine, first) = SyncEngine::mount(store.clone(), &mut session, SyncConfig::default())
        .await
        .unwrap();
    assert_eq!(first, RemoteUpdate::Missing);
    assert_eq!(store.update_count(), 0, "missing documents are never bootstrapped");
    engine.unmount(&mut session).await;
}

#[tokio::test]
async fn editor_bootstraps_empty_deck_but_viewer_does_not() {
    let store = RecordingStore::new();
    let id = seed_deck(&store, vec![], &[("Annon0", Role::Creator), ("Annon2", Role::Viewer)]).await;

    let mut viewer = Session::new(id, "Annon2", Box::new(Canvas::new()));
    let (viewer_engine, first) = SyncEngine::mount(store.clone(), &mut viewer, SyncConfig::default())
        .await
        .unwrap();
    assert_eq!(first, RemoteUpdate::Applied { reloaded: true });
    assert_eq!(store.update_count(), 0);

    let mut creator = Session::new(id, "Annon0", Box::new(Canvas::new()));
    let (creator_engine, first) = SyncEngine::mount(store.clone(), &mut creator, SyncConfig::default())
        .await
        .unwrap();
    assert_eq!(first, RemoteUpdate::Bootstrapped);
    assert_eq!(creator.slides.len(), 1);
    assert_eq!(stored(&store, id).await.len(), 1);

    viewer_engine.unmount(&mut viewer).await;
    creator_engine.unmount(&mut creator).await;
}

#[tokio::test]
async fn remote_write_reloads_other_sessions_and_arms_settle() {
    let store = RecordingStore::new();
    let id = seed_deck(&store, vec![Slide::empty()], &[("a", Role::Editor), ("b", Role::Editor)]).await;
    let (mut a, mut a_engine) = open(store.clone(), id, "a").await;
    let (mut b, mut b_engine) = open(store.clone(), id, "b").await;

    create_shape(a.surface.as_mut(), Shape::Circle);
    a_engine.force_save(&mut a).await.unwrap();

    let update = pump_remote(&mut b_engine, &mut b).await.expect("delivery");
    assert_eq!(update, RemoteUpdate::Applied { reloaded: true });
    assert_eq!(b.surface.objects().len(), 1);
    assert!(b_engine.settle_pending());

    b_engine.on_settle(&mut b);
    assert!(!b_engine.settle_pending());

    a_engine.unmount(&mut a).await;
    b_engine.unmount(&mut b).await;
}

#[tokio::test]
async fn own_write_does_not_reload() {
    let store = RecordingStore::new();
    let id = seed_deck(&store, vec![Slide::empty()], &[("a", Role::Creator)]).await;
    let (mut a, mut engine) = open(store.clone(), id, "a").await;

    create_shape(a.surface.as_mut(), Shape::Rectangle);
    engine.force_save(&mut a).await.unwrap();

    let update = pump_remote(&mut engine, &mut a).await.expect("echo delivery");
    assert_eq!(update, RemoteUpdate::Applied { reloaded: false });
    assert!(!engine.settle_pending());
    engine.unmount(&mut a).await;
}

#[tokio::test]
async fn stale_echo_does_not_clobber_newer_local_edits() {
    let store = RecordingStore::new();
    let id = seed_deck(&store, vec![Slide::empty()], &[("a", Role::Creator)]).await;
    let (mut a, mut engine) = open(store.clone(), id, "a").await;

    create_shape(a.surface.as_mut(), Shape::Rectangle);
    engine.force_save(&mut a).await.unwrap();
    create_shape(a.surface.as_mut(), Shape::Triangle);

    let update = pump_remote(&mut engine, &mut a).await.expect("echo delivery");
    assert_eq!(update, RemoteUpdate::Applied { reloaded: false });
    assert_eq!(a.surface.objects().len(), 2);
    engine.unmount(&mut a).await;
}

#[tokio::test]
async fn peer_revert_to_an_earlier_state_of_ours_reloads() {
    let store = RecordingStore::new();
    let id = seed_deck(&store, vec![Slide::empty()], &[("a", Role::Editor), ("b", Role::Editor)]).await;
    let (mut a, mut a_engine) = open(store.clone(), id, "a").await;
    let (mut b, mut b_engine) = open(store.clone(), id, "b").await;

    create_shape(a.surface.as_mut(), Shape::Rectangle);
    a_engine.force_save(&mut a).await.unwrap();
    create_shape(a.surface.as_mut(), Shape::Circle);
    a_engine.force_save(&mut a).await.unwrap();

    while b.surface.objects().len() != 2 {
        pump_remote(&mut b_engine, &mut b).await.expect("delivery of a's edits");
    }
    let circle = b.surface.objects()[1].id.clone().expect("object id");
    assert!(b.surface.remove_object(&circle).is_some());
    b_engine.force_save(&mut b).await.unwrap();
    assert_eq!(object_count(&stored(&store, id).await[0].canvas_data), 1);

    while a.surface.objects().len() != 1 {
        pump_remote(&mut a_engine, &mut a).await.expect("b's revert is applied");
    }
    assert_eq!(a.slides, stored(&store, id).await);

    // a's next edit builds on the reverted slide.
    create_shape(a.surface.as_mut(), Shape::Triangle);
    a_engine.force_save(&mut a).await.unwrap();
    assert_eq!(object_count(&stored(&store, id).await[0].canvas_data), 2);

    a_engine.unmount(&mut a).await;
    b_engine.unmount(&mut b).await;
}

#[tokio::test]
async fn echo_skips_reload_even_when_users_change_alongside() {
    let store = RecordingStore::new();
    let id = seed_deck(&store, vec![Slide::empty()], &[("a", Role::Creator), ("b", Role::Viewer)]).await;
    let (mut a, mut engine) = open(store.clone(), id, "a").await;

    create_shape(a.surface.as_mut(), Shape::Rectangle);
    engine.force_save(&mut a).await.unwrap();
    create_shape(a.surface.as_mut(), Shape::Circle);
    store
        .inner
        .update(
            id,
            PresentationPatch::users(
                vec![User { name: "a".into(), role: Role::Creator }, User { name: "b".into(), role: Role::Editor }],
                5,
            ),
        )
        .await
        .unwrap();

    pump_remote(&mut engine, &mut a).await.expect("delivery");
    assert_eq!(a.surface.objects().len(), 2, "unsaved local edit survives");
    engine.unmount(&mut a).await;
}

#[tokio::test]
async fn remote_shrink_clamps_index_and_role_follows_users() {
    let store = RecordingStore::new();
    let id = seed_deck(
        &store,
        vec![Slide::empty(), Slide::empty(), slide_with_shapes(1)],
        &[("a", Role::Editor)],
    )
    .await;
    let (mut a, mut engine) = open(store.clone(), id, "a").await;
    switch_slide(&mut a, &mut engine, &SlideTarget::Index(2)).await.unwrap();
    pump_remote(&mut engine, &mut a).await;

    store
        .inner
        .update(id, PresentationPatch::slides(vec![slide_with_shapes(3)], 2))
        .await
        .unwrap();
    pump_remote(&mut engine, &mut a).await.expect("shrink delivery");
    assert_eq!(a.current_slide_index, 0);
    assert_eq!(a.surface.objects().len(), 3);

    store
        .inner
        .update(id, PresentationPatch::users(vec![User { name: "a".into(), role: Role::Viewer }], 3))
        .await
        .unwrap();
    pump_remote(&mut engine, &mut a).await.expect("users delivery");
    assert_eq!(a.role, Role::Viewer);
    engine.unmount(&mut a).await;
}

#[tokio::test]
async fn missing_after_delete_is_reported() {
    let store = RecordingStore::new();
    let id = seed_deck(&store, vec![Slide::empty()], &[("a", Role::Creator)]).await;
    let (mut a, mut engine) = open(store.clone(), id, "a").await;

    store.inner.delete(id).await;
    assert_eq!(pump_remote(&mut engine, &mut a).await, Some(RemoteUpdate::Missing));
    engine.unmount(&mut a).await;
}

// =============================================================================
// local publish
// =============================================================================

#[tokio::test(start_paused = true)]
async fn edits_within_the_window_coalesce_into_one_write() {
    let store = RecordingStore::new();
    let id = seed_deck(&store, vec![Slide::empty(), slide_with_shapes(1)], &[("a", Role::Creator)]).await;
    let (mut a, mut engine) = open(store.clone(), id, "a").await;
    let untouched = a.slides[1].clone();

    for _ in 0..3 {
        create_shape(a.surface.as_mut(), Shape::Rectangle);
        assert!(pump_local(&mut engine, &mut a).await);
        sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(store.update_count(), 0);

    sleep(Duration::from_millis(600)).await;
    assert_eq!(store.update_count(), 1);
    let slides = stored(&store, id).await;
    assert_eq!(object_count(&slides[0].canvas_data), 3);
    assert_eq!(slides[1], untouched, "only the active slide changes");
    engine.unmount(&mut a).await;
}

#[tokio::test]
async fn viewer_surface_events_are_ignored() {
    let store = RecordingStore::new();
    let id = seed_deck(&store, vec![Slide::empty()], &[("v", Role::Viewer)]).await;
    let (mut v, mut engine) = open(store.clone(), id, "v").await;

    create_shape(v.surface.as_mut(), Shape::Rectangle);
    assert!(!pump_local(&mut engine, &mut v).await);
    engine.force_save(&mut v).await.unwrap();
    engine.unmount(&mut v).await;
    assert_eq!(store.update_count(), 0);
}

#[tokio::test]
async fn failed_force_save_leaves_mirror_unchanged() {
    let store = RecordingStore::new();
    let id = seed_deck(&store, vec![Slide::empty()], &[("a", Role::Creator)]).await;
    let (mut a, mut engine) = open(store.clone(), id, "a").await;
    let before = a.slides.clone();

    create_shape(a.surface.as_mut(), Shape::Rectangle);
    store.set_failing(true);
    assert!(engine.force_save(&mut a).await.is_err());
    assert_eq!(a.slides, before);

    store.set_failing(false);
    engine.unmount(&mut a).await;
}

#[tokio::test(start_paused = true)]
async fn unmount_flushes_the_pending_write() {
    let store = RecordingStore::new();
    let id = seed_deck(&store, vec![Slide::empty()], &[("a", Role::Creator)]).await;
    let (mut a, mut engine) = open(store.clone(), id, "a").await;

    create_shape(a.surface.as_mut(), Shape::Rectangle);
    pump_local(&mut engine, &mut a).await;
    create_shape(a.surface.as_mut(), Shape::Circle);
    engine.unmount(&mut a).await;

    assert_eq!(store.update_count(), 1);
    assert_eq!(object_count(&stored(&store, id).await[0].canvas_data), 2);

    create_shape(a.surface.as_mut(), Shape::Triangle);
    sleep(Duration::from_millis(1_000)).await;
    assert_eq!(store.update_count(), 1, "listeners are detached after unmount");
}

// =============================================================================
// merge policy
// =============================================================================

#[tokio::test]
async fn last_writer_wins_on_the_whole_slides_array() {
    let store = RecordingStore::new();
    let id = seed_deck(&store, vec![Slide::empty(), Slide::empty()], &[("a", Role::Editor), ("b", Role::Editor)]).await;
    let (mut a, mut a_engine) = open(store.clone(), id, "a").await;
    let (mut b, mut b_engine) = open(store.clone(), id, "b").await;
    switch_slide(&mut b, &mut b_engine, &SlideTarget::Index(1)).await.unwrap();
    let base_slide0 = b.slides[0].clone();

    create_shape(a.surface.as_mut(), Shape::Rectangle);
    a_engine.force_save(&mut a).await.unwrap();
    assert_eq!(object_count(&stored(&store, id).await[0].canvas_data), 1);

    // b writes from a mirror taken before a's write.
    create_shape(b.surface.as_mut(), Shape::Circle);
    b_engine.force_save(&mut b).await.unwrap();

    let slides = stored(&store, id).await;
    assert_eq!(slides, b.slides);
    assert_eq!(slides[0], base_slide0, "a's edit to slide 0 is lost");
    assert_eq!(object_count(&slides[1].canvas_data), 1);

    a_engine.unmount(&mut a).await;
    b_engine.unmount(&mut b).await;
}
