use super::*;
use crate::doc::CREATOR_NAME;

#[tokio::test]
async fn test_state_starts_empty() {
    let state = test_helpers::test_app_state();
    assert!(state.store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn clones_share_store_and_presence() {
    let state = test_helpers::test_app_state();
    let clone = state.clone();
    let identity = test_helpers::seed_presentation(&state, "shared").await;

    clone.presence.enter(identity.id, CREATOR_NAME).await;
    assert!(state.presence.online(identity.id).await.contains(CREATOR_NAME));
    assert_eq!(clone.store.list().await.unwrap().len(), 1);
}
