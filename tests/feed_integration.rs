use std::sync::Arc;
use studylink::config::ClientOptions;
use studylink::error::Error;
use studylink::paths;
use studylink::store::memory::MemoryStore;
use studylink::store::{DocumentStore, Fields, Query};
use studylink::StudyClient;

fn client_with_store() -> (StudyClient, MemoryStore) {
    let store = MemoryStore::new();
    let client = StudyClient::new(Arc::new(store.clone()));
    (client, store)
}

async fn seed_resource(store: &MemoryStore, id: &str, owner: &str, created_at: &str) {
    store
        .set(
            &paths::resource(id),
            Fields::new()
                .value("ownerId", owner)
                .value("title", format!("resource {id}"))
                .value("likeCount", 0)
                .value("commentCount", 0)
                .value("reportCount", 0)
                .value("createdAt", created_at),
            false,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_fetch_page_is_recent_first_and_bounded() {
    let store = MemoryStore::new();
    let client = StudyClient::new_with_options(
        Arc::new(store.clone()),
        ClientOptions::default().with_feed_page_size(2),
    );

    seed_resource(&store, "r1", "u1", "2024-03-01T00:00:00Z").await;
    seed_resource(&store, "r2", "u1", "2024-03-02T00:00:00Z").await;
    seed_resource(&store, "r3", "u1", "2024-03-03T00:00:00Z").await;

    let page = client.feed().fetch_page("viewer").await.unwrap();
    let ids: Vec<&str> = page.iter().map(|item| item.id.as_str()).collect();
    assert_eq!(ids, vec!["r3", "r2"]);
}

#[tokio::test]
async fn test_enrichment_recounts_comments_and_resolves_flags() {
    let (client, store) = client_with_store();
    store
        .set(
            &paths::profile("u1"),
            Fields::new().value("name", "Uma"),
            false,
        )
        .await
        .unwrap();
    seed_resource(&store, "r1", "u1", "2024-03-01T00:00:00Z").await;

    // Drift the denormalized counter away from the actual sub-list
    store
        .update(&paths::resource("r1"), Fields::new().value("commentCount", 99))
        .await
        .unwrap();

    let feed = client.feed();
    feed.add_comment("viewer", "r1", "great summary").await.unwrap();
    feed.add_comment("someone-else", "r1", "thanks").await.unwrap();
    feed.toggle_like("viewer", "r1").await.unwrap();

    let page = feed.fetch_page("viewer").await.unwrap();
    assert_eq!(page.len(), 1);
    let item = &page[0];
    assert_eq!(item.owner_name, "Uma");
    // Sub-list size wins over the drifted counter
    assert_eq!(item.comment_count, 2);
    assert!(item.user_liked);
    assert!(item.user_commented);
    assert!(!item.user_reported);

    let page = feed.fetch_page("stranger").await.unwrap();
    let item = &page[0];
    assert_eq!(item.comment_count, 2);
    assert!(!item.user_liked);
    assert!(!item.user_commented);
}

#[tokio::test]
async fn test_toggle_like_twice_nets_to_zero() {
    let (client, store) = client_with_store();
    seed_resource(&store, "r1", "u1", "2024-03-01T00:00:00Z").await;
    let feed = client.feed();

    assert!(feed.toggle_like("viewer", "r1").await.unwrap());
    let doc = store.get(&paths::resource("r1")).await.unwrap().unwrap();
    assert_eq!(doc.data["likeCount"], 1);
    assert!(store
        .get(&paths::like_marker("r1", "viewer"))
        .await
        .unwrap()
        .is_some());

    assert!(!feed.toggle_like("viewer", "r1").await.unwrap());
    let doc = store.get(&paths::resource("r1")).await.unwrap().unwrap();
    assert_eq!(doc.data["likeCount"], 0);
    assert!(store
        .get(&paths::like_marker("r1", "viewer"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_report_edit_does_not_increment_twice() {
    let (client, store) = client_with_store();
    seed_resource(&store, "r1", "u1", "2024-03-01T00:00:00Z").await;
    let feed = client.feed();

    feed.submit_report("viewer", "r1", "spam").await.unwrap();
    let doc = store.get(&paths::resource("r1")).await.unwrap().unwrap();
    assert_eq!(doc.data["reportCount"], 1);

    feed.submit_report("viewer", "r1", "actually plagiarism")
        .await
        .unwrap();
    let doc = store.get(&paths::resource("r1")).await.unwrap().unwrap();
    assert_eq!(doc.data["reportCount"], 1);
    let marker = store
        .get(&paths::report_marker("r1", "viewer"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(marker.str_field("reason"), Some("actually plagiarism"));

    // A different viewer still counts
    feed.submit_report("other", "r1", "spam").await.unwrap();
    let doc = store.get(&paths::resource("r1")).await.unwrap().unwrap();
    assert_eq!(doc.data["reportCount"], 2);
}

#[tokio::test]
async fn test_actions_on_missing_resource_are_not_found() {
    let (client, _store) = client_with_store();
    let feed = client.feed();

    assert!(matches!(
        feed.toggle_like("viewer", "ghost").await.unwrap_err(),
        Error::NotFound(_)
    ));
    assert!(matches!(
        feed.submit_report("viewer", "ghost", "spam").await.unwrap_err(),
        Error::NotFound(_)
    ));
    assert!(matches!(
        feed.add_comment("viewer", "ghost", "hi").await.unwrap_err(),
        Error::NotFound(_)
    ));
    assert!(matches!(
        feed.delete_resource("viewer", "ghost").await.unwrap_err(),
        Error::NotFound(_)
    ));
}

#[tokio::test]
async fn test_delete_cascades_and_requires_ownership() {
    let (client, store) = client_with_store();
    let feed = client.feed();

    let id = feed
        .publish("u1", "calc video", None, Some("uploads/calc.mp4"))
        .await
        .unwrap();
    store.put_blob("uploads/calc.mp4");
    feed.add_comment("a", &id, "first").await.unwrap();
    feed.add_comment("b", &id, "second").await.unwrap();
    feed.toggle_like("a", &id).await.unwrap();

    let err = feed.delete_resource("mallory", &id).await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));

    feed.delete_resource("u1", &id).await.unwrap();
    assert!(store.get(&paths::resource(&id)).await.unwrap().is_none());
    let comments = store
        .list(&Query::collection(paths::resource_comments(&id)))
        .await
        .unwrap();
    assert!(comments.is_empty());
    let likes = store
        .list(&Query::collection(paths::resource_likes(&id)))
        .await
        .unwrap();
    assert!(likes.is_empty());
    assert!(!store.has_blob("uploads/calc.mp4"));
}

#[tokio::test]
async fn test_delete_survives_blob_failure() {
    let (client, store) = client_with_store();
    let feed = client.feed();

    let id = feed
        .publish("u1", "physics video", None, Some("uploads/physics.mp4"))
        .await
        .unwrap();
    store.put_blob("uploads/physics.mp4");
    feed.add_comment("a", &id, "nice").await.unwrap();

    // The blob delete throws, but the metadata is already gone and the
    // action still reports success.
    store.fail_blob_deletes(true);
    feed.delete_resource("u1", &id).await.unwrap();

    assert!(store.get(&paths::resource(&id)).await.unwrap().is_none());
    let comments = store
        .list(&Query::collection(paths::resource_comments(&id)))
        .await
        .unwrap();
    assert!(comments.is_empty());
    assert!(store.has_blob("uploads/physics.mp4"));
}
