//! Behaviour shared by every `DocumentStore` backend. Runs against the
//! in-memory store always, and against Postgres when DATABASE_URL is set.

use std::sync::Arc;

use launchpad_common::{EntityKind, RecordId};
use launchpad_store::{Collection, DocumentStore, Filter, MemoryStore, PgDocumentStore, Update};
use serde_json::json;

const EVENTS: Collection = Collection::Entities(EntityKind::Event);
const ACCOUNTS: Collection = Collection::Accounts;

async fn postgres() -> Option<PgDocumentStore> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let store = PgDocumentStore::connect(&url).await.expect("connect");
    store.migrate().await.expect("migrate");
    sqlx::query("DELETE FROM documents WHERE collection IN ('events', 'accounts')")
        .execute(store.pool())
        .await
        .expect("clean");
    Some(store)
}

async fn seeded_event(store: &dyn DocumentStore) -> RecordId {
    let result = store
        .upsert(
            EVENTS,
            "externalId",
            "evt-1",
            Update::new()
                .set("name", "Launch X")
                .set_on_insert("interestCount", 0)
                .set_on_insert("interestedBy", json!([]))
                .set_on_insert("comments", json!([])),
        )
        .await
        .unwrap();
    result.upserted_id.expect("inserted")
}

async fn conditional_toggle_is_idempotent(store: &dyn DocumentStore) {
    let id = seeded_event(store).await;
    let add = Update::new().add_to_set("interestedBy", "u1").inc("interestCount", 1);
    let filter = Filter::id(&id).and(Filter::not_contains("interestedBy", "u1"));

    let first = store.update_one(EVENTS, &filter, &add).await.unwrap();
    let second = store.update_one(EVENTS, &filter, &add).await.unwrap();
    assert_eq!(first.modified, 1);
    assert_eq!(second.matched, 0);

    let doc = store.find_one(EVENTS, &Filter::id(&id)).await.unwrap().unwrap();
    assert_eq!(doc["interestCount"], 1);
    assert_eq!(doc["interestedBy"], json!(["u1"]));
}

async fn reupsert_keeps_social_fields(store: &dyn DocumentStore) {
    let id = seeded_event(store).await;
    store
        .update_one(
            EVENTS,
            &Filter::id(&id),
            &Update::new().push("comments", json!({ "uuid": "c1", "likedBy": [], "replies": [] })),
        )
        .await
        .unwrap();

    let again = store
        .upsert(
            EVENTS,
            "externalId",
            "evt-1",
            Update::new()
                .set("name", "Launch X2")
                .set_on_insert("comments", json!([])),
        )
        .await
        .unwrap();
    assert_eq!(again.matched, 1);

    let doc = store.find_one(EVENTS, &Filter::id(&id)).await.unwrap().unwrap();
    assert_eq!(doc["name"], "Launch X2");
    assert_eq!(doc["comments"].as_array().map(Vec::len), Some(1));
}

async fn nested_like_via_array_filters(store: &dyn DocumentStore) {
    let id = seeded_event(store).await;
    let comment = json!({
        "uuid": "c1",
        "likedBy": [],
        "replies": [{ "uuid": "r1", "parentCommentUuid": "c1", "likedBy": [] }]
    });
    store
        .update_one(EVENTS, &Filter::id(&id), &Update::new().push("comments", comment))
        .await
        .unwrap();

    let like = Update::new()
        .add_to_set("comments.$[c].replies.$[r].likedBy", "u2")
        .array_filter("c", "uuid", "c1")
        .array_filter("r", "uuid", "r1");
    let result = store.update_one(EVENTS, &Filter::id(&id), &like).await.unwrap();
    assert_eq!(result.modified, 1);

    let doc = store.find_one(EVENTS, &Filter::id(&id)).await.unwrap().unwrap();
    assert_eq!(doc["comments"][0]["replies"][0]["likedBy"], json!(["u2"]));
}

async fn concurrent_increments_are_not_lost(store: Arc<dyn DocumentStore>) {
    let id = seeded_event(store.as_ref()).await;
    let handles = (0..20).map(|_| {
        let store = store.clone();
        let id = id.clone();
        tokio::spawn(async move {
            store
                .update_one(EVENTS, &Filter::id(&id), &Update::new().inc("interestCount", 1))
                .await
                .unwrap();
        })
    });
    for joined in futures::future::join_all(handles).await {
        joined.unwrap();
    }

    let doc = store.find_one(EVENTS, &Filter::id(&id)).await.unwrap().unwrap();
    assert_eq!(doc["interestCount"], 20);
}

async fn concurrent_account_creates_insert_once(store: Arc<dyn DocumentStore>) {
    let handles = (0..10).map(|i| {
        let store = store.clone();
        tokio::spawn(async move {
            let update = Update::new().set_on_insert("displayName", format!("caller-{i}"));
            store.upsert(ACCOUNTS, "uid", "user-1", update).await.unwrap()
        })
    });
    let mut inserted = 0;
    for joined in futures::future::join_all(handles).await {
        if joined.unwrap().upserted_id.is_some() {
            inserted += 1;
        }
    }

    assert_eq!(inserted, 1);
    assert_eq!(store.count(ACCOUNTS).await.unwrap(), 1);
}

#[tokio::test]
async fn memory_conditional_toggle_is_idempotent() {
    conditional_toggle_is_idempotent(&MemoryStore::new()).await;
}

#[tokio::test]
async fn memory_reupsert_keeps_social_fields() {
    reupsert_keeps_social_fields(&MemoryStore::new()).await;
}

#[tokio::test]
async fn memory_nested_like_via_array_filters() {
    nested_like_via_array_filters(&MemoryStore::new()).await;
}

#[tokio::test]
async fn memory_concurrent_account_creates_insert_once() {
    concurrent_account_creates_insert_once(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn memory_concurrent_increments_are_not_lost() {
    concurrent_increments_are_not_lost(Arc::new(MemoryStore::new())).await;
}

// Postgres runs share one table, so they execute as one sequential test.
#[tokio::test]
async fn postgres_backend_behaviour() {
    let Some(store) = postgres().await else {
        eprintln!("DATABASE_URL not set, skipping Postgres store test");
        return;
    };
    let store: Arc<dyn DocumentStore> = Arc::new(store);

    conditional_toggle_is_idempotent(store.as_ref()).await;
    reset(store.as_ref()).await;
    reupsert_keeps_social_fields(store.as_ref()).await;
    reset(store.as_ref()).await;
    nested_like_via_array_filters(store.as_ref()).await;
    reset(store.as_ref()).await;
    concurrent_increments_are_not_lost(store.clone()).await;
    reset(store.as_ref()).await;
    concurrent_account_creates_insert_once(store).await;
}

async fn reset(store: &dyn DocumentStore) {
    for collection in [EVENTS, ACCOUNTS] {
        while store.delete_one(collection, &Filter::And(vec![])).await.unwrap() > 0 {}
    }
}
