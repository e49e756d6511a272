// In-process document store. Used when no database is configured and in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use launchpad_common::{fields, RecordId};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::document::{Collection, Document, Filter, Update, UpdateResult};
use crate::engine;
use crate::error::StoreError;
use crate::traits::DocumentStore;

/// Collections kept in insertion order behind one lock. A write holds the
/// lock for the whole read-modify-write, so single-document updates are atomic.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_all(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(&collection).cloned().unwrap_or_default())
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|doc| engine::matches(doc, filter)))
            .cloned())
    }

    async fn count(&self, collection: Collection) -> Result<u64, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(&collection).map_or(0, |docs| docs.len() as u64))
    }

    async fn insert(&self, collection: Collection, mut doc: Document) -> Result<RecordId, StoreError> {
        let id = match engine::document_id(&doc) {
            Some(id) => id,
            None => {
                let id = RecordId::new();
                doc.insert(fields::RECORD_ID.to_string(), Value::from(id.as_str()));
                id
            }
        };

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();
        if docs.iter().any(|d| engine::document_id(d).as_ref() == Some(&id)) {
            return Err(StoreError::Duplicate(id.to_string()));
        }
        docs.push(doc);
        Ok(id)
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult, StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();

        if let Some(doc) = docs.iter_mut().find(|doc| engine::matches(doc, filter)) {
            // Apply to a copy so a failing op leaves the stored document untouched.
            let mut updated = doc.clone();
            let changed = engine::apply_update(&mut updated, filter, update, false)?;
            if changed {
                *doc = updated;
            }
            return Ok(UpdateResult {
                matched: 1,
                modified: u64::from(changed),
                upserted_id: None,
            });
        }

        if !update.upsert {
            return Ok(UpdateResult::default());
        }

        let (doc, id) = engine::build_upsert(filter, update)?;
        docs.push(doc);
        Ok(UpdateResult {
            matched: 0,
            modified: 0,
            upserted_id: Some(id),
        })
    }

    async fn delete_one(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(0);
        };
        match docs.iter().position(|doc| engine::matches(doc, filter)) {
            Some(index) => {
                docs.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchpad_common::EntityKind;
    use serde_json::json;

    const EVENTS: Collection = Collection::Entities(EntityKind::Event);

    #[tokio::test]
    async fn upsert_inserts_then_updates_by_key() {
        let store = MemoryStore::new();
        let first = store
            .upsert(EVENTS, "externalId", "evt-1", Update::new().set("name", "Launch X"))
            .await
            .unwrap();
        assert!(first.upserted_id.is_some());

        let second = store
            .upsert(EVENTS, "externalId", "evt-1", Update::new().set("name", "Launch X2"))
            .await
            .unwrap();
        assert_eq!(second.matched, 1);
        assert_eq!(second.modified, 1);
        assert_eq!(store.count(EVENTS).await.unwrap(), 1);

        let doc = store
            .find_one(EVENTS, &Filter::eq("externalId", "evt-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["name"], "Launch X2");
        assert_eq!(engine::document_id(&doc), first.upserted_id);
    }

    #[tokio::test]
    async fn failed_update_leaves_document_untouched() {
        let store = MemoryStore::new();
        let doc = json!({ "_id": "e1", "name": "x", "count": 1 }).as_object().cloned().unwrap();
        store.insert(EVENTS, doc).await.unwrap();

        let update = Update::new().set("name", "changed").inc("name", 1);
        assert!(store.update_one(EVENTS, &Filter::eq("_id", "e1"), &update).await.is_err());

        let stored = store.find_one(EVENTS, &Filter::eq("_id", "e1")).await.unwrap().unwrap();
        assert_eq!(stored["name"], "x");
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = MemoryStore::new();
        let doc = json!({ "_id": "a1", "uid": "u1" }).as_object().cloned().unwrap();
        store.insert(Collection::Accounts, doc.clone()).await.unwrap();
        let err = store.insert(Collection::Accounts, doc).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn delete_one_reports_count() {
        let store = MemoryStore::new();
        let doc = json!({ "uid": "u1" }).as_object().cloned().unwrap();
        store.insert(Collection::Accounts, doc).await.unwrap();

        assert_eq!(store.delete_one(Collection::Accounts, &Filter::eq("uid", "u1")).await.unwrap(), 1);
        assert_eq!(store.delete_one(Collection::Accounts, &Filter::eq("uid", "u1")).await.unwrap(), 0);
    }
}
