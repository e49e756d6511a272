use async_trait::async_trait;
use launchpad_common::RecordId;

use crate::document::{Collection, Document, Filter, Update, UpdateResult};
use crate::error::StoreError;

/// Key-indexed JSON document store with field-level update operators.
///
/// Every call is atomic for the single document it touches. Nothing spans
/// documents: callers that write two documents issue two calls and own the
/// consequences of one failing.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_all(&self, collection: Collection) -> Result<Vec<Document>, StoreError>;

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError>;

    async fn count(&self, collection: Collection) -> Result<u64, StoreError>;

    /// Insert a new document. Assigns `_id` when absent; fails with
    /// [`StoreError::Duplicate`] when the id is taken.
    async fn insert(&self, collection: Collection, doc: Document) -> Result<RecordId, StoreError>;

    /// Apply `update` to the first document matching `filter`, or insert one
    /// when `update.upsert` is set and nothing matched.
    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult, StoreError>;

    /// Delete the first document matching `filter`. Returns the number deleted.
    async fn delete_one(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError>;

    /// Insert-or-update keyed by the value of `key_field`.
    async fn upsert(
        &self,
        collection: Collection,
        key_field: &str,
        key: &str,
        update: Update,
    ) -> Result<UpdateResult, StoreError> {
        self.update_one(collection, &Filter::eq(key_field, key), &update.upsert(true))
            .await
    }

    fn name(&self) -> &str;
}
