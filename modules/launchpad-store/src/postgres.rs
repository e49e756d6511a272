// Postgres persistence. Documents live in one JSONB table keyed by
// (collection, id).
//
// Filters are pushed down as a JSONB containment prefilter and then
// re-checked in Rust with the same matcher the in-memory store uses, so
// both backends agree on semantics. Writes lock the candidate rows for the
// duration of the read-modify-write.

use async_trait::async_trait;
use launchpad_common::{fields, RecordId};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};

use crate::document::{Collection, Document, Filter, Update, UpdateResult};
use crate::engine;
use crate::error::StoreError;
use crate::traits::DocumentStore;

const UNIQUE_VIOLATION: &str = "23505";

pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        info!("Connected to Postgres document store");
        Ok(Self::new(pool))
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.into()))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Rows passing the containment prefilter, oldest first, locked when
    /// `for_update` is set.
    async fn candidates(
        tx: &mut Transaction<'_, Postgres>,
        collection: Collection,
        filter: &Filter,
        for_update: bool,
    ) -> Result<Vec<Document>, StoreError> {
        let mut qb = sqlx::QueryBuilder::<Postgres>::new("SELECT body FROM documents WHERE collection = ");
        qb.push_bind(collection.name());
        qb.push(" AND body @> ");
        qb.push_bind(Json(containment(filter)));
        qb.push(" ORDER BY created_at, id");
        if for_update {
            qb.push(" FOR UPDATE");
        }

        let rows: Vec<(Json<Document>,)> = qb.build_query_as().fetch_all(&mut **tx).await?;
        Ok(rows.into_iter().map(|(Json(doc),)| doc).collect())
    }

    async fn insert_in(
        tx: &mut Transaction<'_, Postgres>,
        collection: Collection,
        id: &RecordId,
        doc: Document,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)")
            .bind(collection.name())
            .bind(id.as_str())
            .bind(Json(doc))
            .execute(&mut **tx)
            .await
            .map_err(|e| map_unique(e, id))?;
        Ok(())
    }

    async fn try_update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult, StoreError> {
        let mut tx = self.pool.begin().await?;
        let found = Self::candidates(&mut tx, collection, filter, true)
            .await?
            .into_iter()
            .find(|doc| engine::matches(doc, filter));

        let result = match found {
            Some(mut doc) => {
                let changed = engine::apply_update(&mut doc, filter, update, false)?;
                if changed {
                    let id = engine::document_id(&doc)
                        .ok_or_else(|| StoreError::TypeMismatch { path: fields::RECORD_ID.into(), expected: "string" })?;
                    sqlx::query(
                        "UPDATE documents SET body = $3, updated_at = now() WHERE collection = $1 AND id = $2",
                    )
                    .bind(collection.name())
                    .bind(id.as_str())
                    .bind(Json(doc))
                    .execute(&mut *tx)
                    .await?;
                }
                UpdateResult {
                    matched: 1,
                    modified: u64::from(changed),
                    upserted_id: None,
                }
            }
            None if update.upsert => {
                let (doc, id) = engine::build_upsert(filter, update)?;
                Self::insert_in(&mut tx, collection, &id, doc).await?;
                UpdateResult {
                    matched: 0,
                    modified: 0,
                    upserted_id: Some(id),
                }
            }
            None => UpdateResult::default(),
        };

        tx.commit().await?;
        Ok(result)
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find_all(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        let rows: Vec<(Json<Document>,)> = sqlx::query_as(
            "SELECT body FROM documents WHERE collection = $1 ORDER BY created_at, id",
        )
        .bind(collection.name())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(Json(doc),)| doc).collect())
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let found = Self::candidates(&mut tx, collection, filter, false)
            .await?
            .into_iter()
            .find(|doc| engine::matches(doc, filter));
        tx.commit().await?;
        Ok(found)
    }

    async fn count(&self, collection: Collection) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = $1")
            .bind(collection.name())
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
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
        let mut tx = self.pool.begin().await?;
        Self::insert_in(&mut tx, collection, &id, doc).await?;
        tx.commit().await?;
        Ok(id)
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult, StoreError> {
        match self.try_update_one(collection, filter, update).await {
            // Two upserts raced on the same key; the loser now finds the
            // winner's row and updates it.
            Err(StoreError::Duplicate(id)) if update.upsert => {
                debug!(%collection, %id, "Upsert lost insert race, retrying as update");
                self.try_update_one(collection, filter, update).await
            }
            other => other,
        }
    }

    async fn delete_one(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let found = Self::candidates(&mut tx, collection, filter, true)
            .await?
            .into_iter()
            .find(|doc| engine::matches(doc, filter))
            .and_then(|doc| engine::document_id(&doc));

        let deleted = match found {
            Some(id) => sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection.name())
                .bind(id.as_str())
                .execute(&mut *tx)
                .await?
                .rows_affected(),
            None => 0,
        };
        tx.commit().await?;
        Ok(deleted)
    }

    fn name(&self) -> &str {
        "postgres"
    }
}

fn map_unique(e: sqlx::Error, id: &RecordId) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            StoreError::Duplicate(id.to_string())
        }
        _ => StoreError::Database(e),
    }
}

/// JSONB object that every document matching `filter` contains.
///
/// Only positive conditions are translated. Negations and null equality are
/// left to the Rust-side re-check, so the prefilter never excludes a match.
pub(crate) fn containment(filter: &Filter) -> Value {
    let mut out = Value::Object(Map::new());
    add_condition(&mut out, filter);
    out
}

fn add_condition(out: &mut Value, filter: &Filter) {
    match filter {
        Filter::Eq(_, Value::Null) => {}
        Filter::Eq(path, value) => merge(out, nest(path, value.clone())),
        Filter::Contains(path, value) => merge(out, nest(path, Value::Array(vec![value.clone()]))),
        Filter::ElemMatch { path, field, value } if !value.is_null() => {
            let elem = nest(field, value.clone());
            merge(out, nest(path, Value::Array(vec![elem])));
        }
        Filter::And(parts) => parts.iter().for_each(|part| add_condition(out, part)),
        _ => {}
    }
}

fn nest(path: &str, value: Value) -> Value {
    path.rsplit('.').fold(value, |inner, key| {
        let mut map = Map::new();
        map.insert(key.to_string(), inner);
        Value::Object(map)
    })
}

/// Conjoin `incoming` into `target`. Conflicting scalars keep the first value.
fn merge(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(existing), Value::Object(more)) => {
            for (key, value) in more {
                match existing.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(existing), Value::Array(more)) => existing.extend(more),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn containment_nests_dotted_paths() {
        let filter = Filter::eq("metadata.agency", "NASA");
        assert_eq!(containment(&filter), json!({ "metadata": { "agency": "NASA" } }));
    }

    #[test]
    fn containment_merges_conjunctions() {
        let filter = Filter::eq("_id", "e1")
            .and(Filter::contains("interestedBy", "u1"))
            .and(Filter::elem_match("comments", "uuid", "c1"));
        assert_eq!(
            containment(&filter),
            json!({ "_id": "e1", "interestedBy": ["u1"], "comments": [{ "uuid": "c1" }] })
        );
    }

    #[test]
    fn negations_and_nulls_are_left_to_the_recheck() {
        let filter = Filter::eq("_id", "e1")
            .and(Filter::not_contains("interestedBy", "u1"))
            .and(Filter::no_elem_match("comments", "uuid", "c1"))
            .and(Filter::eq("detailedInfo", Value::Null));
        assert_eq!(containment(&filter), json!({ "_id": "e1" }));
    }
}
