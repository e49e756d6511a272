// Typed reads and writes on top of the JSON document store.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::document::{Collection, Document, Filter};
use crate::error::StoreError;
use crate::traits::DocumentStore;

pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(doc) => Ok(doc),
        _ => Err(StoreError::TypeMismatch {
            path: String::new(),
            expected: "object",
        }),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

pub async fn find_all_as<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
) -> Result<Vec<T>, StoreError> {
    store
        .find_all(collection)
        .await?
        .into_iter()
        .map(from_document)
        .collect()
}

pub async fn find_one_as<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    filter: &Filter,
) -> Result<Option<T>, StoreError> {
    store
        .find_one(collection, filter)
        .await?
        .map(from_document)
        .transpose()
}
