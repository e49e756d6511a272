pub mod accounts;
pub mod events;
pub mod sync;

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Json,
};
use launchpad_common::{EntityKind, EntityRecord, LaunchpadError, RecordId};
use launchpad_store::typed::{find_all_as, find_one_as};
use launchpad_store::{Collection, Filter};

use crate::error::ApiError;
use crate::AppState;

pub async fn api_list_entities(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<Vec<EntityRecord>>, ApiError> {
    let kind: EntityKind = kind.parse()?;
    let records = find_all_as(state.store.as_ref(), Collection::Entities(kind)).await?;
    Ok(Json(records))
}

pub async fn api_entity_detail(
    State(state): State<Arc<AppState>>,
    Path((kind, record_id)): Path<(String, String)>,
) -> Result<Json<EntityRecord>, ApiError> {
    let kind: EntityKind = kind.parse()?;
    let id = RecordId(record_id);
    find_one_as(state.store.as_ref(), Collection::Entities(kind), &Filter::id(&id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError(LaunchpadError::NotFound(format!("{kind} {id}"))))
}
