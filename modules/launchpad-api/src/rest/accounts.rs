use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use launchpad_common::{Account, AccountRef};
use launchpad_social::{AccountUpdate, NewAccount};

use crate::error::ApiError;
use crate::AppState;

pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Result<Json<Account>, ApiError> {
    Ok(Json(state.social.get_account(&AccountRef(uid)).await?))
}

pub async fn create_account(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewAccount>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
    let account = state.social.create_account(body).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn update_account(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
    Json(body): Json<AccountUpdate>,
) -> Result<Json<Account>, ApiError> {
    Ok(Json(state.social.update_account(&AccountRef(uid), body).await?))
}

pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.social.delete_account(&AccountRef(uid)).await?;
    Ok(StatusCode::NO_CONTENT)
}
