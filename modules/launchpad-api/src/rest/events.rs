use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use launchpad_common::{AccountRef, Comment, RecordId, Reply};
use launchpad_social::{InterestOutcome, NewComment, NewReply};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBody {
    account_ref: AccountRef,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentBody {
    comment_uuid: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentLikeBody {
    comment_uuid: String,
    account_ref: AccountRef,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddReplyBody {
    comment_uuid: String,
    #[serde(flatten)]
    reply: NewReply,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyBody {
    comment_uuid: String,
    reply_uuid: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyLikeBody {
    reply_uuid: String,
    account_ref: AccountRef,
}

pub async fn toggle_interest(
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<String>,
    Json(body): Json<AccountBody>,
) -> Result<Json<InterestOutcome>, ApiError> {
    let outcome = state
        .social
        .toggle_interest(&RecordId(record_id), &body.account_ref)
        .await?;
    Ok(Json(outcome))
}

pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<String>,
    Json(body): Json<NewComment>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let comment = state.social.add_comment(&RecordId(record_id), body).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<String>,
    Json(body): Json<CommentBody>,
) -> Result<StatusCode, ApiError> {
    state
        .social
        .delete_comment(&RecordId(record_id), &body.comment_uuid)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_like_comment(
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<String>,
    Json(body): Json<CommentLikeBody>,
) -> Result<Json<Value>, ApiError> {
    let liked = state
        .social
        .toggle_like_comment(&RecordId(record_id), &body.comment_uuid, &body.account_ref)
        .await?;
    Ok(Json(json!({ "liked": liked })))
}

pub async fn add_reply(
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<String>,
    Json(body): Json<AddReplyBody>,
) -> Result<(StatusCode, Json<Reply>), ApiError> {
    let reply = state
        .social
        .add_reply(&RecordId(record_id), &body.comment_uuid, body.reply)
        .await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

pub async fn delete_reply(
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<String>,
    Json(body): Json<ReplyBody>,
) -> Result<StatusCode, ApiError> {
    state
        .social
        .delete_reply(&RecordId(record_id), &body.comment_uuid, &body.reply_uuid)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_like_reply(
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<String>,
    Json(body): Json<ReplyLikeBody>,
) -> Result<Json<Value>, ApiError> {
    let liked = state
        .social
        .toggle_like_reply(&RecordId(record_id), &body.reply_uuid, &body.account_ref)
        .await?;
    Ok(Json(json!({ "liked": liked })))
}
