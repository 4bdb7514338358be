use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection, rejection::QueryRejection},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::SharedState;
use crate::{
    error::ApiError,
    history::{HistoryRecord, NewHistoryRecord, record::SIMPLE},
};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CreateHistoryRequest {
    #[serde(default, alias = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

pub async fn list_history(
    State(state): State<SharedState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<HistoryRecord>>, ApiError> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let records = state.history.list(limit).await?;
    Ok(Json(records))
}

pub async fn create_history(
    State(state): State<SharedState>,
    payload: Result<Json<CreateHistoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<HistoryRecord>), ApiError> {
    let Json(request) = payload?;
    let image_url = request
        .image_url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing image URL"))?;
    let kind = request
        .kind
        .filter(|kind| !kind.trim().is_empty())
        .unwrap_or_else(|| SIMPLE.to_string());

    let saved = state
        .history
        .insert(NewHistoryRecord {
            image_url,
            kind,
            metadata: request.metadata,
        })
        .await?;
    info!(id = %saved.id, "history entry created");
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn delete_history(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.history.delete(&id).await? {
        return Err(ApiError::NotFound("History entry not found".to_string()));
    }
    info!(%id, "history entry deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_history(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryRecord>, ApiError> {
    state
        .history
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("History entry not found".to_string()))
}
