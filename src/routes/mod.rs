use std::sync::Arc;

use anyhow::Result;
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    config::AppConfig,
    error::ApiError,
    history::{HistoryStore, LocalFileStorage},
    replicate::ReplicateClient,
};

pub mod cors;
pub mod generate;
pub mod history;
pub mod token;
pub mod upload;
pub mod validation;

pub struct AppState {
    pub config: AppConfig,
    pub replicate: ReplicateClient,
    pub history: HistoryStore,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self> {
        let replicate = ReplicateClient::new(&config.replicate_api_base, config.replicate_timeout)?;
        let history = HistoryStore::new(LocalFileStorage::new(config.history_dir.clone()));
        Ok(Self {
            config,
            replicate,
            history,
        })
    }
}

/// Body limit for the upload route: base64 inflates a file by a third, plus form overhead.
fn upload_body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes
        .saturating_mul(2)
        .saturating_add(1024 * 1024)
}

pub fn router(state: SharedState) -> Router {
    let body_limit = upload_body_limit(state.config.max_upload_bytes);

    let router = Router::new()
        .route("/health", get(health).fallback(method_not_allowed))
        .route(
            "/api/generate",
            post(generate::generate).fallback(method_not_allowed),
        )
        .route(
            "/api/generate/duo",
            post(generate::generate_duo).fallback(method_not_allowed),
        )
        .route(
            "/api/upload",
            post(upload::upload)
                .fallback(method_not_allowed)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/api/token",
            get(token::token_status).fallback(method_not_allowed),
        )
        .route(
            "/api/history",
            get(history::list_history)
                .post(history::create_history)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/history/{id}",
            get(history::get_history)
                .delete(history::delete_history)
                .fallback(method_not_allowed),
        );

    let router = match state.config.static_dir.clone() {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router.fallback(route_not_found),
    };

    router
        .layer(middleware::from_fn(cors::cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

async fn route_not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_limit_leaves_room_for_base64() {
        let max = 10 * 1024 * 1024;
        assert!(upload_body_limit(max) > max * 4 / 3);
        assert_eq!(upload_body_limit(usize::MAX), usize::MAX);
    }
}
