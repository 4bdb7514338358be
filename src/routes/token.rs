use axum::{Json, extract::State};
use serde::Serialize;

use super::SharedState;

#[derive(Debug, Serialize)]
pub struct TokenStatus {
    pub configured: bool,
}

/// Reports whether the provider token is set. The token itself never leaves the server.
pub async fn token_status(State(state): State<SharedState>) -> Json<TokenStatus> {
    Json(TokenStatus {
        configured: state.config.replicate_token.is_some(),
    })
}
