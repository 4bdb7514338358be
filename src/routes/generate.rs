use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{
    AppState, SharedState,
    validation::{validate_image_urls, validate_model},
};
use crate::{
    error::ApiError,
    history::{DuoMetadata, GenerationMetadata, NewHistoryRecord},
    replicate::{GenerationModel, PredictionRequest, build_prompt},
};

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default, alias = "imageSofaUrl")]
    pub sofa_url: Option<String>,
    #[serde(default, alias = "imageFabricUrl")]
    pub fabric_url: Option<String>,
    #[serde(default, alias = "fabricDescription")]
    pub description: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DuoGenerateRequest {
    #[serde(default, alias = "imageSofaUrl")]
    pub sofa_url: Option<String>,
    #[serde(default, alias = "tissu1Url", alias = "imageFabricUrl1")]
    pub fabric_url_1: Option<String>,
    #[serde(default, alias = "tissu2Url", alias = "imageFabricUrl2")]
    pub fabric_url_2: Option<String>,
    #[serde(default, alias = "fabricDescription")]
    pub description: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

#[derive(Debug, Serialize)]
pub struct DuoGenerateResponse {
    #[serde(rename = "imageUrl1")]
    pub image_url_1: String,
    #[serde(rename = "imageUrl2")]
    pub image_url_2: String,
}

async fn run_generation(
    state: &AppState,
    token: &str,
    model: GenerationModel,
    sofa_url: &str,
    fabric_url: &str,
    description: Option<&str>,
) -> Result<String, ApiError> {
    let prompt = build_prompt(description);
    let request = PredictionRequest::new(model, &prompt, sofa_url, fabric_url);
    info!(model = model.as_str(), "starting generation");
    let image_url = state.replicate.create_prediction(token, &request).await?;
    info!(model = model.as_str(), %image_url, "generation finished");
    Ok(image_url)
}

/// History is best effort: a failed write never fails the generation.
async fn record_history(state: &AppState, record: NewHistoryRecord) {
    match state.history.insert(record).await {
        Ok(saved) => info!(id = %saved.id, kind = %saved.kind, "saved generation to history"),
        Err(err) => warn!(error = %err, "failed to save generation to history"),
    }
}

pub async fn generate(
    State(state): State<SharedState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(request) = payload?;
    let [sofa_url, fabric_url] =
        validate_image_urls([request.sofa_url.as_deref(), request.fabric_url.as_deref()])?;
    let model = validate_model(request.model.as_deref())?;
    let token = state.config.require_token()?;
    let description = request.description.as_deref().filter(|d| !d.is_empty());

    let image_url =
        run_generation(&state, token, model, sofa_url, fabric_url, description).await?;

    let metadata = GenerationMetadata {
        sofa_url,
        fabric_url,
        model,
        description,
    };
    record_history(&state, NewHistoryRecord::simple(&image_url, &metadata)).await;

    Ok(Json(GenerateResponse { image_url }))
}

/// Two fabrics on the same sofa, generated one after the other.
///
/// When the second call fails the first image is saved as a simple history entry and
/// returned alongside the error.
pub async fn generate_duo(
    State(state): State<SharedState>,
    payload: Result<Json<DuoGenerateRequest>, JsonRejection>,
) -> Result<Json<DuoGenerateResponse>, ApiError> {
    let Json(request) = payload?;
    let [sofa_url, fabric_url_1, fabric_url_2] = validate_image_urls([
        request.sofa_url.as_deref(),
        request.fabric_url_1.as_deref(),
        request.fabric_url_2.as_deref(),
    ])?;
    let model = validate_model(request.model.as_deref())?;
    let token = state.config.require_token()?;
    let description = request.description.as_deref().filter(|d| !d.is_empty());

    let image_url_1 =
        run_generation(&state, token, model, sofa_url, fabric_url_1, description).await?;

    let image_url_2 =
        match run_generation(&state, token, model, sofa_url, fabric_url_2, description).await {
            Ok(url) => url,
            Err(err) => {
                warn!(error = %err, "second duo generation failed, keeping the first result");
                let metadata = GenerationMetadata {
                    sofa_url,
                    fabric_url: fabric_url_1,
                    model,
                    description,
                };
                record_history(&state, NewHistoryRecord::simple(&image_url_1, &metadata)).await;
                return Err(ApiError::Partial {
                    status: err.status(),
                    message: err.to_string(),
                    image_url: image_url_1,
                });
            }
        };

    let metadata = DuoMetadata {
        sofa_url,
        fabric_url1: fabric_url_1,
        fabric_url2: fabric_url_2,
        image_url2: &image_url_2,
        model,
        description,
    };
    record_history(&state, NewHistoryRecord::duo(&image_url_1, &metadata)).await;

    Ok(Json(DuoGenerateResponse {
        image_url_1,
        image_url_2,
    }))
}
