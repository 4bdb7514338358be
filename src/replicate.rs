use std::time::Duration;

use reqwest::{
    Client, StatusCode,
    multipart::{Form, Part},
};
use serde::{Deserialize, Serialize, de::IgnoredAny};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_API_BASE: &str = "https://api.replicate.com/v1";

const BASE_PROMPT: &str = concat!(
    "Use the first image strictly as the base photo. Do not modify the sofa's shape, proportions, ",
    "stitching, cushions, seams, legs, lighting, shadows, background, or perspective. The sofa geometry ",
    "must remain IDENTICAL to the first image.\n\n",
    "Use the second image ONLY as a fabric reference (texture, color, grain, weave, reflectance). ",
    "Accurately transfer this fabric onto the sofa upholstery (seat, backrest, armrests) without altering ",
    "the sofa structure. Do NOT redesign the sofa. Do NOT invent new shapes or modify volumes. Apply the ",
    "fabric as a realistic material replacement, following the same folds, tension, curves and contact ",
    "shadows from the original sofa.\n\n",
    "The fabric appearance must match the sample exactly: same color tone, same weave density, same ",
    "thread pattern, same texture scale. Keep everything photorealistic and consistent with the original ",
    "lighting."
);

const DESCRIPTION_SEPARATOR: &str = "\n\nExtra fabric details: ";
const NO_IMAGE_MESSAGE: &str = "No image URL generated";

#[derive(Debug, Error)]
pub enum ReplicateError {
    #[error("Invalid Replicate response")]
    InvalidResponse,
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
    #[error("{0}")]
    NoImage(String),
    #[error("Failed to upload to Replicate")]
    UploadFailed { status: StatusCode, body: String },
    #[error("No URL returned from Replicate")]
    MissingUploadUrl,
    #[error("Replicate request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationModel {
    Banana,
    Seedream,
}

impl GenerationModel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "banana" => Some(Self::Banana),
            "seedream" => Some(Self::Seedream),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Banana => "banana",
            Self::Seedream => "seedream",
        }
    }

    /// Replicate `owner/name` path of the hosted model.
    pub fn model_path(self) -> &'static str {
        match self {
            Self::Banana => "google/nano-banana-pro",
            Self::Seedream => "bytedance/seedream-4",
        }
    }
}

/// Base prompt, with the optional free-form fabric description appended verbatim.
pub fn build_prompt(description: Option<&str>) -> String {
    match description {
        Some(description) if !description.is_empty() => {
            format!("{BASE_PROMPT}{DESCRIPTION_SEPARATOR}{description}")
        }
        _ => BASE_PROMPT.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct PredictionRequest {
    pub model: GenerationModel,
    pub input: Value,
}

impl PredictionRequest {
    pub fn new(model: GenerationModel, prompt: &str, sofa_url: &str, fabric_url: &str) -> Self {
        let input = match model {
            GenerationModel::Banana => json!({
                "prompt": prompt,
                "resolution": "2K",
                "image_input": [sofa_url, fabric_url],
                "aspect_ratio": "match_input_image",
                "output_format": "png",
                "safety_filter_level": "block_only_high",
            }),
            GenerationModel::Seedream => json!({
                "prompt": prompt,
                "image_input": [sofa_url, fabric_url],
                "size": "2K",
                "aspect_ratio": "match_input_image",
                "max_images": 1,
            }),
        };
        Self { model, input }
    }

    pub fn body(&self) -> Value {
        json!({ "input": self.input })
    }
}

/// Every shape Replicate has been seen to answer a synchronous prediction with.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProviderOutput {
    Url(String),
    Urls(Vec<Value>),
    Prediction(PredictionBody),
}

#[derive(Debug, Deserialize)]
struct PredictionBody {
    #[serde(default)]
    output: Option<OutputField>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OutputField {
    Url(String),
    Urls(Vec<Value>),
    Other(IgnoredAny),
}

fn first_url(values: &[Value]) -> Option<String> {
    values
        .first()
        .and_then(Value::as_str)
        .map(str::to_string)
}

impl ProviderOutput {
    fn image_url(&self) -> Option<String> {
        let url = match self {
            Self::Url(url) => Some(url.clone()),
            Self::Urls(values) => first_url(values),
            Self::Prediction(body) => match body.output.as_ref()? {
                OutputField::Url(url) => Some(url.clone()),
                OutputField::Urls(values) => first_url(values),
                OutputField::Other(_) => None,
            },
        };
        url.filter(|url| !url.is_empty())
    }

    fn error_message(&self) -> Option<String> {
        match self {
            Self::Prediction(body) => body
                .error
                .as_ref()
                .and_then(Value::as_str)
                .filter(|message| !message.is_empty())
                .map(str::to_string),
            _ => None,
        }
    }
}

pub fn extract_image_url(payload: &Value) -> Option<String> {
    ProviderOutput::deserialize(payload)
        .ok()
        .and_then(|output| output.image_url())
}

fn prediction_error(payload: &Value) -> Option<String> {
    ProviderOutput::deserialize(payload)
        .ok()
        .and_then(|output| output.error_message())
}

fn parse_body(raw: &str) -> Result<Value, ReplicateError> {
    if raw.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(raw).map_err(|_| ReplicateError::InvalidResponse)
}

fn rejection_message(status: StatusCode, payload: &Value) -> String {
    payload
        .get("detail")
        .and_then(Value::as_str)
        .filter(|detail| !detail.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Replicate error: {}", status.as_u16()))
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    urls: Option<UploadUrls>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadUrls {
    #[serde(default)]
    get: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct ReplicateClient {
    http: Client,
    api_base: String,
}

impl ReplicateClient {
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self, ReplicateError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Runs a blocking (`Prefer: wait`) prediction and returns the generated image URL.
    pub async fn create_prediction(
        &self,
        token: &str,
        request: &PredictionRequest,
    ) -> Result<String, ReplicateError> {
        let model_path = request.model.model_path();
        let response = self
            .http
            .post(format!("{}/models/{model_path}/predictions", self.api_base))
            .bearer_auth(token)
            .header("Prefer", "wait")
            .json(&request.body())
            .send()
            .await?;

        let status = response.status();
        debug!(model = model_path, %status, "replicate prediction answered");
        let raw = response.text().await?;
        let payload = parse_body(&raw)?;

        if !status.is_success() {
            return Err(ReplicateError::Rejected {
                status,
                message: rejection_message(status, &payload),
            });
        }

        extract_image_url(&payload).ok_or_else(|| {
            ReplicateError::NoImage(
                prediction_error(&payload).unwrap_or_else(|| NO_IMAGE_MESSAGE.to_string()),
            )
        })
    }

    /// Pushes a file to Replicate's upload store and returns its public URL.
    pub async fn upload_file(
        &self,
        token: &str,
        file: UploadedFile,
    ) -> Result<String, ReplicateError> {
        let size = file.bytes.len();
        let part = Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&file.mime_type)?;
        let form = Form::new().part("content", part);

        let response = self
            .http
            .post(format!("{}/uploads", self.api_base))
            .header(reqwest::header::AUTHORIZATION, format!("Token {token}"))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        debug!(%status, size, "replicate upload answered");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReplicateError::UploadFailed { status, body });
        }

        let raw = response.text().await?;
        let payload: UploadResponse =
            serde_json::from_str(&raw).map_err(|_| ReplicateError::InvalidResponse)?;
        payload
            .urls
            .and_then(|urls| urls.get)
            .or(payload.url)
            .filter(|url| !url.is_empty())
            .ok_or(ReplicateError::MissingUploadUrl)
    }
}
