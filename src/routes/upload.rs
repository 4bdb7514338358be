use axum::{
    Json,
    extract::{FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::SharedState;
use crate::{error::ApiError, replicate::UploadedFile};

const DEFAULT_MIME: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataUrlUpload {
    #[serde(default, alias = "data_url", alias = "image")]
    pub data_url: Option<String>,
    #[serde(default, alias = "fileName")]
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub uploaded: bool,
    pub url: String,
}

pub fn get_extension_from_mime_type(mime_type: &str) -> &'static str {
    match mime_type.to_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/svg+xml" => "svg",
        "image/avif" => "avif",
        _ => "bin",
    }
}

/// Splits `data:<mime>;base64,<payload>` into its MIME type and decoded bytes.
pub fn parse_data_url(raw: &str) -> Option<(String, Vec<u8>)> {
    let rest = raw.trim().strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    let mime = mime.split(';').next().unwrap_or_default().trim();
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    Some((mime.to_string(), bytes))
}

fn describe_limit(bytes: usize) -> String {
    const MIB: usize = 1024 * 1024;
    if bytes >= MIB {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{}KB", bytes.div_ceil(1024))
    }
}

fn validate_upload(file: &UploadedFile, max_bytes: usize) -> Result<(), ApiError> {
    if file.bytes.len() > max_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "File too large (max {})",
            describe_limit(max_bytes)
        )));
    }
    if !file.mime_type.starts_with("image/") {
        return Err(ApiError::bad_request("File must be an image"));
    }
    if file.bytes.is_empty() {
        return Err(ApiError::bad_request("Uploaded file is empty"));
    }
    Ok(())
}

async fn read_multipart(mut multipart: Multipart) -> Result<Option<UploadedFile>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        let is_file = matches!(field.name(), Some("file") | Some("content"))
            || field.file_name().is_some();
        if !is_file {
            continue;
        }
        let mime_type = field.content_type().unwrap_or(DEFAULT_MIME).to_string();
        let file_name = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("upload.{}", get_extension_from_mime_type(&mime_type)));
        let bytes = field.bytes().await?;
        return Ok(Some(UploadedFile {
            file_name,
            mime_type,
            bytes: bytes.to_vec(),
        }));
    }
    Ok(None)
}

fn read_data_url(body: DataUrlUpload) -> Result<Option<UploadedFile>, ApiError> {
    let Some(raw) = body.data_url.filter(|raw| !raw.trim().is_empty()) else {
        return Ok(None);
    };
    let (mime_type, bytes) =
        parse_data_url(&raw).ok_or_else(|| ApiError::bad_request("Invalid data URL"))?;
    let file_name = body
        .filename
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("upload.{}", get_extension_from_mime_type(&mime_type)));
    Ok(Some(UploadedFile {
        file_name,
        mime_type,
        bytes,
    }))
}

pub async fn upload(
    State(state): State<SharedState>,
    request: Request,
) -> Result<Json<UploadResponse>, ApiError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let file = if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &state).await?;
        read_multipart(multipart).await?
    } else if content_type.starts_with("application/json") {
        let Json(body) = Json::<DataUrlUpload>::from_request(request, &state).await?;
        read_data_url(body)?
    } else {
        return Err(ApiError::UnsupportedMediaType(
            "Unsupported content type".to_string(),
        ));
    };
    let file = file.ok_or_else(|| ApiError::bad_request("No file provided"))?;

    validate_upload(&file, state.config.max_upload_bytes)?;
    let token = state.config.require_token()?;

    info!(
        file_name = %file.file_name,
        mime_type = %file.mime_type,
        size = file.bytes.len(),
        "relaying upload to Replicate"
    );
    let url = state.replicate.upload_file(token, file).await?;
    info!(%url, "upload stored");

    Ok(Json(UploadResponse {
        uploaded: true,
        url,
    }))
}
