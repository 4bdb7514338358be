use url::Url;

use crate::{error::ApiError, replicate::GenerationModel};

const MISSING_URLS: &str = "Missing image URLs";
const INVALID_URLS: &str = "Invalid URLs provided";
const INVALID_MODEL: &str = "Invalid model, expected 'banana' or 'seedream'";

fn is_http_url(raw: &str) -> bool {
    raw.starts_with("http")
        && Url::parse(raw)
            .map(|url| matches!(url.scheme(), "http" | "https"))
            .unwrap_or(false)
}

/// Every URL must be present first; only then is each checked for an http(s) scheme.
pub fn validate_image_urls<const N: usize>(
    urls: [Option<&str>; N],
) -> Result<[&str; N], ApiError> {
    let mut checked = [""; N];
    for (slot, url) in checked.iter_mut().zip(urls) {
        match url {
            Some(url) if !url.is_empty() => *slot = url,
            _ => return Err(ApiError::bad_request(MISSING_URLS)),
        }
    }
    if !checked.iter().all(|url| is_http_url(url)) {
        return Err(ApiError::bad_request(INVALID_URLS));
    }
    Ok(checked)
}

pub fn validate_model(raw: Option<&str>) -> Result<GenerationModel, ApiError> {
    raw.and_then(GenerationModel::parse)
        .ok_or_else(|| ApiError::bad_request(INVALID_MODEL))
}
