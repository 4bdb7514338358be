use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::replicate::GenerationModel;

pub const SIMPLE: &str = "simple";
pub const DUO: &str = "duo";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub image_url: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewHistoryRecord {
    pub image_url: String,
    pub kind: String,
    pub metadata: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMetadata<'a> {
    pub sofa_url: &'a str,
    pub fabric_url: &'a str,
    pub model: GenerationModel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuoMetadata<'a> {
    pub sofa_url: &'a str,
    pub fabric_url1: &'a str,
    pub fabric_url2: &'a str,
    pub image_url2: &'a str,
    pub model: GenerationModel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
}

impl NewHistoryRecord {
    pub fn simple(image_url: &str, metadata: &GenerationMetadata<'_>) -> Self {
        Self {
            image_url: image_url.to_string(),
            kind: SIMPLE.to_string(),
            metadata: serde_json::to_value(metadata).unwrap_or_default(),
        }
    }

    pub fn duo(image_url: &str, metadata: &DuoMetadata<'_>) -> Self {
        Self {
            image_url: image_url.to_string(),
            kind: DUO.to_string(),
            metadata: serde_json::to_value(metadata).unwrap_or_default(),
        }
    }
}
