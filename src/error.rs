use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

use crate::replicate::ReplicateError;

/// Every failure a handler can return. Rendered as `{"message": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{0}")]
    UnsupportedMediaType(String),
    #[error("{0}")]
    Config(String),
    #[error("{message}")]
    Upstream { status: StatusCode, message: String },
    #[error("Failed to upload to Replicate")]
    UploadRejected { status: StatusCode, body: String },
    #[error("{message}")]
    Partial {
        status: StatusCode,
        message: String,
        image_url: String,
    },
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream { status, .. }
            | Self::UploadRejected { status, .. }
            | Self::Partial { status, .. } => *status,
        }
    }

    /// Maps an extractor rejection onto the same taxonomy, keeping its status class.
    fn from_rejection(status: StatusCode, message: String) -> Self {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(message)
        } else if status == StatusCode::UNSUPPORTED_MEDIA_TYPE {
            Self::UnsupportedMediaType(message)
        } else if status.is_server_error() {
            Self::Internal(message)
        } else {
            Self::BadRequest(message)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self, "request failed");
        } else {
            debug!(%status, error = %self, "request rejected");
        }

        let body = match self {
            Self::UploadRejected { body, .. } => json!({
                "message": "Failed to upload to Replicate",
                "error": body,
            }),
            Self::Partial {
                message, image_url, ..
            } => json!({ "message": message, "imageUrl1": image_url }),
            other => json!({ "message": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ReplicateError> for ApiError {
    fn from(err: ReplicateError) -> Self {
        match err {
            ReplicateError::InvalidResponse => Self::Internal(err.to_string()),
            ReplicateError::Rejected { message, .. } => Self::Upstream {
                status: StatusCode::BAD_REQUEST,
                message,
            },
            ReplicateError::NoImage(message) => Self::Internal(message),
            ReplicateError::UploadFailed { status, body } => Self::UploadRejected { status, body },
            ReplicateError::MissingUploadUrl | ReplicateError::Transport(_) => Self::Upstream {
                status: StatusCode::BAD_GATEWAY,
                message: err.to_string(),
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::from_rejection(err.status(), err.body_text())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
