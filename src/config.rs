use std::{env, fmt, path::PathBuf, time::Duration};

use crate::{error::ApiError, replicate::DEFAULT_API_BASE};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    pub replicate_token: Option<String>,
    pub replicate_api_base: String,
    pub replicate_timeout: Duration,
    pub max_upload_bytes: usize,
    pub history_dir: PathBuf,
    pub static_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            port: get("PORT")
                .and_then(|value| value.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            replicate_token: get("REPLICATE_API_TOKEN"),
            replicate_api_base: get("REPLICATE_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            replicate_timeout: Duration::from_secs(
                get("REPLICATE_TIMEOUT_SECS")
                    .and_then(|value| value.parse().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            max_upload_bytes: get("MAX_UPLOAD_BYTES")
                .and_then(|value| value.parse().ok())
                .filter(|bytes| *bytes > 0)
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            history_dir: get("HISTORY_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_history_dir),
            static_dir: get("STATIC_DIR").map(PathBuf::from),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    pub fn require_token(&self) -> Result<&str, ApiError> {
        self.replicate_token
            .as_deref()
            .ok_or_else(|| ApiError::Config("REPLICATE_API_TOKEN not configured".to_string()))
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field(
                "replicate_token",
                &self.replicate_token.as_ref().map(|_| "<redacted>"),
            )
            .field("replicate_api_base", &self.replicate_api_base)
            .field("replicate_timeout", &self.replicate_timeout)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("history_dir", &self.history_dir)
            .field("static_dir", &self.static_dir)
            .finish()
    }
}

fn default_history_dir() -> PathBuf {
    let mut base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.push("canape-relay");
    base
}
