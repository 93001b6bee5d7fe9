use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    Conflict,
    RateLimited,
    Internal,
    Unavailable,
    Decode,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => ErrorCode::Validation,
            401 => ErrorCode::Unauthorized,
            403 => ErrorCode::Forbidden,
            404 => ErrorCode::NotFound,
            409 => ErrorCode::Conflict,
            429 => ErrorCode::RateLimited,
            _ => ErrorCode::Internal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// FastAPI-style error body: `{"detail": "..."}`. `detail` is a string for
/// `HTTPException` and a list of objects for request validation errors.
#[derive(Debug, Clone, Deserialize)]
pub struct DetailBody {
    pub detail: serde_json::Value,
}

impl DetailBody {
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}
