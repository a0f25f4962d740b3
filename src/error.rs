/// API error type
///
/// User-facing failures surfaced by the HTTP layer. Each variant maps to a
/// status code and a stable numeric error code in the JSON body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    MissingParameter(String),

    #[error("{0}")]
    InvalidParameter(String),

    #[error("{0}")]
    ObjectNotFound(String),

    #[error("{0}")]
    AuthenticationFailed(String),

    #[error("{0}")]
    ItemAccessibility(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BackendUnavailable(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingParameter(_) | ApiError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            ApiError::ObjectNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            ApiError::ItemAccessibility(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BackendUnavailable(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn err_code(&self) -> u32 {
        match self {
            ApiError::MissingParameter(_) => 400_003,
            ApiError::InvalidParameter(_) => 400_008,
            ApiError::ObjectNotFound(_) => 404_001,
            ApiError::AuthenticationFailed(_) => 401_001,
            ApiError::ItemAccessibility(_) => 403_002,
            ApiError::Conflict(_) => 409_001,
            ApiError::BackendUnavailable(_) | ApiError::Internal(_) => 500_001,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Internal(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("❌ Request failed: {:#}", self);
        } else {
            tracing::warn!("⚠️ Request rejected ({}): {}", status, self);
        }

        let body = Json(json!({
            "err_msg": self.to_string(),
            "err_code": self.err_code(),
        }));
        (status, body).into_response()
    }
}
