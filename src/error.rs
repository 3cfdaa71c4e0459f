use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors raised by the classification and aggregation core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrowdError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl CrowdError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Crowd(#[from] CrowdError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

// Extractor rejections are client mistakes; they answer with the same
// envelope as a failed `validate`.
macro_rules! reject_as_invalid {
    ($($rejection:ty),+ $(,)?) => {
        $(
            impl From<$rejection> for ApiError {
                fn from(rejection: $rejection) -> Self {
                    ApiError::Crowd(CrowdError::invalid(rejection.body_text()))
                }
            }
        )+
    };
}

reject_as_invalid!(JsonRejection, QueryRejection, PathRejection);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Crowd { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Internal(ref e) => {
                error!("Request failed: {e:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = json!({
            "success": false,
            "error": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}
