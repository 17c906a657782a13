//! HTTP-facing error type.
//!
//! Every failure maps to a status code and a stable `{"error": "..."}` body.
//! Storage details are logged and never returned to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::storage::StoreError;

/// Non-exhaustive API error enum.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request body failed to parse or validate
    #[error("invalid input")]
    InvalidInput,

    /// Path id is not an integer
    #[error("invalid id")]
    InvalidId,

    /// Task does not exist
    #[error("task not found")]
    NotFound,

    /// A storage call failed
    #[error("{message}")]
    Storage {
        /// Client-facing message
        message: &'static str,
        /// Underlying failure, logged only
        #[source]
        source: StoreError,
    },
}

impl ApiError {
    /// Wraps a storage failure with the message returned to the client.
    pub fn storage(message: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Storage { message, source }
    }

    /// Error code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidInput => ErrorCode::InvalidInput,
            Self::InvalidId => ErrorCode::InvalidId,
            Self::NotFound => ErrorCode::NotFound,
            Self::Storage { .. } => ErrorCode::Internal,
        }
    }
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Malformed or invalid body
    InvalidInput,
    /// Malformed path id
    InvalidId,
    /// Missing task
    NotFound,
    /// Storage failure
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::InvalidId => "INVALID_ID",
            Self::NotFound => "NOT_FOUND",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// HTTP status for this error code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput | Self::InvalidId => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        if let Self::Storage { message, source } = &self {
            error!(code = code.as_str(), error = %source, "{message}");
        }
        (code.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
