//! Streaming error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dispatcher::DispatcherError;
use serde_json::json;
use thiserror::Error;

/// An event that cannot be written as an SSE frame
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("event id '{0}' contains a line break or NUL")]
    InvalidId(String),

    #[error("event name '{0}' contains a line break or NUL")]
    InvalidEventName(String),

    #[error("event data contains a bare carriage return")]
    BareCarriageReturn,
}

/// Errors returned by HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("broadcaster is shutting down")]
    Unavailable,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl From<DispatcherError> for ApiError {
    fn from(err: DispatcherError) -> Self {
        match err {
            DispatcherError::Closed => Self::Unavailable,
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadRequest(_) | Self::Encode(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Failures starting or running the HTTP server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}
