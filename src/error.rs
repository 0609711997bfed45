use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

/// Failure of a token lifecycle or sync operation.
///
/// Remote lookups that simply find nothing (no default branch, no file at a
/// ref, no builds) are `None` at the call site and never reach this type.
/// Batch operations log per-unit failures and carry on; only single-unit
/// operations such as token exchange or refresh return these to the caller.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Remote host unreachable or returned no usable response
    #[error("{0}")]
    TransientRemoteFailure(String),

    /// Remote host answered with a payload of unexpected shape
    #[error("{0}")]
    MalformedRemoteData(String),

    #[error("{0}")]
    NotFound(String),

    /// Duplicate token for a provider, or token/user mismatch
    #[error("{0}")]
    Conflict(String),

    /// The remote identity behind a freshly exchanged token could not be resolved
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Storage operation failed")]
    Store(#[from] anyhow::Error),

    #[error("{0}")]
    Internal(String),
}

impl SyncError {
    pub fn status(&self) -> StatusCode {
        match self {
            SyncError::TransientRemoteFailure(_) | SyncError::MalformedRemoteData(_) => {
                StatusCode::BAD_GATEWAY
            }
            SyncError::NotFound(_) => StatusCode::NOT_FOUND,
            // An exchanged token without a known owner is rejected like a duplicate
            SyncError::Conflict(_) | SyncError::Unauthorized(_) => StatusCode::CONFLICT,
            SyncError::BadRequest(_) => StatusCode::BAD_REQUEST,
            SyncError::Store(_) | SyncError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn malformed(what: &str, err: impl std::fmt::Display) -> Self {
        SyncError::MalformedRemoteData(format!("Malformed {}: {}", what, err))
    }
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            // Structured fields keep remote payload text out of the message
            match &self {
                SyncError::Store(source) => tracing::error!(
                    status = status.as_u16(),
                    error = ?source,
                    "Sync error"
                ),
                other => tracing::error!(
                    status = status.as_u16(),
                    message = %other,
                    "Sync error"
                ),
            }
        }

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
