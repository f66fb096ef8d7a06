use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// The three error shapes that actually cross an HTTP boundary. Upstream-transient,
/// upstream-fatal, and storage-row errors (§7 kinds 2/3/5) are collector-internal
/// and never become an `AppError` — they are logged and folded into per-kit stats.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::StorageUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::Internal(e) => {
                tracing::error!("internal error: {e:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}

impl From<clickhouse::error::Error> for AppError {
    fn from(e: clickhouse::error::Error) -> Self {
        match &e {
            clickhouse::error::Error::Network(_) => AppError::StorageUnavailable(e.to_string()),
            _ => AppError::Internal(anyhow::anyhow!(e)),
        }
    }
}

impl From<crate::config_db::RegistryError> for AppError {
    fn from(e: crate::config_db::RegistryError) -> Self {
        match &e {
            crate::config_db::RegistryError::NotFound(msg) => AppError::Validation(format!("not found: {msg}")),
            crate::config_db::RegistryError::Duplicate(msg) => {
                AppError::Validation(format!("already exists: {msg}"))
            }
            crate::config_db::RegistryError::Sqlite(inner) => {
                let msg = inner.to_string();
                if msg.contains("locked") || msg.contains("unable to open database file") {
                    AppError::StorageUnavailable(msg)
                } else {
                    AppError::Internal(anyhow::anyhow!(msg))
                }
            }
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::DatabaseBusy
                    || err.code == rusqlite::ErrorCode::CannotOpen =>
            {
                AppError::StorageUnavailable(e.to_string())
            }
            _ => AppError::Internal(anyhow::anyhow!(e)),
        }
    }
}
