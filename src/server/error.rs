use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::db::StoreError;

/// Errors surfaced by the item handlers.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("Item not found")]
  NotFound,
  #[error(transparent)]
  Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::NotFound => StatusCode::NOT_FOUND,
      ApiError::Store(e) => {
        error!(error = %e, "document store failure");
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };

    (status, Json(json!({ "message": self.to_string() }))).into_response()
  }
}
