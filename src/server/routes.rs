//! HTTP surface of the item service.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderName, Method, StatusCode};
use axum::routing::{get, put};
use axum::{Json, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::service::{IdClock, ItemService};
use crate::db::DocumentStore;
use crate::model::{Item, ItemInput};

/// Shared handler state: one service, one store handle for the whole process.
pub struct AppState<S, C> {
  service: Arc<ItemService<S, C>>,
}

impl<S, C> Clone for AppState<S, C> {
  fn clone(&self) -> Self {
    Self {
      service: Arc::clone(&self.service),
    }
  }
}

/// Build the router with CORS and request tracing.
pub fn router<S: DocumentStore, C: IdClock>(service: ItemService<S, C>) -> Router {
  let state = AppState {
    service: Arc::new(service),
  };

  Router::new()
    .route("/items", get(list_items::<S, C>).post(create_item::<S, C>))
    .route(
      "/items/{id}",
      put(update_item::<S, C>).delete(delete_item::<S, C>),
    )
    .layer(cors_layer())
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

fn cors_layer() -> CorsLayer {
  CorsLayer::new()
    .allow_origin(AllowOrigin::any())
    .allow_methods([
      Method::GET,
      Method::POST,
      Method::OPTIONS,
      Method::PATCH,
      Method::PUT,
      Method::DELETE,
    ])
    .allow_headers([
      header::AUTHORIZATION,
      HeaderName::from_static("x-api-key"),
      header::ORIGIN,
      HeaderName::from_static("x-requested-with"),
      header::CONTENT_TYPE,
      header::ACCEPT,
      header::ACCESS_CONTROL_REQUEST_METHOD,
    ])
}

/// Leading integer of the path segment, so `12abc` and `12.7` both address 12.
/// A `0x` prefix reads hex digits. No leading digits means no id.
fn parse_id(raw: &str) -> Option<i64> {
  let raw = raw.trim_start();
  let (negative, rest) = match raw.as_bytes().first() {
    Some(b'-') => (true, &raw[1..]),
    Some(b'+') => (false, &raw[1..]),
    _ => (false, raw),
  };

  let (radix, digits) = match rest.get(..2) {
    Some("0x" | "0X") => (16, &rest[2..]),
    _ => (10, rest),
  };
  let end = digits
    .find(|c: char| !c.is_digit(radix))
    .unwrap_or(digits.len());

  let value = i64::from_str_radix(&digits[..end], radix).ok()?;
  Some(if negative { -value } else { value })
}

async fn list_items<S: DocumentStore, C: IdClock>(
  State(state): State<AppState<S, C>>,
) -> Result<Json<Vec<Item>>, ApiError> {
  Ok(Json(state.service.list().await?))
}

async fn create_item<S: DocumentStore, C: IdClock>(
  State(state): State<AppState<S, C>>,
  Json(input): Json<ItemInput>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
  let item = state.service.create(input).await?;
  Ok((StatusCode::CREATED, Json(item)))
}

async fn update_item<S: DocumentStore, C: IdClock>(
  State(state): State<AppState<S, C>>,
  Path(id): Path<String>,
  Json(input): Json<ItemInput>,
) -> Result<Json<Item>, ApiError> {
  Ok(Json(state.service.update(parse_id(&id), input).await?))
}

async fn delete_item<S: DocumentStore, C: IdClock>(
  State(state): State<AppState<S, C>>,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
  state.service.delete(parse_id(&id)).await?;
  Ok(StatusCode::NO_CONTENT)
}
