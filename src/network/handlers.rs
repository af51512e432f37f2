//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::engine::Engine;
use crate::error::EmberError;
use crate::index::Lookup;

/// Body returned by `/get` for an expired key
pub const EXPIRED_MESSAGE: &str = "Key has expired";

/// Build the router with the engine as shared state
pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/set", get(set_handler))
        .route("/get", get(get_handler))
        .route("/delete", get(delete_handler))
        .route("/merge", post(merge_handler))
        .with_state(engine)
}

/// Query parameters; empty strings count as missing
#[derive(Debug, Default, Deserialize)]
pub(crate) struct KeyParams {
    bucket: Option<String>,
    key: Option<String>,
    value: Option<String>,
}

fn present(param: &Option<String>) -> Option<&str> {
    param.as_deref().filter(|s| !s.is_empty())
}

pub(crate) async fn set_handler(
    State(engine): State<Arc<Engine>>,
    Query(params): Query<KeyParams>,
) -> Response {
    let (Some(bucket), Some(key), Some(value)) = (
        present(&params.bucket),
        present(&params.key),
        present(&params.value),
    ) else {
        return (StatusCode::BAD_REQUEST, "Missing bucket, key or value").into_response();
    };

    match engine.set(bucket, key, value) {
        Ok(()) => (StatusCode::OK, "Value has been set").into_response(),
        Err(e) => internal_error(e),
    }
}

pub(crate) async fn get_handler(
    State(engine): State<Arc<Engine>>,
    Query(params): Query<KeyParams>,
) -> Response {
    let (Some(bucket), Some(key)) = (present(&params.bucket), present(&params.key)) else {
        return (StatusCode::BAD_REQUEST, "Missing bucket or key").into_response();
    };

    match engine.get(bucket, key) {
        Ok(Lookup::Value(value)) => (StatusCode::OK, value).into_response(),
        Ok(Lookup::Expired) => (StatusCode::OK, EXPIRED_MESSAGE).into_response(),
        Err(e) if e.is_not_found() => (StatusCode::NOT_FOUND, e.to_string()).into_response(),
        Err(e) => internal_error(e),
    }
}

pub(crate) async fn delete_handler(
    State(engine): State<Arc<Engine>>,
    Query(params): Query<KeyParams>,
) -> Response {
    let (Some(bucket), Some(key)) = (present(&params.bucket), present(&params.key)) else {
        return (StatusCode::BAD_REQUEST, "Missing bucket or key").into_response();
    };

    match engine.delete(bucket, key) {
        Ok(()) => (StatusCode::OK, "Value has been deleted").into_response(),
        Err(e) => internal_error(e),
    }
}

pub(crate) async fn merge_handler(State(engine): State<Arc<Engine>>) -> Response {
    match engine.merge() {
        Ok(stats) => (
            StatusCode::OK,
            format!(
                "Compacted: {} written, {} expired",
                stats.records_written, stats.expired_skipped
            ),
        )
            .into_response(),
        Err(e) => internal_error(e),
    }
}

fn internal_error(e: EmberError) -> Response {
    tracing::error!(error = %e, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
}
