//! Health check endpoint.

use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use promet_common::store::Store;

use crate::state::AppState;

pub fn router<S: Store>() -> Router<AppState<S>> {
    Router::new().route("/health", get(health_check))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "promet-push",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
