//! Snapshot of the latest merged feed as JSON.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use promet_common::store::Store;
use promet_common::types::TrafficEvent;

use crate::state::AppState;

pub fn router<S: Store>() -> Router<AppState<S>> {
    Router::new().route("/data", get(show_data::<S>))
}

#[derive(Debug, Serialize)]
pub struct DataEvent {
    /// Hashed upstream id, encoded as a string.
    pub id: String,
    pub y_wgs: f64,
    pub x_wgs: f64,
    pub category: String,
    pub description_sl: String,
    pub description_en: String,
    pub road_sl: String,
    pub road_en: String,
    pub cause_sl: String,
    pub cause_en: String,
    pub priority: i32,
    pub road_priority: i32,
    pub is_border_crossing: bool,
    pub updated: DateTime<Utc>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
}

impl From<&TrafficEvent> for DataEvent {
    fn from(event: &TrafficEvent) -> Self {
        Self {
            id: event.id_hash().to_string(),
            y_wgs: event.y_wgs,
            x_wgs: event.x_wgs,
            category: event.category.clone(),
            description_sl: event.description.clone(),
            description_en: event.description_en.clone(),
            road_sl: event.road.clone(),
            road_en: event.road_en.clone(),
            cause_sl: event.cause.clone(),
            cause_en: event.cause_en.clone(),
            priority: event.priority,
            road_priority: event.road_priority,
            is_border_crossing: event.is_border_crossing,
            updated: from_epoch(event.updated),
            valid_from: from_epoch(event.valid_from),
            valid_to: from_epoch(event.valid_to),
        }
    }
}

/// Response body. Cameras and fuel prices are not collected, their arrays stay empty.
#[derive(Debug, Serialize)]
pub struct DataResponse {
    pub events: Vec<DataEvent>,
    pub cameras: Vec<serde_json::Value>,
    pub prices: Vec<serde_json::Value>,
}

fn from_epoch(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

/// GET /data: 204 until the first poll has published a feed.
async fn show_data<S: Store>(State(state): State<AppState<S>>) -> Response {
    let Some(events) = state.events.latest() else {
        return StatusCode::NO_CONTENT.into_response();
    };

    Json(DataResponse {
        events: events.iter().map(DataEvent::from).collect(),
        cameras: Vec::new(),
        prices: Vec::new(),
    })
    .into_response()
}
