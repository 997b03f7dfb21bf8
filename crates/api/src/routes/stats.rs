//! Plain-text statistics endpoint.

use std::fmt::Write;

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use chrono::{Local, TimeZone};

use promet_common::error::AppError;
use promet_common::stats::StatsSnapshot;
use promet_common::store::{Store, StoreTx};

use crate::state::AppState;

pub fn router<S: Store>() -> Router<AppState<S>> {
    Router::new().route("/stats", get(show_stats::<S>))
}

/// GET /stats: one `name:value` line per counter. A count the store could
/// not produce is printed as `-1`.
async fn show_stats<S: Store>(State(state): State<AppState<S>>) -> Result<String, AppError> {
    let mut tx = state.store.begin().await?;

    let registered = tx.count_tokens().await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to count device tokens");
        -1
    });
    let todays_events = tx
        .count_events_since(start_of_today())
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to count today's events");
            -1
        });
    tx.commit().await?;

    Ok(render(registered, todays_events, &state.stats.snapshot()))
}

/// Local midnight as epoch seconds.
fn start_of_today() -> i64 {
    let now = Local::now();
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| Local.from_local_datetime(&midnight).earliest())
        .map(|midnight| midnight.timestamp())
        .unwrap_or_else(|| now.timestamp() - now.timestamp().rem_euclid(86_400))
}

pub fn render(registered: i64, todays_events: i64, stats: &StatsSnapshot) -> String {
    let lines: [(&str, i128); 9] = [
        ("registered_api_keys", registered.into()),
        ("todays_events", todays_events.into()),
        ("today_dispatches", stats.dispatches.into()),
        ("today_failed_dispatches", stats.failed_dispatches.into()),
        ("today_device_registrations", stats.device_registrations.into()),
        ("today_device_unregistrations", stats.device_unregistrations.into()),
        (
            "today_device_unregistrations_invalid",
            stats.device_unregistrations_invalid.into(),
        ),
        ("today_device_updatedkeys", stats.updated_push_keys.into()),
        ("today_failed_messages", stats.failed_messages.into()),
    ];

    let mut out = String::new();
    for (name, value) in lines {
        let _ = writeln!(out, "{}:{}", name, value);
    }
    out
}
