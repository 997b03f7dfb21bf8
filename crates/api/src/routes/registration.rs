//! Device token registration routes.
//!
//! Both endpoints take the raw token as the request body and are idempotent:
//! registering a known token or unregistering an unknown one still answers `OK`.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;
use axum::routing::post;
use axum::Router;

use promet_common::error::AppError;
use promet_common::stats::StatKind;
use promet_common::store::{Store, StoreTx};
use promet_common::types::NewDeviceToken;

use crate::state::AppState;

pub fn router<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/register", post(register::<S>))
        .route("/unregister", post(unregister::<S>))
}

/// POST /register: store the token unless it is already known.
async fn register<S: Store>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    body: String,
) -> Result<&'static str, AppError> {
    let token = parse_token(&body)?;
    let user_agent = user_agent(&headers);

    let mut tx = state.store.begin().await?;
    let created = tx
        .insert_token_if_absent(&NewDeviceToken::new(token, user_agent))
        .await?;
    tx.commit().await?;

    if created {
        state.stats.increment(StatKind::DeviceRegistrations);
        tracing::info!(token, ua = user_agent, "New device token registered");
    } else {
        tracing::info!(token, ua = user_agent, "Skipping existing device token");
    }

    Ok("OK")
}

/// POST /unregister: remove the token if present.
async fn unregister<S: Store>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    body: String,
) -> Result<&'static str, AppError> {
    let token = parse_token(&body)?;
    let user_agent = user_agent(&headers);

    let mut tx = state.store.begin().await?;
    let removed = tx.delete_token(token).await?;
    tx.commit().await?;

    if removed {
        state.stats.increment(StatKind::DeviceUnregistrations);
        tracing::info!(token, ua = user_agent, "Removed device token registration");
    } else {
        state.stats.increment(StatKind::DeviceUnregistrationsInvalid);
        tracing::info!(token, ua = user_agent, "Device token for removal not found");
    }

    Ok("OK")
}

fn parse_token(body: &str) -> Result<&str, AppError> {
    let token = body.trim();
    if token.is_empty() {
        return Err(AppError::Validation("empty device token".to_string()));
    }
    Ok(token)
}

fn user_agent(headers: &HeaderMap) -> &str {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}
