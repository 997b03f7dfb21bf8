pub mod data;
pub mod health;
pub mod registration;
pub mod stats;

use axum::Router;

use promet_common::store::Store;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router<S: Store>(state: AppState<S>) -> Router {
    Router::new()
        .merge(health::router::<S>())
        .merge(registration::router::<S>())
        .merge(stats::router::<S>())
        .merge(data::router::<S>())
        .with_state(state)
}
