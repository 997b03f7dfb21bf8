//! Shared application state for the Axum API server.

use std::sync::Arc;

use promet_common::queue::EventsReader;
use promet_common::stats::Statistics;
use promet_common::store::Store;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState<S: Store> {
    pub store: S,
    pub stats: Arc<Statistics>,
    pub events: EventsReader,
}

impl<S: Store> AppState<S> {
    pub fn new(store: S, stats: Arc<Statistics>, events: EventsReader) -> Self {
        Self {
            store,
            stats,
            events,
        }
    }
}
