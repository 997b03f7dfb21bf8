//! HTTP surface of the push relay.
//!
//! - `POST /register`, `POST /unregister`: device token registration
//! - `GET /stats`: plain-text daily counters
//! - `GET /data`: JSON snapshot of the latest feed
//! - `GET /health`

pub mod routes;
pub mod state;
