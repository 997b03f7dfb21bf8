pub mod config;
pub mod db;
pub mod error;
pub mod memory;
pub mod queue;
pub mod stats;
pub mod store;
pub mod types;
