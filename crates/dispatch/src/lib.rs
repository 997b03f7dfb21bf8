//! Dispatch pipeline: turns batches of new event ids into push notifications.
//!
//! One [`dispatcher::Dispatcher`] worker drains the dispatch queue. Per batch it
//! assembles the notification payload, broadcasts it to the topic, then pages
//! through every registered device with retry and reconciles the provider's
//! per-token results against the token table.

pub mod assembler;
pub mod dispatcher;
pub mod pager;
pub mod reconciler;
pub mod retry;
