//! Handoff channels between the poller and its consumers.
//!
//! - The dispatch queue holds at most one batch. A producer waits until the
//!   single dispatch worker has taken the previous batch, so no more than one
//!   cycle is ever queued behind the one being processed.
//! - The materialized-events channel only keeps the latest merged feed, for
//!   read-only consumers such as the `/data` endpoint.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::error::AppError;
use crate::types::TrafficEvent;

/// Identifiers of newly stored events, in feed order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchBatch {
    pub event_ids: Vec<String>,
}

impl DispatchBatch {
    pub fn new(event_ids: Vec<String>) -> Self {
        Self { event_ids }
    }

    pub fn is_empty(&self) -> bool {
        self.event_ids.is_empty()
    }
}

/// Create the single-slot dispatch queue.
pub fn dispatch_queue() -> (DispatchSender, DispatchReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (DispatchSender { tx }, DispatchReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct DispatchSender {
    tx: mpsc::Sender<DispatchBatch>,
}

impl DispatchSender {
    /// Wait for the slot to be free, then hand the batch over.
    pub async fn send(&self, batch: DispatchBatch) -> Result<(), AppError> {
        self.tx
            .send(batch)
            .await
            .map_err(|_| AppError::Internal("dispatch worker has stopped".to_string()))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug)]
pub struct DispatchReceiver {
    rx: mpsc::Receiver<DispatchBatch>,
}

impl DispatchReceiver {
    /// Next batch, or `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<DispatchBatch> {
        self.rx.recv().await
    }

    /// Take a waiting batch without blocking.
    pub fn try_recv(&mut self) -> Option<DispatchBatch> {
        self.rx.try_recv().ok()
    }
}

/// Create the latest-value channel for merged feed items.
pub fn materialized_events() -> (EventsPublisher, EventsReader) {
    let (tx, rx) = watch::channel(None);
    (EventsPublisher { tx }, EventsReader { rx })
}

#[derive(Debug, Clone)]
pub struct EventsPublisher {
    tx: watch::Sender<Option<Arc<Vec<TrafficEvent>>>>,
}

impl EventsPublisher {
    pub fn publish(&self, events: Vec<TrafficEvent>) {
        // Readers may come and go; a send with none attached is still kept.
        self.tx.send_replace(Some(Arc::new(events)));
    }
}

#[derive(Debug, Clone)]
pub struct EventsReader {
    rx: watch::Receiver<Option<Arc<Vec<TrafficEvent>>>>,
}

impl EventsReader {
    /// Most recently published items, or `None` before the first poll.
    pub fn latest(&self) -> Option<Arc<Vec<TrafficEvent>>> {
        self.rx.borrow().clone()
    }
}
