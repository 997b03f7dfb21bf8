//! Turns stored events into the outbound push payload.
//!
//! Push payloads have a hard size limit, so a message carries at most
//! [`MAX_EVENTS_PER_MESSAGE`] events and only a lone event keeps its long
//! description text.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use promet_common::error::AppError;
use promet_common::store::StoreTx;
use promet_common::types::TrafficEvent;
use promet_notifier::PushMessage;

/// Most events a single push message may carry.
pub const MAX_EVENTS_PER_MESSAGE: usize = 10;

/// Provider-side retention for undelivered messages.
pub const MESSAGE_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Payload key the app reads the event list from.
pub const EVENTS_KEY: &str = "events";

/// One event as the mobile app receives it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationEvent {
    /// FNV-1a hash of the upstream id.
    pub id: u32,
    pub cause: String,
    #[serde(rename = "causeEn")]
    pub cause_en: String,
    pub road: String,
    #[serde(rename = "roadEn")]
    pub road_en: String,
    #[serde(rename = "roadPriority")]
    pub road_priority: i32,
    pub description: String,
    #[serde(rename = "descriptionEn")]
    pub description_en: String,
    #[serde(rename = "isBorderCrossing")]
    pub is_border_crossing: bool,
    /// Milliseconds since the epoch.
    pub created: i64,
    /// Milliseconds since the epoch.
    #[serde(rename = "validUntil")]
    pub valid_until: i64,
    pub y_wgs: f64,
    pub x_wgs: f64,
}

/// The newest ids of a batch: its last [`MAX_EVENTS_PER_MESSAGE`] entries.
pub fn most_recent(ids: &[String]) -> &[String] {
    &ids[ids.len().saturating_sub(MAX_EVENTS_PER_MESSAGE)..]
}

/// Look up the newest events of a batch and project them.
///
/// Any id that cannot be found aborts the whole assembly.
pub async fn assemble<T: StoreTx>(
    tx: &mut T,
    ids: &[String],
) -> Result<Vec<NotificationEvent>, AppError> {
    let ids = most_recent(ids);
    let mut events = Vec::with_capacity(ids.len());

    for id in ids {
        let event = tx
            .find_event(id)
            .await?
            .ok_or_else(|| AppError::EventNotFound(id.clone()))?;
        events.push(event);
    }

    Ok(project(&events))
}

/// Project stored events into notifications, in order.
pub fn project(events: &[TrafficEvent]) -> Vec<NotificationEvent> {
    let with_description = events.len() == 1;

    events
        .iter()
        .map(|event| {
            let (description, description_en) = if with_description {
                (event.description.clone(), event.description_en.clone())
            } else {
                (String::new(), String::new())
            };

            NotificationEvent {
                id: event.id_hash(),
                cause: event.cause.clone(),
                cause_en: event.cause_en.clone(),
                road: event.road.clone(),
                road_en: event.road_en.clone(),
                road_priority: event.road_priority,
                description,
                description_en,
                is_border_crossing: event.is_border_crossing,
                created: event.updated * 1000,
                valid_until: event.valid_to * 1000,
                y_wgs: event.y_wgs,
                x_wgs: event.x_wgs,
            }
        })
        .collect()
}

/// Wrap notifications in the provider message shape.
pub fn build_message(notifications: &[NotificationEvent]) -> Result<PushMessage, AppError> {
    let encoded = serde_json::to_string(notifications)
        .map_err(|e| AppError::Internal(format!("Failed to encode payload: {}", e)))?;

    let mut data = BTreeMap::new();
    data.insert(EVENTS_KEY.to_string(), encoded);
    Ok(PushMessage::new(data, MESSAGE_TTL))
}
