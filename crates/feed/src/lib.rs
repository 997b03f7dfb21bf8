//! Upstream traffic feed: wire format, decoding and locale merging.

pub mod item;

use std::collections::HashMap;

use serde::Deserialize;

use promet_common::error::AppError;
use promet_common::types::TrafficEvent;

pub use item::FeedItem;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Contents", default)]
    contents: Vec<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(rename = "Data", default)]
    data: ContentData,
}

#[derive(Debug, Default, Deserialize)]
struct ContentData {
    #[serde(rename = "Items", default)]
    items: Vec<FeedItem>,
}

/// Decode a feed response body into its items.
///
/// The body is a `Contents` array whose first element wraps the `Items`. A body
/// that does not parse, or whose `Contents` array is empty, is malformed.
pub fn decode_feed(body: &[u8]) -> Result<Vec<FeedItem>, AppError> {
    let envelope: Envelope = serde_json::from_slice(body)
        .map_err(|e| AppError::UpstreamMalformed(format!("invalid feed body: {}", e)))?;

    let content = envelope
        .contents
        .into_iter()
        .next()
        .ok_or_else(|| AppError::UpstreamMalformed("feed has no contents".to_string()))?;

    Ok(content.data.items)
}

/// Merge the secondary-locale text into the primary-locale items.
///
/// Output follows the primary feed's order. An item without a translation
/// keeps empty translated fields.
pub fn merge_translations(
    primary: Vec<FeedItem>,
    secondary: Vec<FeedItem>,
    ingested_at: i64,
) -> Vec<TrafficEvent> {
    let translations: HashMap<String, FeedItem> = secondary
        .into_iter()
        .map(|item| (item.id.clone(), item))
        .collect();

    primary
        .into_iter()
        .map(|item| {
            let translation = translations.get(&item.id);
            if translation.is_none() {
                tracing::warn!(id = %item.id, "No translation found for event");
            }
            item.into_event(translation, ingested_at)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, road: &str) -> FeedItem {
        FeedItem {
            id: id.to_string(),
            road: road.to_string(),
            cause: format!("cause {}", road),
            description: format!("description {}", road),
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_feed_reads_first_content_items() {
        let body = serde_json::json!({
            "Contents": [
                { "Data": { "Items": [ { "Id": "a" }, { "Id": "b" } ] } }
            ]
        });
        let items = decode_feed(body.to_string().as_bytes()).unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_decode_feed_empty_contents_is_malformed() {
        let err = decode_feed(br#"{"Contents": []}"#).unwrap_err();
        assert!(matches!(err, AppError::UpstreamMalformed(_)));

        let err = decode_feed(br#"{}"#).unwrap_err();
        assert!(matches!(err, AppError::UpstreamMalformed(_)));
    }

    #[test]
    fn test_decode_feed_garbage_is_malformed() {
        let err = decode_feed(b"<html>maintenance</html>").unwrap_err();
        assert!(matches!(err, AppError::UpstreamMalformed(_)));
    }

    #[test]
    fn test_decode_feed_content_without_items_is_empty() {
        let items = decode_feed(br#"{"Contents": [{"Data": {}}]}"#).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_merge_translations_fills_english_fields() {
        let primary = vec![item("a", "A1"), item("b", "H4")];
        let secondary = vec![item("b", "H4 en"), item("a", "A1 en")];

        let merged = merge_translations(primary, secondary, 100);
        assert_eq!(merged[0].id, "a");
        assert_eq!(merged[0].road, "A1");
        assert_eq!(merged[0].road_en, "A1 en");
        assert_eq!(merged[0].cause_en, "cause A1 en");
        assert_eq!(merged[1].description_en, "description H4 en");
        assert!(merged.iter().all(|e| e.ingested_at == 100));
    }

    #[test]
    fn test_merge_translations_missing_translation_is_soft() {
        let merged = merge_translations(vec![item("a", "A1")], vec![item("z", "Z")], 0);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].road_en, "");
        assert_eq!(merged[0].description_en, "");
    }
}
