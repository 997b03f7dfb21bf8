use chrono::DateTime;
use serde::{Deserialize, Deserializer};

use promet_common::types::TrafficEvent;

/// One entry of the upstream `Items` array, in the feed's native field names.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeedItem {
    #[serde(rename = "Id", alias = "id")]
    pub id: String,
    pub y_wgs: f64,
    pub x_wgs: f64,
    #[serde(rename = "Kategorija")]
    pub category: String,
    #[serde(rename = "Description", alias = "Opis")]
    pub description: String,
    #[serde(rename = "Cesta")]
    pub road: String,
    #[serde(rename = "Title", alias = "Vzrok")]
    pub cause: String,
    #[serde(rename = "Prioriteta")]
    pub priority: i32,
    #[serde(rename = "PrioritetaCeste")]
    pub road_priority: i32,
    #[serde(rename = "isMejniPrehod", alias = "MejniPrehod")]
    pub is_border_crossing: bool,
    #[serde(rename = "Updated", deserialize_with = "epoch_seconds")]
    pub updated: i64,
    #[serde(rename = "VeljavnostOd", deserialize_with = "epoch_seconds")]
    pub valid_from: i64,
    #[serde(rename = "VeljavnostDo", deserialize_with = "epoch_seconds")]
    pub valid_to: i64,
}

impl FeedItem {
    /// Build the stored record, taking localized text from `translation` when present.
    pub fn into_event(self, translation: Option<&FeedItem>, ingested_at: i64) -> TrafficEvent {
        let (description_en, road_en, cause_en) = match translation {
            Some(t) => (t.description.clone(), t.road.clone(), t.cause.clone()),
            None => Default::default(),
        };

        TrafficEvent {
            id: self.id,
            y_wgs: self.y_wgs,
            x_wgs: self.x_wgs,
            category: self.category,
            description: self.description,
            description_en,
            road: self.road,
            road_en,
            cause: self.cause,
            cause_en,
            priority: self.priority,
            road_priority: self.road_priority,
            is_border_crossing: self.is_border_crossing,
            updated: self.updated,
            valid_from: self.valid_from,
            valid_to: self.valid_to,
            ingested_at,
        }
    }
}

/// Normalize a feed timestamp to epoch seconds.
///
/// Accepts RFC 3339 strings, bare `YYYY-MM-DDTHH:MM:SS` strings (read as UTC)
/// and numbers. Missing, null and empty values become 0.
fn epoch_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(0),
        Some(Raw::Number(n)) => Ok(n as i64),
        Some(Raw::Text(s)) => parse_timestamp(&s).map_err(serde::de::Error::custom),
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<i64, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.timestamp());
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc().timestamp());
    }
    raw.parse::<i64>()
        .map_err(|_| format!("unrecognised timestamp '{}'", raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rfc3339_with_offset() {
        assert_eq!(parse_timestamp("2018-03-25T19:00:00+02:00"), Ok(1_521_997_200));
        assert_eq!(parse_timestamp("2018-03-25T17:00:00Z"), Ok(1_521_997_200));
    }

    #[test]
    fn test_parse_naive_and_numeric() {
        assert_eq!(parse_timestamp("2018-03-25T17:00:00"), Ok(1_521_997_200));
        assert_eq!(parse_timestamp("1521997200"), Ok(1_521_997_200));
        assert_eq!(parse_timestamp(""), Ok(0));
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_item_decodes_native_keys() {
        let item: FeedItem = serde_json::from_value(serde_json::json!({
            "Id": "DARS_1",
            "y_wgs": 46.05,
            "x_wgs": 14.5,
            "Kategorija": "Zastoj",
            "Description": "Zastoj pred predorom",
            "Cesta": "A1",
            "Title": "Zastoj",
            "Prioriteta": 2,
            "PrioritetaCeste": 1,
            "isMejniPrehod": true,
            "Updated": "2018-03-25T19:00:00+02:00",
            "VeljavnostOd": null,
            "VeljavnostDo": 1521997300
        }))
        .unwrap();

        assert_eq!(item.id, "DARS_1");
        assert_eq!(item.road, "A1");
        assert_eq!(item.cause, "Zastoj");
        assert!(item.is_border_crossing);
        assert_eq!(item.updated, 1_521_997_200);
        assert_eq!(item.valid_from, 0);
        assert_eq!(item.valid_to, 1_521_997_300);
    }

    #[test]
    fn test_into_event_without_translation_leaves_english_empty() {
        let item = FeedItem {
            id: "x".to_string(),
            description: "opis".to_string(),
            ..Default::default()
        };
        let event = item.into_event(None, 42);
        assert_eq!(event.description, "opis");
        assert_eq!(event.description_en, "");
        assert_eq!(event.road_en, "");
        assert_eq!(event.ingested_at, 42);
    }
}
