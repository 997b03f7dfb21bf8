use serde::{Deserialize, Serialize};

/// A traffic event as stored in the event table.
///
/// The upstream identifier is unique; once stored a row is never updated.
/// Timestamps are epoch seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TrafficEvent {
    pub id: String,
    pub y_wgs: f64,
    pub x_wgs: f64,
    pub category: String,
    pub description: String,
    pub description_en: String,
    pub road: String,
    pub road_en: String,
    pub cause: String,
    pub cause_en: String,
    pub priority: i32,
    pub road_priority: i32,
    pub is_border_crossing: bool,
    /// Last upstream modification.
    pub updated: i64,
    pub valid_from: i64,
    pub valid_to: i64,
    /// When this process first stored the event.
    pub ingested_at: i64,
}

impl TrafficEvent {
    /// Stable 32-bit hash of the upstream identifier, used on every outbound surface.
    pub fn id_hash(&self) -> u32 {
        id_hash(&self.id)
    }
}

/// A registered device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeviceToken {
    pub id: i64,
    pub token: String,
    pub registered_at: i64,
    pub user_agent: String,
}

/// Fields needed to register a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeviceToken {
    pub token: String,
    pub registered_at: i64,
    pub user_agent: String,
}

impl NewDeviceToken {
    pub fn new(token: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            registered_at: chrono::Utc::now().timestamp(),
            user_agent: user_agent.into(),
        }
    }
}

const FNV32_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV32_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a over the identifier bytes.
///
/// Collisions are possible and accepted; clients only use the value to
/// recognise an event they have already shown.
pub fn id_hash(id: &str) -> u32 {
    id.bytes().fold(FNV32_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV32_PRIME)
    })
}
