use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncAction {
    StockUpdate,
    PriceUpdate,
    FullSync,
    ChannelSync,
    MaterialSync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Success,
    Failure,
}

/// Append-only audit entry, one per propagation attempt outcome.
/// Records are never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRecord {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub material_id: Option<Uuid>,
    pub binding_id: Option<Uuid>,
    pub action: SyncAction,
    pub status: SyncStatus,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SyncRecord {
    pub fn new(
        channel_id: Uuid,
        material_id: Option<Uuid>,
        binding_id: Option<Uuid>,
        action: SyncAction,
        status: SyncStatus,
        detail: impl Into<Option<String>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel_id,
            material_id,
            binding_id,
            action,
            status,
            detail: detail.into(),
            created_at: Utc::now(),
        }
    }
}
