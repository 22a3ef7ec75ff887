use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Links one material to one channel-side product listing.
///
/// `stock` and `price` are mirrors of what the channel was last told;
/// the authoritative values live on the material. `last_sync_at` is set
/// on every successful propagation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelBinding {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub material_id: Uuid,
    pub external_product_id: String,
    pub external_sku: Option<String>,
    pub price: Option<Decimal>,
    pub stock: i64,
    pub active: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChannelBinding {
    pub fn new(channel_id: Uuid, material_id: Uuid, external_product_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            channel_id,
            material_id,
            external_product_id: external_product_id.into(),
            external_sku: None,
            price: None,
            stock: 0,
            active: true,
            last_sync_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
