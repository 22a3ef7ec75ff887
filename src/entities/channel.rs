use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Closed set of supported external channel kinds. Client dispatch keys
/// off this tag; unknown kinds fall back to the default client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelType {
    Shopify,
    Ebay,
    Amazon,
    Woocommerce,
    Magento,
    Custom,
}

/// An external sales channel a material can be exposed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub channel_type: ChannelType,
    pub description: Option<String>,
    pub base_url: Option<String>,
    pub webhook_url: Option<String>,
    pub active: bool,
    /// 0-100 weight for stock distribution; `None` (or all-zero across
    /// a material's bindings) means equal share.
    pub distribution_ratio: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Channel {
    pub fn new(
        name: impl Into<String>,
        code: impl Into<String>,
        channel_type: ChannelType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            code: code.into(),
            channel_type,
            description: None,
            base_url: None,
            webhook_url: None,
            active: true,
            distribution_ratio: None,
            created_at: now,
            updated_at: now,
        }
    }
}
