use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Credential kind every remote update requires before dispatch.
pub const API_KEY_CREDENTIAL: &str = "API_KEY";

/// An opaque credential attached to a channel. Encryption at rest is the
/// credential store's concern; the core only checks presence and passes
/// the value through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelCredential {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub kind: String,
    pub value: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChannelCredential {
    pub fn new(channel_id: Uuid, kind: impl Into<String>, value: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            channel_id,
            kind: kind.into(),
            value: value.into(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
