use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Lifecycle status of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterialStatus {
    Active,
    Inactive,
}

/// A material card: the single authoritative stock record for one item.
///
/// `current_stock` is the system-of-record quantity; per-channel stock
/// mirrors live on [`crate::entities::ChannelBinding`] and are derived
/// from this value by propagation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub unit: String,
    pub current_stock: Decimal,
    pub minimum_stock: Decimal,
    pub maximum_stock: Decimal,
    pub standard_cost: Decimal,
    pub average_cost: Decimal,
    pub last_purchase_cost: Decimal,
    pub supplier_code: Option<String>,
    pub storage_location: Option<String>,
    pub category: Option<String>,
    pub status: MaterialStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Material {
    /// Creates a material with zeroed stock and cost figures.
    pub fn new(code: impl Into<String>, name: impl Into<String>, unit: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            name: name.into(),
            unit: unit.into(),
            current_stock: Decimal::ZERO,
            minimum_stock: Decimal::ZERO,
            maximum_stock: Decimal::ZERO,
            standard_cost: Decimal::ZERO,
            average_cost: Decimal::ZERO,
            last_purchase_cost: Decimal::ZERO,
            supplier_code: None,
            storage_location: None,
            category: None,
            status: MaterialStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MaterialStatus::Active
    }

    /// Current stock has fallen below the minimum threshold.
    pub fn is_low_stock(&self) -> bool {
        self.current_stock < self.minimum_stock
    }

    /// Current stock exceeds a configured (non-zero) maximum.
    pub fn is_over_stock(&self) -> bool {
        self.maximum_stock > Decimal::ZERO && self.current_stock > self.maximum_stock
    }

    /// Value of the stock on hand at average cost.
    pub fn stock_value(&self) -> Decimal {
        self.current_stock * self.average_cost
    }
}
