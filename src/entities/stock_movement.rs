use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Inbound,
    Outbound,
    Transfer,
    Adjustment,
    Production,
    Consumption,
}

impl MovementType {
    /// Movement kinds that add to stock on hand.
    pub fn is_inbound(self) -> bool {
        matches!(self, MovementType::Inbound | MovementType::Production)
    }

    /// Movement kinds that consume stock and require availability.
    pub fn is_outbound(self) -> bool {
        matches!(self, MovementType::Outbound | MovementType::Consumption)
    }
}

/// A single stock ledger entry. `quantity` is always positive; the sign
/// of the stock impact comes from the movement type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: Uuid,
    pub material_id: Uuid,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    pub total_cost: Option<Decimal>,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub operator: Option<String>,
    pub moved_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn new(material_id: Uuid, movement_type: MovementType, quantity: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            material_id,
            movement_type,
            quantity,
            unit_cost: None,
            total_cost: None,
            reference: None,
            description: None,
            operator: None,
            moved_at: now,
            created_at: now,
        }
    }

    /// Signed stock impact: positive for inbound kinds, negative otherwise.
    pub fn effective_quantity(&self) -> Decimal {
        if self.movement_type.is_inbound() {
            self.quantity
        } else {
            -self.quantity
        }
    }
}
