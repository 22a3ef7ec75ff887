use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeStatus {
    Active,
    Inactive,
}

/// One directed edge of the bill-of-materials graph: producing a unit of
/// the parent consumes `quantity_per_unit` of the child, adjusted upward
/// by `scrap_percentage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomEdge {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub child_id: Uuid,
    pub quantity_per_unit: Decimal,
    pub unit_cost: Option<Decimal>,
    pub total_cost: Option<Decimal>,
    /// Percent of extra input lost to scrap, 0 when none.
    pub scrap_percentage: Decimal,
    pub operation: Option<String>,
    pub work_center: Option<String>,
    /// Minutes spent at this edge's operation per unit of the parent.
    pub operation_time: Decimal,
    pub status: EdgeStatus,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BomEdge {
    pub fn new(parent_id: Uuid, child_id: Uuid, quantity_per_unit: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            parent_id,
            child_id,
            quantity_per_unit,
            unit_cost: None,
            total_cost: None,
            scrap_percentage: Decimal::ZERO,
            operation: None,
            work_center: None,
            operation_time: Decimal::ZERO,
            status: EdgeStatus::Active,
            effective_from: now,
            effective_to: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Active status plus an effectivity window that has not closed.
    pub fn is_active(&self) -> bool {
        self.status == EdgeStatus::Active
            && self.effective_to.map_or(true, |until| until > Utc::now())
    }

    /// Quantity per unit inflated by the scrap allowance.
    pub fn effective_quantity(&self) -> Decimal {
        if self.scrap_percentage > Decimal::ZERO {
            self.quantity_per_unit * (Decimal::ONE + self.scrap_percentage / dec!(100))
        } else {
            self.quantity_per_unit
        }
    }
}
