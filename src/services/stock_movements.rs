/*!
 * Stock movement ledger.
 *
 * Every change to a material's stock on hand goes through
 * [`StockMovementService::record_movement`], which validates the movement,
 * applies the signed quantity to the material and appends the ledger entry.
 * Inbound receipts with a unit cost fold into the material's average cost.
 * A movement is corrected by recording its reversal, never by editing it.
 */

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::{Material, MovementType, StockMovement};
use crate::errors::{ServiceError, ServiceResult};
use crate::events::{Event, EventSender};
use crate::repositories::{MaterialRepository, StockMovementRepository};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMovementRequest {
    pub material_id: Uuid,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub operator: Option<String>,
}

impl RecordMovementRequest {
    pub fn new(material_id: Uuid, movement_type: MovementType, quantity: Decimal) -> Self {
        Self {
            material_id,
            movement_type,
            quantity,
            unit_cost: None,
            reference: None,
            description: None,
            operator: None,
        }
    }
}

/// Inbound/outbound totals for one material's ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockSummary {
    pub material_id: Uuid,
    pub total_inbound: Decimal,
    pub total_outbound: Decimal,
    pub current_stock: Decimal,
    pub total_value: Decimal,
}

#[derive(Clone)]
pub struct StockMovementService {
    movements: Arc<dyn StockMovementRepository>,
    materials: Arc<dyn MaterialRepository>,
    event_sender: Option<Arc<EventSender>>,
}

impl StockMovementService {
    pub fn new(
        movements: Arc<dyn StockMovementRepository>,
        materials: Arc<dyn MaterialRepository>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            movements,
            materials,
            event_sender,
        }
    }

    /// Validates and applies one movement, then appends it to the ledger.
    ///
    /// Outbound and consumption movements are refused when they would take
    /// the stock below zero. Inbound kinds carrying a unit cost rebase
    /// the material's average cost on (old stock at old average) plus
    /// (moved quantity at unit cost).
    #[instrument(skip(self, request), fields(material_id = %request.material_id, movement_type = %request.movement_type))]
    pub async fn record_movement(
        &self,
        request: RecordMovementRequest,
    ) -> ServiceResult<StockMovement> {
        if request.quantity <= Decimal::ZERO {
            return Err(ServiceError::validation("Movement quantity must be positive"));
        }
        let mut material = self
            .materials
            .get(request.material_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Material", request.material_id))?;

        if request.movement_type.is_outbound() && material.current_stock < request.quantity {
            return Err(ServiceError::insufficient_stock(
                &material.code,
                request.quantity,
            ));
        }

        let mut movement =
            StockMovement::new(request.material_id, request.movement_type, request.quantity);
        movement.unit_cost = request.unit_cost;
        movement.total_cost = request.unit_cost.map(|cost| cost * request.quantity);
        movement.reference = request.reference;
        movement.description = request.description;
        movement.operator = request.operator;

        if movement.movement_type.is_inbound() {
            if let Some(unit_cost) = movement.unit_cost {
                apply_average_cost(&mut material, movement.quantity, unit_cost);
            }
        }
        material.current_stock += movement.effective_quantity();
        material.updated_at = Utc::now();

        let material = self.materials.save(material).await?;
        let movement = self.movements.save(movement).await?;

        info!(
            "Recorded {} of {} for {} (stock now {})",
            movement.movement_type, movement.quantity, material.code, material.current_stock
        );

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::MovementRecorded {
                    movement_id: movement.id,
                    material_id: material.id,
                    movement_type: movement.movement_type,
                })
                .await;
            if material.is_low_stock() {
                sender
                    .send_or_log(Event::LowStockDetected {
                        material_id: material.id,
                        current_stock: material.current_stock,
                        minimum_stock: material.minimum_stock,
                    })
                    .await;
            }
        }

        Ok(movement)
    }

    /// Records the opposite movement for an existing ledger entry. Inbound
    /// kinds reverse as OUTBOUND, everything else as INBOUND; the new entry
    /// carries a "REV-" reference back to the original.
    #[instrument(skip(self))]
    pub async fn reverse_movement(
        &self,
        movement_id: Uuid,
        reason: Option<String>,
    ) -> ServiceResult<StockMovement> {
        let original = self
            .movements
            .get(movement_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Stock movement", movement_id))?;

        let movement_type = if original.movement_type.is_inbound() {
            MovementType::Outbound
        } else {
            MovementType::Inbound
        };
        let reference = match &original.reference {
            Some(reference) => format!("REV-{}", reference),
            None => format!("REV-{}", original.id),
        };
        let description = match reason {
            Some(reason) => format!("Reversal: {}", reason),
            None => "Reversal".to_string(),
        };

        let mut request =
            RecordMovementRequest::new(original.material_id, movement_type, original.quantity);
        request.unit_cost = original.unit_cost;
        request.reference = Some(reference);
        request.description = Some(description);
        self.record_movement(request).await
    }

    pub async fn get_movement(&self, movement_id: Uuid) -> ServiceResult<StockMovement> {
        self.movements
            .get(movement_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Stock movement", movement_id))
    }

    /// Ledger for one material, newest first.
    pub async fn movements_for_material(
        &self,
        material_id: Uuid,
    ) -> ServiceResult<Vec<StockMovement>> {
        self.movements.for_material(material_id).await
    }

    /// Totals over the material's full ledger.
    pub async fn stock_summary(&self, material_id: Uuid) -> ServiceResult<StockSummary> {
        let material = self
            .materials
            .get(material_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Material", material_id))?;
        let movements = self.movements.for_material(material_id).await?;

        let total_inbound: Decimal = movements
            .iter()
            .filter(|m| m.movement_type.is_inbound())
            .map(|m| m.quantity)
            .sum();
        let total_outbound: Decimal = movements
            .iter()
            .filter(|m| m.movement_type.is_outbound())
            .map(|m| m.quantity)
            .sum();
        let total_value: Decimal = movements.iter().filter_map(|m| m.total_cost).sum();

        Ok(StockSummary {
            material_id,
            total_inbound,
            total_outbound,
            current_stock: material.current_stock,
            total_value,
        })
    }
}

/// Weighted average of the stock on hand and the incoming lot, 4 decimal
/// places, half-up.
fn apply_average_cost(material: &mut Material, quantity: Decimal, unit_cost: Decimal) {
    let total_quantity = material.current_stock + quantity;
    if total_quantity <= Decimal::ZERO {
        return;
    }
    let current_value = material.current_stock * material.average_cost;
    let incoming_value = quantity * unit_cost;
    material.average_cost = ((current_value + incoming_value) / total_quantity)
        .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero);
}
