/*!
 * Available-to-promise calculation and stock constraint analysis.
 *
 * Plain ATP answers against a material's own stock; BOM-aware ATP explodes
 * the assembly and promises only what the most constrained component
 * supports. Constraint analysis aggregates shortages across materials and
 * ranks them by priority. The read-only report helpers feed dashboards and
 * the replenishment recommendations.
 */

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::entities::Material;
use crate::errors::{ServiceError, ServiceResult};
use crate::repositories::{BindingRepository, ChannelRepository, MaterialRepository};
use crate::services::bom::BomService;
use crate::services::distribution::{split_absolute, BindingShare};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintType {
    InsufficientStock,
    BomConstraint,
    MinimumStock,
}

/// A single shortage found during an ATP check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockConstraint {
    pub material_id: Uuid,
    pub material_code: String,
    pub requested_quantity: Decimal,
    pub available_quantity: Decimal,
    pub shortage: Decimal,
    pub constraint_type: ConstraintType,
    pub message: String,
    pub priority: u8,
    pub average_cost: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtpResult {
    pub material_id: Uuid,
    pub material_code: String,
    pub requested_quantity: Decimal,
    pub available_quantity: Decimal,
    pub atp_quantity: Decimal,
    pub available: bool,
    pub constraints: Vec<StockConstraint>,
    pub cost: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockConstraintAnalysis {
    pub constraints: Vec<StockConstraint>,
    pub total_constraints: usize,
    pub critical_constraints: usize,
    pub warning_constraints: usize,
    pub total_shortage: Decimal,
    pub total_cost: Decimal,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockStatus {
    LowStock,
    OverStock,
    Normal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtpReport {
    pub material_id: Uuid,
    pub material_code: String,
    pub material_name: String,
    pub current_stock: Decimal,
    pub minimum_stock: Decimal,
    pub maximum_stock: Decimal,
    pub atp_quantity: Decimal,
    pub stock_value: Decimal,
    pub stock_status: StockStatus,
    pub channel_ids: Vec<Uuid>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationKind {
    IncreaseStock,
    DecreaseStock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockRecommendation {
    pub material_id: Uuid,
    pub material_code: String,
    pub current_stock: Decimal,
    pub recommended_stock: Decimal,
    pub stock_difference: Decimal,
    pub kind: RecommendationKind,
    pub reason: String,
    pub estimated_cost: Decimal,
    pub priority: u8,
}

#[derive(Clone)]
pub struct AtpService {
    materials: Arc<dyn MaterialRepository>,
    bindings: Arc<dyn BindingRepository>,
    channels: Arc<dyn ChannelRepository>,
    bom: BomService,
}

impl AtpService {
    pub fn new(
        materials: Arc<dyn MaterialRepository>,
        bindings: Arc<dyn BindingRepository>,
        channels: Arc<dyn ChannelRepository>,
        bom: BomService,
    ) -> Self {
        Self {
            materials,
            bindings,
            channels,
            bom,
        }
    }

    async fn require_material(&self, material_id: Uuid) -> ServiceResult<Material> {
        self.materials
            .get(material_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Material", material_id))
    }

    /// ATP against the material's own stock only.
    #[instrument(skip(self))]
    pub async fn calculate_atp(
        &self,
        material_id: Uuid,
        requested: Decimal,
    ) -> ServiceResult<AtpResult> {
        let material = self.require_material(material_id).await?;
        let available = material.current_stock;
        let atp = available.min(requested);
        let is_available = atp >= requested;

        let mut constraints = Vec::new();
        if !is_available {
            constraints.push(insufficient_stock_constraint(&material, requested));
        }

        Ok(AtpResult {
            material_id: material.id,
            material_code: material.code.clone(),
            requested_quantity: requested,
            available_quantity: available,
            atp_quantity: atp,
            available: is_available,
            constraints,
            cost: material.average_cost * atp,
        })
    }

    /// ATP limited by the most constrained BOM component. A material
    /// without a BOM promises the full requested quantity.
    #[instrument(skip(self))]
    pub async fn calculate_atp_with_bom(
        &self,
        material_id: Uuid,
        requested: Decimal,
    ) -> ServiceResult<AtpResult> {
        let material = self.require_material(material_id).await?;
        let explosion = self.bom.explode(material.id, requested).await?;

        let mut min_ratio = Decimal::ONE;
        let mut constraints = Vec::new();
        for (component_id, required) in explosion {
            let Some(component) = self.materials.get(component_id).await? else {
                warn!("Skipping unknown component {} in ATP check", component_id);
                continue;
            };
            let available = component.current_stock;
            if available < required {
                let ratio = (available / required)
                    .round_dp_with_strategy(4, RoundingStrategy::ToZero);
                if ratio < min_ratio {
                    min_ratio = ratio;
                }
                constraints.push(StockConstraint {
                    material_id: component.id,
                    material_code: component.code.clone(),
                    requested_quantity: required,
                    available_quantity: available,
                    shortage: required - available,
                    constraint_type: ConstraintType::BomConstraint,
                    message: format!("BOM constraint: {}", component.code),
                    priority: 1,
                    average_cost: component.average_cost,
                });
            }
        }

        let atp = requested * min_ratio;
        Ok(AtpResult {
            material_id: material.id,
            material_code: material.code.clone(),
            requested_quantity: requested,
            available_quantity: material.current_stock,
            atp_quantity: atp,
            available: min_ratio >= Decimal::ONE,
            constraints,
            cost: self.bom.cost_with_quantity(material.id, atp).await?,
        })
    }

    /// BOM-aware ATP for a batch of (material, quantity) requests.
    pub async fn calculate_atp_for_materials(
        &self,
        requests: &[(Uuid, Decimal)],
    ) -> ServiceResult<HashMap<Uuid, AtpResult>> {
        let mut results = HashMap::with_capacity(requests.len());
        for &(material_id, quantity) in requests {
            let result = self.calculate_atp_with_bom(material_id, quantity).await?;
            results.insert(material_id, result);
        }
        Ok(results)
    }

    /// Direct constraints of one material at a requested quantity.
    #[instrument(skip(self))]
    pub async fn find_stock_constraints(
        &self,
        material_id: Uuid,
        requested: Decimal,
    ) -> ServiceResult<Vec<StockConstraint>> {
        let material = self.require_material(material_id).await?;
        Ok(direct_constraints(&material, requested))
    }

    /// Constraints of every BOM component at its exploded quantity.
    pub async fn find_stock_constraints_with_bom(
        &self,
        material_id: Uuid,
        requested: Decimal,
    ) -> ServiceResult<Vec<StockConstraint>> {
        let explosion = self.bom.explode(material_id, requested).await?;
        let mut constraints = Vec::new();
        for (component_id, required) in explosion {
            let Some(component) = self.materials.get(component_id).await? else {
                warn!(
                    "Skipping unknown component {} in constraint check",
                    component_id
                );
                continue;
            };
            constraints.extend(direct_constraints(&component, required));
        }
        Ok(constraints)
    }

    /// Aggregated shortage picture across several requests, critical
    /// constraints first.
    #[instrument(skip(self, requests))]
    pub async fn analyze_stock_constraints(
        &self,
        requests: &[(Uuid, Decimal)],
    ) -> ServiceResult<StockConstraintAnalysis> {
        let mut constraints = Vec::new();
        for &(material_id, quantity) in requests {
            constraints
                .extend(self.find_stock_constraints_with_bom(material_id, quantity).await?);
        }
        constraints.sort_by_key(|c| c.priority);

        let total_constraints = constraints.len();
        let critical_constraints = constraints.iter().filter(|c| c.priority == 1).count();
        let warning_constraints = constraints.iter().filter(|c| c.priority == 2).count();
        let total_shortage: Decimal = constraints.iter().map(|c| c.shortage).sum();
        let total_cost: Decimal = constraints
            .iter()
            .map(|c| c.average_cost * c.shortage)
            .sum();

        let summary = format!(
            "Found {} constraint(s): {} critical, {} warning. Total shortage: {}, estimated cost: {}",
            total_constraints, critical_constraints, warning_constraints, total_shortage, total_cost
        );

        Ok(StockConstraintAnalysis {
            constraints,
            total_constraints,
            critical_constraints,
            warning_constraints,
            total_shortage,
            total_cost,
            summary,
        })
    }

    /// Absolute view of how `total` units would spread across the
    /// material's channels, by channel id.
    #[instrument(skip(self))]
    pub async fn stock_distribution(
        &self,
        material_id: Uuid,
        total: Decimal,
    ) -> ServiceResult<HashMap<Uuid, Decimal>> {
        let bindings = self.bindings.bindings_for_material(material_id).await?;

        let mut shares = Vec::with_capacity(bindings.len());
        let mut channel_of: HashMap<Uuid, Uuid> = HashMap::with_capacity(bindings.len());
        for binding in &bindings {
            let Some(channel) = self.channels.get(binding.channel_id).await? else {
                warn!("Skipping binding {} with unknown channel", binding.id);
                continue;
            };
            channel_of.insert(binding.id, channel.id);
            shares.push(BindingShare {
                binding_id: binding.id,
                ratio: channel.distribution_ratio,
                active: binding.active,
            });
        }

        let mut distribution = HashMap::new();
        for portion in split_absolute(total, &shares) {
            if let Some(channel_id) = channel_of.get(&portion.binding_id) {
                distribution.insert(*channel_id, portion.quantity);
            }
        }
        Ok(distribution)
    }

    /// Stock position report for one material.
    #[instrument(skip(self))]
    pub async fn atp_report(&self, material_id: Uuid) -> ServiceResult<AtpReport> {
        let material = self.require_material(material_id).await?;
        self.build_report(material).await
    }

    pub async fn atp_reports(&self) -> ServiceResult<Vec<AtpReport>> {
        let mut reports = Vec::new();
        for material in self.materials.list().await? {
            reports.push(self.build_report(material).await?);
        }
        Ok(reports)
    }

    pub async fn atp_reports_by_category(&self, category: &str) -> ServiceResult<Vec<AtpReport>> {
        let mut reports = Vec::new();
        for material in self.materials.list_by_category(category).await? {
            reports.push(self.build_report(material).await?);
        }
        Ok(reports)
    }

    /// Reports for every material bound to a channel; an unknown channel
    /// yields an empty list.
    pub async fn atp_reports_by_channel(&self, channel_id: Uuid) -> ServiceResult<Vec<AtpReport>> {
        if self.channels.get(channel_id).await?.is_none() {
            return Ok(Vec::new());
        }

        let mut reports = Vec::new();
        for binding in self.bindings.bindings_for_channel(channel_id).await? {
            let Some(material) = self.materials.get(binding.material_id).await? else {
                warn!("Skipping binding {} with unknown material", binding.id);
                continue;
            };
            reports.push(self.build_report(material).await?);
        }
        Ok(reports)
    }

    /// Replenishment suggestions for every material that needs one.
    #[instrument(skip(self))]
    pub async fn stock_recommendations(&self) -> ServiceResult<Vec<StockRecommendation>> {
        let mut recommendations = Vec::new();
        for material in self.materials.list().await? {
            if let Some(recommendation) = build_recommendation(&material) {
                recommendations.push(recommendation);
            }
        }
        Ok(recommendations)
    }

    pub async fn stock_recommendations_by_category(
        &self,
        category: &str,
    ) -> ServiceResult<Vec<StockRecommendation>> {
        let mut recommendations = Vec::new();
        for material in self.materials.list_by_category(category).await? {
            if let Some(recommendation) = build_recommendation(&material) {
                recommendations.push(recommendation);
            }
        }
        Ok(recommendations)
    }

    async fn build_report(&self, material: Material) -> ServiceResult<AtpReport> {
        let stock_status = if material.is_low_stock() {
            StockStatus::LowStock
        } else if material.is_over_stock() {
            StockStatus::OverStock
        } else {
            StockStatus::Normal
        };

        let channel_ids = self
            .bindings
            .bindings_for_material(material.id)
            .await?
            .iter()
            .map(|b| b.channel_id)
            .collect();

        Ok(AtpReport {
            atp_quantity: (material.current_stock - material.minimum_stock).max(Decimal::ZERO),
            stock_value: material.stock_value(),
            stock_status,
            channel_ids,
            generated_at: Utc::now(),
            material_id: material.id,
            material_code: material.code,
            material_name: material.name,
            current_stock: material.current_stock,
            minimum_stock: material.minimum_stock,
            maximum_stock: material.maximum_stock,
        })
    }
}

fn insufficient_stock_constraint(material: &Material, requested: Decimal) -> StockConstraint {
    StockConstraint {
        material_id: material.id,
        material_code: material.code.clone(),
        requested_quantity: requested,
        available_quantity: material.current_stock,
        shortage: requested - material.current_stock,
        constraint_type: ConstraintType::InsufficientStock,
        message: "Insufficient stock".to_string(),
        priority: 1,
        average_cost: material.average_cost,
    }
}

fn direct_constraints(material: &Material, requested: Decimal) -> Vec<StockConstraint> {
    let mut constraints = Vec::new();

    if material.current_stock < requested {
        constraints.push(insufficient_stock_constraint(material, requested));
    }

    let remaining = material.current_stock - requested;
    if remaining < material.minimum_stock {
        constraints.push(StockConstraint {
            material_id: material.id,
            material_code: material.code.clone(),
            requested_quantity: requested,
            available_quantity: material.current_stock,
            shortage: material.minimum_stock - remaining,
            constraint_type: ConstraintType::MinimumStock,
            message: "Falls below minimum stock level".to_string(),
            priority: 2,
            average_cost: material.average_cost,
        });
    }

    constraints
}

fn build_recommendation(material: &Material) -> Option<StockRecommendation> {
    if material.is_low_stock() {
        let recommended = material.minimum_stock * Decimal::new(15, 1);
        let difference = recommended - material.current_stock;
        return Some(StockRecommendation {
            material_id: material.id,
            material_code: material.code.clone(),
            current_stock: material.current_stock,
            recommended_stock: recommended,
            stock_difference: difference,
            kind: RecommendationKind::IncreaseStock,
            reason: "Stock below minimum level".to_string(),
            estimated_cost: difference * material.average_cost,
            priority: 1,
        });
    }

    if material.is_over_stock() {
        let difference = material.current_stock - material.maximum_stock;
        return Some(StockRecommendation {
            material_id: material.id,
            material_code: material.code.clone(),
            current_stock: material.current_stock,
            recommended_stock: material.maximum_stock,
            stock_difference: difference,
            kind: RecommendationKind::DecreaseStock,
            reason: "Stock above maximum level".to_string(),
            estimated_cost: difference * material.average_cost,
            priority: 2,
        });
    }

    None
}
