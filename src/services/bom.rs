/*!
 * BOM explosion engine: aggregated and per-occurrence component
 * requirements, cost and operation-time rollups, structure validation,
 * and per-assembly reports.
 *
 * One traversal core drives every explosion view. The walk is preorder
 * with immediate descent: a component is merged every time it is reached,
 * but its own sub-tree is expanded only the first time within a call. The
 * depth cap is a safety valve for malformed graphs, not a cycle detector.
 */

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::entities::{BomEdge, Material};
use crate::errors::{ServiceError, ServiceResult};
use crate::repositories::{BomEdgeRepository, MaterialRepository};

/// Frames deeper than this are not expanded.
const MAX_EXPLOSION_DEPTH: u32 = 10;

/// One occurrence of a component in a detailed explosion. `level` is 0 for
/// the root's direct children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomExplosionLine {
    pub material_id: Uuid,
    pub material_code: String,
    pub required_quantity: Decimal,
    pub available_quantity: Decimal,
    pub shortage: Decimal,
    pub cost: Decimal,
    pub level: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BomReportStatus {
    /// Every direct edge of the assembly is active.
    Active,
    /// At least one direct edge is inactive or expired.
    Partial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomReport {
    pub material_id: Uuid,
    pub material_code: String,
    pub material_name: String,
    pub component_count: usize,
    pub total_cost: Decimal,
    pub total_operation_time: Decimal,
    pub status: BomReportStatus,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone)]
pub struct BomService {
    edges: Arc<dyn BomEdgeRepository>,
    materials: Arc<dyn MaterialRepository>,
}

impl BomService {
    pub fn new(edges: Arc<dyn BomEdgeRepository>, materials: Arc<dyn MaterialRepository>) -> Self {
        Self { edges, materials }
    }

    /// Shared traversal core. Calls `on_edge` once per edge occurrence with
    /// the required quantity at that occurrence and the frame level.
    async fn walk<F>(&self, root: Uuid, quantity: Decimal, mut on_edge: F) -> ServiceResult<()>
    where
        F: FnMut(&BomEdge, Decimal, u32),
    {
        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut stack: Vec<(std::vec::IntoIter<BomEdge>, Decimal, u32)> = Vec::new();

        let root_edges = self.edges.active_edges_for_parent(root).await?;
        stack.push((root_edges.into_iter(), quantity, 0));

        loop {
            let step = match stack.last_mut() {
                Some((iter, parent_quantity, level)) => {
                    let parent_quantity = *parent_quantity;
                    let level = *level;
                    iter.next().map(|edge| (edge, parent_quantity, level))
                }
                None => break,
            };

            match step {
                Some((edge, parent_quantity, level)) => {
                    let required = edge.effective_quantity() * parent_quantity;
                    on_edge(&edge, required, level);

                    // first encounter expands the sub-tree, later ones only merge
                    if visited.insert(edge.child_id) && level + 1 <= MAX_EXPLOSION_DEPTH {
                        let child_edges =
                            self.edges.active_edges_for_parent(edge.child_id).await?;
                        stack.push((child_edges.into_iter(), required, level + 1));
                    }
                }
                None => {
                    stack.pop();
                }
            }
        }
        Ok(())
    }

    /// Aggregated component requirements for building `quantity` of `root`.
    #[instrument(skip(self))]
    pub async fn explode(
        &self,
        root: Uuid,
        quantity: Decimal,
    ) -> ServiceResult<HashMap<Uuid, Decimal>> {
        let mut explosion: HashMap<Uuid, Decimal> = HashMap::new();
        self.walk(root, quantity, |edge, required, _level| {
            *explosion.entry(edge.child_id).or_insert(Decimal::ZERO) += required;
        })
        .await?;
        Ok(explosion)
    }

    /// Scrap-adjusted explosion. Edge quantities already carry their scrap
    /// allowance, so this matches [`BomService::explode`]; the name is kept
    /// as a separate operation for callers that ask for it explicitly.
    pub async fn explode_with_scrap(
        &self,
        root: Uuid,
        quantity: Decimal,
    ) -> ServiceResult<HashMap<Uuid, Decimal>> {
        self.explode(root, quantity).await
    }

    /// Per-occurrence explosion with availability and cost per line. A
    /// shared component appears once per path it is reached through.
    #[instrument(skip(self))]
    pub async fn explode_detailed(
        &self,
        root: Uuid,
        quantity: Decimal,
    ) -> ServiceResult<Vec<BomExplosionLine>> {
        let mut occurrences: Vec<(Uuid, Decimal, u32)> = Vec::new();
        self.walk(root, quantity, |edge, required, level| {
            occurrences.push((edge.child_id, required, level));
        })
        .await?;

        let mut lines = Vec::with_capacity(occurrences.len());
        for (child_id, required, level) in occurrences {
            let Some(material) = self.materials.get(child_id).await? else {
                warn!("Skipping unknown component {} in detailed explosion", child_id);
                continue;
            };
            let shortage = (required - material.current_stock).max(Decimal::ZERO);
            lines.push(BomExplosionLine {
                material_id: material.id,
                material_code: material.code,
                available_quantity: material.current_stock,
                shortage,
                cost: material.average_cost * required,
                required_quantity: required,
                level,
            });
        }
        Ok(lines)
    }

    /// Material cost of one unit of `root`, from the aggregated explosion.
    #[instrument(skip(self))]
    pub async fn cost(&self, root: Uuid) -> ServiceResult<Decimal> {
        let explosion = self.explode(root, Decimal::ONE).await?;
        let mut total = Decimal::ZERO;
        for (child_id, required) in explosion {
            let Some(material) = self.materials.get(child_id).await? else {
                warn!("Skipping unknown component {} in cost rollup", child_id);
                continue;
            };
            total += material.average_cost * required;
        }
        Ok(total)
    }

    pub async fn cost_with_quantity(&self, root: Uuid, quantity: Decimal) -> ServiceResult<Decimal> {
        Ok(self.cost(root).await? * quantity)
    }

    /// Cost per component for building `quantity` of `root`.
    pub async fn component_costs(
        &self,
        root: Uuid,
        quantity: Decimal,
    ) -> ServiceResult<HashMap<Uuid, Decimal>> {
        let explosion = self.explode(root, quantity).await?;
        let mut costs = HashMap::with_capacity(explosion.len());
        for (child_id, required) in explosion {
            let Some(material) = self.materials.get(child_id).await? else {
                warn!("Skipping unknown component {} in cost rollup", child_id);
                continue;
            };
            costs.insert(child_id, material.average_cost * required);
        }
        Ok(costs)
    }

    /// Sum of operation times over the root's direct active edges.
    #[instrument(skip(self))]
    pub async fn total_operation_time(&self, root: Uuid) -> ServiceResult<Decimal> {
        let edges = self.edges.active_edges_for_parent(root).await?;
        Ok(edges.iter().map(|e| e.operation_time).sum())
    }

    pub async fn time_with_quantity(&self, root: Uuid, quantity: Decimal) -> ServiceResult<Decimal> {
        Ok(self.total_operation_time(root).await? * quantity)
    }

    /// Operation time per work center for the root's direct active edges.
    pub async fn work_center_times(
        &self,
        root: Uuid,
        quantity: Decimal,
    ) -> ServiceResult<HashMap<String, Decimal>> {
        let edges = self.edges.active_edges_for_parent(root).await?;
        let mut times: HashMap<String, Decimal> = HashMap::new();
        for edge in edges {
            if let Some(center) = edge.work_center {
                *times.entry(center).or_insert(Decimal::ZERO) += edge.operation_time * quantity;
            }
        }
        Ok(times)
    }

    /// True when `target` is reachable from `root` over active edges. A
    /// material always reaches itself, so `(m, m)` reports true.
    #[instrument(skip(self))]
    pub async fn has_circular_dependency(&self, root: Uuid, target: Uuid) -> ServiceResult<bool> {
        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut pending = vec![root];

        while let Some(current) = pending.pop() {
            if current == target {
                return Ok(true);
            }
            if !visited.insert(current) {
                continue;
            }
            for edge in self.edges.active_edges_for_parent(current).await? {
                pending.push(edge.child_id);
            }
        }
        Ok(false)
    }

    /// Structural problems of the assembly rooted at `root`: cycles back to
    /// the root, dangling child references, non-positive quantities.
    #[instrument(skip(self))]
    pub async fn validation_errors(&self, root: Uuid) -> ServiceResult<Vec<String>> {
        let mut errors = Vec::new();
        let edges = self.edges.active_edges_for_parent(root).await?;

        let mut circular = false;
        for edge in &edges {
            if self.has_circular_dependency(edge.child_id, root).await? {
                circular = true;
                break;
            }
        }
        if circular {
            errors.push("Circular dependency detected".to_string());
        }

        for edge in &edges {
            if self.materials.get(edge.child_id).await?.is_none() {
                errors.push("Missing child material in BOM".to_string());
            }
            if edge.quantity_per_unit <= Decimal::ZERO {
                errors.push("Invalid quantity in BOM".to_string());
            }
        }
        Ok(errors)
    }

    pub async fn validate_structure(&self, root: Uuid) -> ServiceResult<bool> {
        Ok(self.validation_errors(root).await?.is_empty())
    }

    /// Rollup report for one assembly.
    #[instrument(skip(self))]
    pub async fn bom_report(&self, root: Uuid) -> ServiceResult<BomReport> {
        let material = self
            .materials
            .get(root)
            .await?
            .ok_or_else(|| ServiceError::not_found("Material", root))?;
        self.build_report(material).await
    }

    /// Reports for every material that owns at least one active edge.
    pub async fn bom_reports(&self) -> ServiceResult<Vec<BomReport>> {
        let mut reports = Vec::new();
        for parent_id in self.edges.parents_with_active_edges().await? {
            let Some(material) = self.materials.get(parent_id).await? else {
                warn!("Skipping BOM report for unknown material {}", parent_id);
                continue;
            };
            reports.push(self.build_report(material).await?);
        }
        Ok(reports)
    }

    pub async fn bom_reports_by_category(&self, category: &str) -> ServiceResult<Vec<BomReport>> {
        let mut reports = Vec::new();
        for material in self.materials.list_by_category(category).await? {
            if self
                .edges
                .active_edges_for_parent(material.id)
                .await?
                .is_empty()
            {
                continue;
            }
            reports.push(self.build_report(material).await?);
        }
        Ok(reports)
    }

    pub async fn bom_reports_by_work_center(
        &self,
        work_center: &str,
    ) -> ServiceResult<Vec<BomReport>> {
        let edges = self.edges.active_edges_for_work_center(work_center).await?;
        let mut parents: Vec<Uuid> = Vec::new();
        for edge in edges {
            if !parents.contains(&edge.parent_id) {
                parents.push(edge.parent_id);
            }
        }

        let mut reports = Vec::new();
        for parent_id in parents {
            let Some(material) = self.materials.get(parent_id).await? else {
                warn!("Skipping BOM report for unknown material {}", parent_id);
                continue;
            };
            reports.push(self.build_report(material).await?);
        }
        Ok(reports)
    }

    async fn build_report(&self, material: Material) -> ServiceResult<BomReport> {
        let active = self.edges.active_edges_for_parent(material.id).await?;
        let all = self.edges.edges_for_parent(material.id).await?;

        let status = if all.iter().all(|e| e.is_active()) {
            BomReportStatus::Active
        } else {
            BomReportStatus::Partial
        };
        let last_updated = active
            .iter()
            .map(|e| e.updated_at)
            .max()
            .unwrap_or_else(chrono::Utc::now);

        Ok(BomReport {
            component_count: active.len(),
            total_cost: self.cost(material.id).await?,
            total_operation_time: self.total_operation_time(material.id).await?,
            status,
            last_updated,
            material_id: material.id,
            material_code: material.code,
            material_name: material.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EdgeStatus;
    use crate::repositories::{InMemoryBomEdgeRepository, InMemoryMaterialRepository};
    use rust_decimal_macros::dec;

    struct Fixture {
        service: BomService,
        materials: Arc<InMemoryMaterialRepository>,
        edges: Arc<InMemoryBomEdgeRepository>,
    }

    fn fixture() -> Fixture {
        let materials = Arc::new(InMemoryMaterialRepository::new());
        let edges = Arc::new(InMemoryBomEdgeRepository::new());
        let service = BomService::new(edges.clone(), materials.clone());
        Fixture {
            service,
            materials,
            edges,
        }
    }

    async fn add_material(fx: &Fixture, code: &str, stock: Decimal, cost: Decimal) -> Material {
        let mut material = Material::new(code, code, "pcs");
        material.current_stock = stock;
        material.average_cost = cost;
        fx.materials.save(material.clone()).await.unwrap();
        material
    }

    async fn add_edge(fx: &Fixture, parent: Uuid, child: Uuid, qty: Decimal) -> BomEdge {
        let edge = BomEdge::new(parent, child, qty);
        fx.edges.save(edge.clone()).await.unwrap();
        edge
    }

    #[tokio::test]
    async fn explosion_applies_scrap_to_requirements() {
        let fx = fixture();
        let parent = add_material(&fx, "P", dec!(0), dec!(0)).await;
        let child = add_material(&fx, "C", dec!(0), dec!(0)).await;
        let mut edge = BomEdge::new(parent.id, child.id, dec!(2));
        edge.scrap_percentage = dec!(10);
        fx.edges.save(edge).await.unwrap();

        let explosion = fx.service.explode(parent.id, dec!(5)).await.unwrap();
        assert_eq!(explosion[&child.id], dec!(11.0000));

        let with_scrap = fx
            .service
            .explode_with_scrap(parent.id, dec!(5))
            .await
            .unwrap();
        assert_eq!(with_scrap, explosion);
    }

    #[tokio::test]
    async fn shared_component_merges_but_does_not_reexpand() {
        // A -> B -> D -> E and A -> C -> D: D is reached twice, its
        // sub-tree is only expanded under B.
        let fx = fixture();
        let a = add_material(&fx, "A", dec!(0), dec!(0)).await;
        let b = add_material(&fx, "B", dec!(0), dec!(0)).await;
        let c = add_material(&fx, "C", dec!(0), dec!(0)).await;
        let d = add_material(&fx, "D", dec!(0), dec!(0)).await;
        let e = add_material(&fx, "E", dec!(0), dec!(0)).await;
        add_edge(&fx, a.id, b.id, dec!(1)).await;
        add_edge(&fx, a.id, c.id, dec!(1)).await;
        add_edge(&fx, b.id, d.id, dec!(2)).await;
        add_edge(&fx, c.id, d.id, dec!(3)).await;
        add_edge(&fx, d.id, e.id, dec!(1)).await;

        let explosion = fx.service.explode(a.id, dec!(1)).await.unwrap();

        assert_eq!(explosion[&d.id], dec!(5));
        // E only gets the quantity from the first expansion of D
        assert_eq!(explosion[&e.id], dec!(2));
    }

    #[tokio::test]
    async fn two_node_cycle_terminates() {
        let fx = fixture();
        let a = add_material(&fx, "A", dec!(0), dec!(0)).await;
        let b = add_material(&fx, "B", dec!(0), dec!(0)).await;
        add_edge(&fx, a.id, b.id, dec!(1)).await;
        add_edge(&fx, b.id, a.id, dec!(1)).await;

        let explosion = fx.service.explode(a.id, dec!(1)).await.unwrap();

        assert!(explosion.contains_key(&a.id));
        assert!(explosion.contains_key(&b.id));
    }

    #[tokio::test]
    async fn depth_cap_stops_expansion() {
        let fx = fixture();
        let mut chain = Vec::new();
        for i in 0..13 {
            chain.push(add_material(&fx, &format!("M{}", i), dec!(0), dec!(0)).await);
        }
        for pair in chain.windows(2) {
            add_edge(&fx, pair[0].id, pair[1].id, dec!(1)).await;
        }

        let explosion = fx.service.explode(chain[0].id, dec!(1)).await.unwrap();

        assert_eq!(explosion.len(), 11);
        assert!(explosion.contains_key(&chain[11].id));
        assert!(!explosion.contains_key(&chain[12].id));
    }

    #[tokio::test]
    async fn detailed_explosion_reports_levels_and_shortages() {
        let fx = fixture();
        let p = add_material(&fx, "P", dec!(0), dec!(0)).await;
        let c1 = add_material(&fx, "C1", dec!(3), dec!(2)).await;
        let c2 = add_material(&fx, "C2", dec!(100), dec!(1)).await;
        add_edge(&fx, p.id, c1.id, dec!(2)).await;
        add_edge(&fx, c1.id, c2.id, dec!(4)).await;

        let lines = fx.service.explode_detailed(p.id, dec!(5)).await.unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].material_id, c1.id);
        assert_eq!(lines[0].level, 0);
        assert_eq!(lines[0].required_quantity, dec!(10));
        assert_eq!(lines[0].shortage, dec!(7));
        assert_eq!(lines[0].cost, dec!(20));
        assert_eq!(lines[1].material_id, c2.id);
        assert_eq!(lines[1].level, 1);
        assert_eq!(lines[1].required_quantity, dec!(40));
        assert_eq!(lines[1].shortage, dec!(0));
    }

    #[tokio::test]
    async fn cost_rollup_uses_average_costs() {
        let fx = fixture();
        let p = add_material(&fx, "P", dec!(0), dec!(0)).await;
        let c1 = add_material(&fx, "C1", dec!(0), dec!(3)).await;
        let c2 = add_material(&fx, "C2", dec!(0), dec!(0.5)).await;
        add_edge(&fx, p.id, c1.id, dec!(2)).await;
        add_edge(&fx, c1.id, c2.id, dec!(4)).await;

        // one P needs 2 C1 and 8 C2: 2*3 + 8*0.5 = 10
        assert_eq!(fx.service.cost(p.id).await.unwrap(), dec!(10.0));
        assert_eq!(
            fx.service.cost_with_quantity(p.id, dec!(3)).await.unwrap(),
            dec!(30.0)
        );

        let costs = fx.service.component_costs(p.id, dec!(1)).await.unwrap();
        assert_eq!(costs[&c1.id], dec!(6));
        assert_eq!(costs[&c2.id], dec!(4.0));
    }

    #[tokio::test]
    async fn operation_times_cover_direct_edges_only() {
        let fx = fixture();
        let p = add_material(&fx, "P", dec!(0), dec!(0)).await;
        let c1 = add_material(&fx, "C1", dec!(0), dec!(0)).await;
        let c2 = add_material(&fx, "C2", dec!(0), dec!(0)).await;

        let mut press = BomEdge::new(p.id, c1.id, dec!(1));
        press.operation_time = dec!(15);
        press.work_center = Some("WC-PRESS".to_string());
        fx.edges.save(press).await.unwrap();

        let mut weld = BomEdge::new(p.id, c2.id, dec!(1));
        weld.operation_time = dec!(5);
        weld.work_center = Some("WC-WELD".to_string());
        fx.edges.save(weld).await.unwrap();

        // nested edge must not contribute
        let mut deep = BomEdge::new(c1.id, c2.id, dec!(1));
        deep.operation_time = dec!(99);
        fx.edges.save(deep).await.unwrap();

        assert_eq!(fx.service.total_operation_time(p.id).await.unwrap(), dec!(20));
        assert_eq!(
            fx.service.time_with_quantity(p.id, dec!(2)).await.unwrap(),
            dec!(40)
        );

        let times = fx.service.work_center_times(p.id, dec!(2)).await.unwrap();
        assert_eq!(times["WC-PRESS"], dec!(30));
        assert_eq!(times["WC-WELD"], dec!(10));
        assert_eq!(times.len(), 2);
    }

    #[tokio::test]
    async fn self_reference_reports_circular_by_convention() {
        let fx = fixture();
        let p = add_material(&fx, "P", dec!(0), dec!(0)).await;

        assert!(fx
            .service
            .has_circular_dependency(p.id, p.id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn validation_flags_cycles_dangling_children_and_bad_quantities() {
        let fx = fixture();
        let p = add_material(&fx, "P", dec!(0), dec!(0)).await;
        let c = add_material(&fx, "C", dec!(0), dec!(0)).await;
        add_edge(&fx, p.id, c.id, dec!(1)).await;
        add_edge(&fx, c.id, p.id, dec!(1)).await;
        add_edge(&fx, p.id, Uuid::new_v4(), dec!(0)).await;

        let errors = fx.service.validation_errors(p.id).await.unwrap();

        assert_eq!(errors[0], "Circular dependency detected");
        assert!(errors.contains(&"Missing child material in BOM".to_string()));
        assert!(errors.contains(&"Invalid quantity in BOM".to_string()));
        assert!(!fx.service.validate_structure(p.id).await.unwrap());
    }

    #[tokio::test]
    async fn clean_structure_validates() {
        let fx = fixture();
        let p = add_material(&fx, "P", dec!(0), dec!(0)).await;
        let c = add_material(&fx, "C", dec!(0), dec!(0)).await;
        add_edge(&fx, p.id, c.id, dec!(2)).await;

        assert!(fx.service.validate_structure(p.id).await.unwrap());
        assert!(fx.service.validation_errors(p.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn report_marks_partial_when_a_direct_edge_is_inactive() {
        let fx = fixture();
        let p = add_material(&fx, "P", dec!(0), dec!(0)).await;
        let c1 = add_material(&fx, "C1", dec!(0), dec!(4)).await;
        let c2 = add_material(&fx, "C2", dec!(0), dec!(1)).await;
        add_edge(&fx, p.id, c1.id, dec!(2)).await;
        let mut off = BomEdge::new(p.id, c2.id, dec!(1));
        off.status = EdgeStatus::Inactive;
        fx.edges.save(off).await.unwrap();

        let report = fx.service.bom_report(p.id).await.unwrap();

        assert_eq!(report.material_code, "P");
        assert_eq!(report.component_count, 1);
        assert_eq!(report.total_cost, dec!(8));
        assert_eq!(report.status, BomReportStatus::Partial);
    }

    #[tokio::test]
    async fn reports_cover_only_parents_with_active_edges() {
        let fx = fixture();
        let mut p = Material::new("P", "P", "pcs");
        p.category = Some("ASSEMBLY".to_string());
        fx.materials.save(p.clone()).await.unwrap();
        let c = add_material(&fx, "C", dec!(0), dec!(0)).await;
        add_edge(&fx, p.id, c.id, dec!(1)).await;
        // material with no BOM
        add_material(&fx, "LOOSE", dec!(0), dec!(0)).await;

        let all = fx.service.bom_reports().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].material_id, p.id);
        assert_eq!(all[0].status, BomReportStatus::Active);

        let by_category = fx.service.bom_reports_by_category("ASSEMBLY").await.unwrap();
        assert_eq!(by_category.len(), 1);
        assert!(fx
            .service
            .bom_reports_by_category("RAW")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn reports_by_work_center_deduplicate_parents() {
        let fx = fixture();
        let p = add_material(&fx, "P", dec!(0), dec!(0)).await;
        let c1 = add_material(&fx, "C1", dec!(0), dec!(0)).await;
        let c2 = add_material(&fx, "C2", dec!(0), dec!(0)).await;
        for child in [c1.id, c2.id] {
            let mut edge = BomEdge::new(p.id, child, dec!(1));
            edge.work_center = Some("WC-PRESS".to_string());
            fx.edges.save(edge).await.unwrap();
        }

        let reports = fx
            .service
            .bom_reports_by_work_center("WC-PRESS")
            .await
            .unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].component_count, 2);
    }
}
