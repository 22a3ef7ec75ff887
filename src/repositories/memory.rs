/*!
 * In-memory store implementations backing the demo binary and tests.
 *
 * Keyed lookups live in `DashMap`s; stores whose iteration order carries
 * meaning (BOM edges, bindings, journals) keep a `Vec` under an async
 * `RwLock` so reads see entries in creation order.
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::entities::{
    BomEdge, Channel, ChannelBinding, ChannelCredential, Material, StockMovement, SyncRecord,
};
use crate::errors::{ServiceError, ServiceResult};
use crate::repositories::{
    BindingRepository, BomEdgeRepository, ChannelRepository, CredentialStore, MaterialRepository,
    StockMovementRepository, SyncRecordRepository,
};

#[derive(Debug, Default)]
pub struct InMemoryMaterialRepository {
    items: DashMap<Uuid, Material>,
}

impl InMemoryMaterialRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MaterialRepository for InMemoryMaterialRepository {
    async fn get(&self, id: Uuid) -> ServiceResult<Option<Material>> {
        Ok(self.items.get(&id).map(|e| e.value().clone()))
    }

    async fn get_by_code(&self, code: &str) -> ServiceResult<Option<Material>> {
        Ok(self
            .items
            .iter()
            .find(|e| e.value().code == code)
            .map(|e| e.value().clone()))
    }

    async fn list(&self) -> ServiceResult<Vec<Material>> {
        let mut materials: Vec<Material> =
            self.items.iter().map(|e| e.value().clone()).collect();
        materials.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(materials)
    }

    async fn list_by_category(&self, category: &str) -> ServiceResult<Vec<Material>> {
        let mut materials: Vec<Material> = self
            .items
            .iter()
            .filter(|e| e.value().category.as_deref() == Some(category))
            .map(|e| e.value().clone())
            .collect();
        materials.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(materials)
    }

    async fn save(&self, material: Material) -> ServiceResult<Material> {
        self.items.insert(material.id, material.clone());
        Ok(material)
    }

    async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        self.items
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ServiceError::not_found("Material", id))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBomEdgeRepository {
    items: RwLock<Vec<BomEdge>>,
}

impl InMemoryBomEdgeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BomEdgeRepository for InMemoryBomEdgeRepository {
    async fn get(&self, id: Uuid) -> ServiceResult<Option<BomEdge>> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .find(|e| e.id == id)
            .cloned())
    }

    async fn edges_for_parent(&self, parent_id: Uuid) -> ServiceResult<Vec<BomEdge>> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .filter(|e| e.parent_id == parent_id)
            .cloned()
            .collect())
    }

    async fn active_edges_for_parent(&self, parent_id: Uuid) -> ServiceResult<Vec<BomEdge>> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .filter(|e| e.parent_id == parent_id && e.is_active())
            .cloned()
            .collect())
    }

    async fn active_edges_for_work_center(
        &self,
        work_center: &str,
    ) -> ServiceResult<Vec<BomEdge>> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .filter(|e| e.work_center.as_deref() == Some(work_center) && e.is_active())
            .cloned()
            .collect())
    }

    async fn parents_with_active_edges(&self) -> ServiceResult<Vec<Uuid>> {
        let items = self.items.read().await;
        let mut parents = Vec::new();
        for edge in items.iter().filter(|e| e.is_active()) {
            if !parents.contains(&edge.parent_id) {
                parents.push(edge.parent_id);
            }
        }
        Ok(parents)
    }

    async fn save(&self, edge: BomEdge) -> ServiceResult<BomEdge> {
        let mut items = self.items.write().await;
        match items.iter_mut().find(|e| e.id == edge.id) {
            Some(existing) => *existing = edge.clone(),
            None => items.push(edge.clone()),
        }
        Ok(edge)
    }

    async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|e| e.id != id);
        if items.len() == before {
            return Err(ServiceError::not_found("BOM edge", id));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryChannelRepository {
    items: DashMap<Uuid, Channel>,
}

impl InMemoryChannelRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChannelRepository for InMemoryChannelRepository {
    async fn get(&self, id: Uuid) -> ServiceResult<Option<Channel>> {
        Ok(self.items.get(&id).map(|e| e.value().clone()))
    }

    async fn get_by_code(&self, code: &str) -> ServiceResult<Option<Channel>> {
        Ok(self
            .items
            .iter()
            .find(|e| e.value().code == code)
            .map(|e| e.value().clone()))
    }

    async fn get_by_name(&self, name: &str) -> ServiceResult<Option<Channel>> {
        Ok(self
            .items
            .iter()
            .find(|e| e.value().name == name)
            .map(|e| e.value().clone()))
    }

    async fn list(&self) -> ServiceResult<Vec<Channel>> {
        let mut channels: Vec<Channel> = self.items.iter().map(|e| e.value().clone()).collect();
        channels.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(channels)
    }

    async fn list_active(&self) -> ServiceResult<Vec<Channel>> {
        let mut channels: Vec<Channel> = self
            .items
            .iter()
            .filter(|e| e.value().active)
            .map(|e| e.value().clone())
            .collect();
        channels.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(channels)
    }

    async fn save(&self, channel: Channel) -> ServiceResult<Channel> {
        self.items.insert(channel.id, channel.clone());
        Ok(channel)
    }

    async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        self.items
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ServiceError::not_found("Channel", id))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBindingRepository {
    items: RwLock<Vec<ChannelBinding>>,
}

impl InMemoryBindingRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BindingRepository for InMemoryBindingRepository {
    async fn get(&self, id: Uuid) -> ServiceResult<Option<ChannelBinding>> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .find(|b| b.id == id)
            .cloned())
    }

    async fn bindings_for_material(
        &self,
        material_id: Uuid,
    ) -> ServiceResult<Vec<ChannelBinding>> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .filter(|b| b.material_id == material_id)
            .cloned()
            .collect())
    }

    async fn bindings_for_channel(&self, channel_id: Uuid) -> ServiceResult<Vec<ChannelBinding>> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .filter(|b| b.channel_id == channel_id)
            .cloned()
            .collect())
    }

    async fn find_by_channel_and_material(
        &self,
        channel_id: Uuid,
        material_id: Uuid,
    ) -> ServiceResult<Option<ChannelBinding>> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .find(|b| b.channel_id == channel_id && b.material_id == material_id)
            .cloned())
    }

    async fn save(&self, binding: ChannelBinding) -> ServiceResult<ChannelBinding> {
        let mut items = self.items.write().await;
        match items.iter_mut().find(|b| b.id == binding.id) {
            Some(existing) => *existing = binding.clone(),
            None => items.push(binding.clone()),
        }
        Ok(binding)
    }

    async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|b| b.id != id);
        if items.len() == before {
            return Err(ServiceError::not_found("Channel binding", id));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    items: DashMap<Uuid, ChannelCredential>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get_active(
        &self,
        channel_id: Uuid,
        kind: &str,
    ) -> ServiceResult<Option<ChannelCredential>> {
        Ok(self
            .items
            .iter()
            .find(|e| {
                let c = e.value();
                c.channel_id == channel_id && c.kind == kind && c.active
            })
            .map(|e| e.value().clone()))
    }

    async fn find(&self, channel_id: Uuid) -> ServiceResult<Vec<ChannelCredential>> {
        let mut credentials: Vec<ChannelCredential> = self
            .items
            .iter()
            .filter(|e| e.value().channel_id == channel_id)
            .map(|e| e.value().clone())
            .collect();
        credentials.sort_by(|a, b| a.kind.cmp(&b.kind));
        Ok(credentials)
    }

    async fn save(&self, credential: ChannelCredential) -> ServiceResult<ChannelCredential> {
        self.items.insert(credential.id, credential.clone());
        Ok(credential)
    }

    async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        self.items
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ServiceError::not_found("Credential", id))
    }
}

#[derive(Debug, Default)]
pub struct InMemorySyncRecordRepository {
    records: RwLock<Vec<SyncRecord>>,
}

impl InMemorySyncRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncRecordRepository for InMemorySyncRecordRepository {
    async fn append(&self, record: SyncRecord) -> ServiceResult<SyncRecord> {
        self.records.write().await.push(record.clone());
        Ok(record)
    }

    async fn recent(&self, limit: usize) -> ServiceResult<Vec<SyncRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn for_channel(
        &self,
        channel_id: Uuid,
        limit: usize,
    ) -> ServiceResult<Vec<SyncRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .rev()
            .filter(|r| r.channel_id == channel_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn since(&self, cutoff: DateTime<Utc>) -> ServiceResult<Vec<SyncRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .rev()
            .filter(|r| r.created_at >= cutoff)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStockMovementRepository {
    items: RwLock<Vec<StockMovement>>,
}

impl InMemoryStockMovementRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StockMovementRepository for InMemoryStockMovementRepository {
    async fn get(&self, id: Uuid) -> ServiceResult<Option<StockMovement>> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .find(|m| m.id == id)
            .cloned())
    }

    async fn save(&self, movement: StockMovement) -> ServiceResult<StockMovement> {
        let mut items = self.items.write().await;
        match items.iter_mut().find(|m| m.id == movement.id) {
            Some(existing) => *existing = movement.clone(),
            None => items.push(movement.clone()),
        }
        Ok(movement)
    }

    async fn for_material(&self, material_id: Uuid) -> ServiceResult<Vec<StockMovement>> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .rev()
            .filter(|m| m.material_id == material_id)
            .cloned()
            .collect())
    }
}
