/*!
 * Storage traits for the engine's entities.
 *
 * Services depend on these seams rather than a concrete store, so tests can
 * swap in doubles and the demo binary can run fully in memory. Edge and
 * binding stores preserve insertion order: BOM traversal walks edges in the
 * order they were defined, and distribution assigns the rounding remainder
 * to the last active binding.
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entities::{
    BomEdge, Channel, ChannelBinding, ChannelCredential, Material, StockMovement, SyncRecord,
};
use crate::errors::ServiceResult;

pub mod memory;

pub use memory::{
    InMemoryBindingRepository, InMemoryBomEdgeRepository, InMemoryChannelRepository,
    InMemoryCredentialStore, InMemoryMaterialRepository, InMemoryStockMovementRepository,
    InMemorySyncRecordRepository,
};

#[async_trait]
pub trait MaterialRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> ServiceResult<Option<Material>>;
    async fn get_by_code(&self, code: &str) -> ServiceResult<Option<Material>>;
    async fn list(&self) -> ServiceResult<Vec<Material>>;
    async fn list_by_category(&self, category: &str) -> ServiceResult<Vec<Material>>;
    async fn save(&self, material: Material) -> ServiceResult<Material>;
    async fn delete(&self, id: Uuid) -> ServiceResult<()>;
}

#[async_trait]
pub trait BomEdgeRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> ServiceResult<Option<BomEdge>>;
    /// All edges below `parent_id` regardless of status.
    async fn edges_for_parent(&self, parent_id: Uuid) -> ServiceResult<Vec<BomEdge>>;
    /// Active edges below `parent_id`, in the order they were defined.
    async fn active_edges_for_parent(&self, parent_id: Uuid) -> ServiceResult<Vec<BomEdge>>;
    async fn active_edges_for_work_center(&self, work_center: &str)
        -> ServiceResult<Vec<BomEdge>>;
    /// Distinct parent ids that own at least one active edge.
    async fn parents_with_active_edges(&self) -> ServiceResult<Vec<Uuid>>;
    async fn save(&self, edge: BomEdge) -> ServiceResult<BomEdge>;
    async fn delete(&self, id: Uuid) -> ServiceResult<()>;
}

#[async_trait]
pub trait ChannelRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> ServiceResult<Option<Channel>>;
    async fn get_by_code(&self, code: &str) -> ServiceResult<Option<Channel>>;
    async fn get_by_name(&self, name: &str) -> ServiceResult<Option<Channel>>;
    async fn list(&self) -> ServiceResult<Vec<Channel>>;
    async fn list_active(&self) -> ServiceResult<Vec<Channel>>;
    async fn save(&self, channel: Channel) -> ServiceResult<Channel>;
    async fn delete(&self, id: Uuid) -> ServiceResult<()>;
}

#[async_trait]
pub trait BindingRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> ServiceResult<Option<ChannelBinding>>;
    /// Bindings for a material, in the order they were created.
    async fn bindings_for_material(&self, material_id: Uuid)
        -> ServiceResult<Vec<ChannelBinding>>;
    async fn bindings_for_channel(&self, channel_id: Uuid) -> ServiceResult<Vec<ChannelBinding>>;
    async fn find_by_channel_and_material(
        &self,
        channel_id: Uuid,
        material_id: Uuid,
    ) -> ServiceResult<Option<ChannelBinding>>;
    async fn save(&self, binding: ChannelBinding) -> ServiceResult<ChannelBinding>;
    async fn delete(&self, id: Uuid) -> ServiceResult<()>;
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_active(
        &self,
        channel_id: Uuid,
        kind: &str,
    ) -> ServiceResult<Option<ChannelCredential>>;
    async fn find(&self, channel_id: Uuid) -> ServiceResult<Vec<ChannelCredential>>;
    async fn save(&self, credential: ChannelCredential) -> ServiceResult<ChannelCredential>;
    async fn delete(&self, id: Uuid) -> ServiceResult<()>;
}

#[async_trait]
pub trait SyncRecordRepository: Send + Sync {
    async fn append(&self, record: SyncRecord) -> ServiceResult<SyncRecord>;
    /// Newest records first.
    async fn recent(&self, limit: usize) -> ServiceResult<Vec<SyncRecord>>;
    async fn for_channel(
        &self,
        channel_id: Uuid,
        limit: usize,
    ) -> ServiceResult<Vec<SyncRecord>>;
    /// Records created at or after `cutoff`, newest first.
    async fn since(&self, cutoff: DateTime<Utc>) -> ServiceResult<Vec<SyncRecord>>;
}

#[async_trait]
pub trait StockMovementRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> ServiceResult<Option<StockMovement>>;
    async fn save(&self, movement: StockMovement) -> ServiceResult<StockMovement>;
    /// Movements for a material, newest first.
    async fn for_material(&self, material_id: Uuid) -> ServiceResult<Vec<StockMovement>>;
}
