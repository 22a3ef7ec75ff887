//! Shared fixtures for the integration tests.
//!
//! `TestEngine` wires every in-memory store into the full service stack the
//! same way the demo binary does. Rate limits default to values generous
//! enough that they never interfere; tests that exercise throttling build
//! their own factory with tighter settings.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::mpsc;
use uuid::Uuid;

use stockpilot::{
    clients::{ClientSettings, PlatformClientFactory},
    entities::{
        BomEdge, Channel, ChannelBinding, ChannelCredential, ChannelType, Material,
        API_KEY_CREDENTIAL,
    },
    events::{self, Event, EventSender},
    metrics::SyncMetrics,
    rate_limiter::RateLimiter,
    repositories::{
        BindingRepository, BomEdgeRepository, ChannelRepository, CredentialStore,
        InMemoryBindingRepository, InMemoryBomEdgeRepository, InMemoryChannelRepository,
        InMemoryCredentialStore, InMemoryMaterialRepository, InMemoryStockMovementRepository,
        InMemorySyncRecordRepository, MaterialRepository,
    },
    retry::RetryConfig,
    services::{AtpService, BomService, ChannelService, StockMovementService, SyncService},
};

/// Client settings that keep rate limiting and retry delay out of the way.
pub fn relaxed_settings() -> ClientSettings {
    ClientSettings {
        rate_limit_capacity: 1_000,
        rate_limit_refill_per_second: 1_000.0,
        retry: RetryConfig {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        },
    }
}

/// Fully wired engine backed by in-memory stores. Fields are public so tests
/// can reach past the services and inspect raw state.
pub struct TestEngine {
    pub materials: Arc<InMemoryMaterialRepository>,
    pub edges: Arc<InMemoryBomEdgeRepository>,
    pub channels: Arc<InMemoryChannelRepository>,
    pub bindings: Arc<InMemoryBindingRepository>,
    pub credentials: Arc<InMemoryCredentialStore>,
    pub records: Arc<InMemorySyncRecordRepository>,
    pub movements: Arc<InMemoryStockMovementRepository>,
    pub metrics: Arc<SyncMetrics>,
    pub sender: Arc<EventSender>,
    pub events: mpsc::Receiver<Event>,
    pub bom: BomService,
    pub atp: AtpService,
    pub channel_service: ChannelService,
    pub movement_service: StockMovementService,
    pub sync: SyncService,
}

impl TestEngine {
    /// Engine with the built-in platform clients and relaxed limits.
    pub fn new() -> Self {
        let metrics = Arc::new(SyncMetrics::new());
        let limiter = Arc::new(RateLimiter::new(Arc::clone(&metrics)));
        let factory =
            PlatformClientFactory::with_defaults(limiter, Arc::clone(&metrics), relaxed_settings());
        Self::assemble(factory, metrics)
    }

    /// Engine with a caller-supplied client factory, for injecting doubles.
    pub fn with_factory(factory: PlatformClientFactory) -> Self {
        Self::assemble(factory, Arc::new(SyncMetrics::new()))
    }

    fn assemble(factory: PlatformClientFactory, metrics: Arc<SyncMetrics>) -> Self {
        let materials = Arc::new(InMemoryMaterialRepository::new());
        let edges = Arc::new(InMemoryBomEdgeRepository::new());
        let channels = Arc::new(InMemoryChannelRepository::new());
        let bindings = Arc::new(InMemoryBindingRepository::new());
        let credentials = Arc::new(InMemoryCredentialStore::new());
        let records = Arc::new(InMemorySyncRecordRepository::new());
        let movements = Arc::new(InMemoryStockMovementRepository::new());

        let (sender, events) = events::channel(256);
        let sender = Arc::new(sender);

        let bom = BomService::new(edges.clone(), materials.clone());
        let atp = AtpService::new(
            materials.clone(),
            bindings.clone(),
            channels.clone(),
            bom.clone(),
        );
        let channel_service = ChannelService::new(
            channels.clone(),
            bindings.clone(),
            credentials.clone(),
            materials.clone(),
        );
        let movement_service = StockMovementService::new(
            movements.clone(),
            materials.clone(),
            Some(Arc::clone(&sender)),
        );
        let sync = SyncService::new(
            channels.clone(),
            bindings.clone(),
            materials.clone(),
            credentials.clone(),
            records.clone(),
            Arc::new(factory),
            Some(Arc::clone(&sender)),
            Duration::from_secs(900),
        );

        Self {
            materials,
            edges,
            channels,
            bindings,
            credentials,
            records,
            movements,
            metrics,
            sender,
            events,
            bom,
            atp,
            channel_service,
            movement_service,
            sync,
        }
    }

    /// Persists a material with the given stock levels and average cost.
    pub async fn seed_material(
        &self,
        code: &str,
        current: Decimal,
        minimum: Decimal,
        average_cost: Decimal,
    ) -> Material {
        let mut material = Material::new(code, format!("{} material", code), "pcs");
        material.current_stock = current;
        material.minimum_stock = minimum;
        material.average_cost = average_cost;
        self.materials.save(material).await.expect("seed material")
    }

    /// Persists an active BOM edge between two materials.
    pub async fn seed_edge(
        &self,
        parent_id: Uuid,
        child_id: Uuid,
        quantity: Decimal,
        scrap_percentage: Decimal,
    ) -> BomEdge {
        let mut edge = BomEdge::new(parent_id, child_id, quantity);
        edge.scrap_percentage = scrap_percentage;
        self.edges.save(edge).await.expect("seed edge")
    }

    /// Persists an active channel with a distribution ratio and an API key.
    pub async fn seed_channel(
        &self,
        code: &str,
        channel_type: ChannelType,
        distribution_ratio: Option<u32>,
    ) -> Channel {
        let mut channel = Channel::new(format!("{} channel", code), code, channel_type);
        channel.distribution_ratio = distribution_ratio;
        let channel = self.channels.save(channel).await.expect("seed channel");
        self.credentials
            .save(ChannelCredential::new(
                channel.id,
                API_KEY_CREDENTIAL,
                format!("key-{}", code),
            ))
            .await
            .expect("seed credential");
        channel
    }

    /// Persists a binding between a channel and a material.
    pub async fn seed_binding(
        &self,
        channel_id: Uuid,
        material_id: Uuid,
        external_product_id: &str,
        stock: i64,
    ) -> ChannelBinding {
        let mut binding = ChannelBinding::new(channel_id, material_id, external_product_id);
        binding.stock = stock;
        self.bindings.save(binding).await.expect("seed binding")
    }

    /// Drains every event currently buffered on the channel.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }
}
