/*!
 * Propagation of local stock and price changes to external channels.
 *
 * Single-binding updates walk one fixed progression: resolve the binding,
 * check the channel credential, persist the local mirror, dispatch through
 * the channel's platform client, stamp `last_sync_at` and append an audit
 * record. Every failure is absorbed into a `false` return plus a FAILURE
 * record; no error escapes to the caller.
 *
 * Fan-out entry points (whole channel, whole material, everything) catch
 * per-item failures, keep iterating and report success counts. The
 * scheduler task re-runs the full fan-out on a fixed interval.
 */

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::clients::PlatformClientFactory;
use crate::entities::{
    Channel, ChannelBinding, SyncAction, SyncRecord, SyncStatus, API_KEY_CREDENTIAL,
};
use crate::errors::{ServiceError, ServiceResult};
use crate::events::{Event, EventSender};
use crate::repositories::{
    BindingRepository, ChannelRepository, CredentialStore, MaterialRepository,
    SyncRecordRepository,
};
use crate::services::distribution::{split_delta, BindingShare};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncHealth {
    Healthy,
    Degraded,
}

/// Point-in-time view of how recently each active channel has synced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatusReport {
    pub total_channels: usize,
    pub synced_channels: usize,
    /// Most recent successful push within the health window.
    pub last_sync_at: Option<DateTime<Utc>>,
    pub status: SyncHealth,
}

#[derive(Clone)]
pub struct SyncService {
    channels: Arc<dyn ChannelRepository>,
    bindings: Arc<dyn BindingRepository>,
    materials: Arc<dyn MaterialRepository>,
    credentials: Arc<dyn CredentialStore>,
    records: Arc<dyn SyncRecordRepository>,
    clients: Arc<PlatformClientFactory>,
    event_sender: Option<Arc<EventSender>>,
    health_window_secs: u64,
}

impl SyncService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        channels: Arc<dyn ChannelRepository>,
        bindings: Arc<dyn BindingRepository>,
        materials: Arc<dyn MaterialRepository>,
        credentials: Arc<dyn CredentialStore>,
        records: Arc<dyn SyncRecordRepository>,
        clients: Arc<PlatformClientFactory>,
        event_sender: Option<Arc<EventSender>>,
        health_window: Duration,
    ) -> Self {
        Self {
            channels,
            bindings,
            materials,
            credentials,
            records,
            clients,
            event_sender,
            health_window_secs: health_window.as_secs(),
        }
    }

    /// Pushes a new stock level for one binding. Returns whether the push
    /// fully succeeded; failures are logged and recorded, never raised.
    #[instrument(skip(self))]
    pub async fn update_binding_stock(&self, binding_id: Uuid, new_stock: i64) -> bool {
        let Some((binding, channel)) = self.resolve_binding(binding_id).await else {
            return false;
        };
        if !self.has_active_credential(&channel).await {
            self.record_failure(
                &channel,
                &binding,
                SyncAction::StockUpdate,
                format!("Missing {} credential", API_KEY_CREDENTIAL),
            )
            .await;
            return false;
        }

        let mut binding = binding;
        binding.stock = new_stock;
        binding.updated_at = Utc::now();
        let binding = match self.bindings.save(binding).await {
            Ok(binding) => binding,
            Err(e) => {
                error!("Failed to save stock mirror for binding {}: {}", binding_id, e);
                return false;
            }
        };

        let client = self.clients.client_for(channel.channel_type);
        if let Err(e) = client.update_stock(&channel, &binding, new_stock).await {
            error!("Stock push to channel {} failed: {}", channel.code, e);
            self.record_failure(&channel, &binding, SyncAction::StockUpdate, e.to_string())
                .await;
            if let Some(sender) = &self.event_sender {
                sender
                    .send_or_log(Event::SyncFailed {
                        channel_id: channel.id,
                        material_id: Some(binding.material_id),
                        detail: e.to_string(),
                    })
                    .await;
            }
            return false;
        }

        let Some(binding) = self.stamp_synced(binding).await else {
            return false;
        };

        self.append_record(
            &channel,
            &binding,
            SyncAction::StockUpdate,
            SyncStatus::Success,
            format!("Stock set to {}", new_stock),
        )
        .await;
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::StockSynced {
                    channel_id: channel.id,
                    material_id: binding.material_id,
                    stock: new_stock,
                })
                .await;
        }
        true
    }

    /// Pushes a new price for one binding; same progression and failure
    /// policy as [`update_binding_stock`](Self::update_binding_stock).
    #[instrument(skip(self))]
    pub async fn update_binding_price(&self, binding_id: Uuid, new_price: Decimal) -> bool {
        let Some((binding, channel)) = self.resolve_binding(binding_id).await else {
            return false;
        };
        if !self.has_active_credential(&channel).await {
            self.record_failure(
                &channel,
                &binding,
                SyncAction::PriceUpdate,
                format!("Missing {} credential", API_KEY_CREDENTIAL),
            )
            .await;
            return false;
        }

        let mut binding = binding;
        binding.price = Some(new_price);
        binding.updated_at = Utc::now();
        let binding = match self.bindings.save(binding).await {
            Ok(binding) => binding,
            Err(e) => {
                error!("Failed to save price mirror for binding {}: {}", binding_id, e);
                return false;
            }
        };

        let client = self.clients.client_for(channel.channel_type);
        if let Err(e) = client.update_price(&channel, &binding, new_price).await {
            error!("Price push to channel {} failed: {}", channel.code, e);
            self.record_failure(&channel, &binding, SyncAction::PriceUpdate, e.to_string())
                .await;
            if let Some(sender) = &self.event_sender {
                sender
                    .send_or_log(Event::SyncFailed {
                        channel_id: channel.id,
                        material_id: Some(binding.material_id),
                        detail: e.to_string(),
                    })
                    .await;
            }
            return false;
        }

        let Some(binding) = self.stamp_synced(binding).await else {
            return false;
        };

        self.append_record(
            &channel,
            &binding,
            SyncAction::PriceUpdate,
            SyncStatus::Success,
            format!("Price set to {}", new_price),
        )
        .await;
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::PriceSynced {
                    channel_id: channel.id,
                    material_id: binding.material_id,
                    price: new_price,
                })
                .await;
        }
        true
    }

    /// Splits a stock delta across the material's bindings and pushes each
    /// portion. The last active binding absorbs the rounding remainder so
    /// the applied portions always sum to `delta` exactly.
    #[instrument(skip(self))]
    pub async fn propagate_stock_change(
        &self,
        material_id: Uuid,
        delta: i64,
    ) -> ServiceResult<usize> {
        self.materials
            .get(material_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Material", material_id))?;

        let bindings = self.bindings.bindings_for_material(material_id).await?;
        let mut shares = Vec::with_capacity(bindings.len());
        for binding in &bindings {
            let Some(channel) = self.channels.get(binding.channel_id).await? else {
                warn!("Skipping binding {} with unknown channel", binding.id);
                continue;
            };
            shares.push(BindingShare {
                binding_id: binding.id,
                ratio: channel.distribution_ratio,
                active: binding.active,
            });
        }

        let mut synced = 0;
        for portion in split_delta(delta, &shares) {
            let Some(binding) = bindings.iter().find(|b| b.id == portion.binding_id) else {
                continue;
            };
            let new_stock = binding.stock + portion.quantity;
            if self.update_binding_stock(binding.id, new_stock).await {
                synced += 1;
            }
        }

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::StockPropagated {
                    material_id,
                    delta,
                    channels: synced,
                })
                .await;
        }
        Ok(synced)
    }

    /// Sends the same absolute price to every active binding of the
    /// material. Returns how many bindings accepted it.
    #[instrument(skip(self))]
    pub async fn propagate_price_change(
        &self,
        material_id: Uuid,
        new_price: Decimal,
    ) -> ServiceResult<usize> {
        self.materials
            .get(material_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Material", material_id))?;

        let mut synced = 0;
        for binding in self.bindings.bindings_for_material(material_id).await? {
            if !binding.active {
                continue;
            }
            if self.update_binding_price(binding.id, new_price).await {
                synced += 1;
            }
        }

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::PricePropagated {
                    material_id,
                    price: new_price,
                    channels: synced,
                })
                .await;
        }
        Ok(synced)
    }

    /// Re-pushes the authoritative stock of every material bound to the
    /// channel. Per-binding failures are counted, not raised.
    #[instrument(skip(self))]
    pub async fn sync_channel(&self, channel_id: Uuid) -> ServiceResult<usize> {
        self.channels
            .get(channel_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Channel", channel_id))?;

        let mut synced = 0;
        for binding in self.bindings.bindings_for_channel(channel_id).await? {
            if !binding.active {
                continue;
            }
            let Some(material) = self.materials.get(binding.material_id).await? else {
                warn!("Skipping binding {} with unknown material", binding.id);
                continue;
            };
            let stock = material.current_stock.trunc().to_i64().unwrap_or(0);
            if self.update_binding_stock(binding.id, stock).await {
                synced += 1;
            }
        }

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::ChannelSyncCompleted {
                    channel_id,
                    bindings: synced,
                })
                .await;
        }
        Ok(synced)
    }

    /// Re-pushes the material's authoritative stock to all of its active
    /// bindings.
    #[instrument(skip(self))]
    pub async fn sync_material(&self, material_id: Uuid) -> ServiceResult<usize> {
        let material = self
            .materials
            .get(material_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Material", material_id))?;

        let stock = material.current_stock.trunc().to_i64().unwrap_or(0);
        let mut synced = 0;
        for binding in self.bindings.bindings_for_material(material_id).await? {
            if !binding.active {
                continue;
            }
            if self.update_binding_stock(binding.id, stock).await {
                synced += 1;
            }
        }
        Ok(synced)
    }

    /// Full fan-out over every active channel. A channel that fails
    /// entirely is logged and skipped.
    #[instrument(skip(self))]
    pub async fn sync_all_channels(&self) -> ServiceResult<usize> {
        let mut synced = 0;
        for channel in self.channels.list_active().await? {
            match self.sync_channel(channel.id).await {
                Ok(count) => synced += count,
                Err(e) => error!("Sync of channel {} failed: {}", channel.code, e),
            }
        }
        Ok(synced)
    }

    /// HEALTHY when every active channel has a successful push within the
    /// health window, DEGRADED otherwise.
    #[instrument(skip(self))]
    pub async fn sync_status(&self) -> ServiceResult<SyncStatusReport> {
        let active = self.channels.list_active().await?;
        let cutoff = Utc::now() - chrono::Duration::seconds(self.health_window_secs as i64);

        let mut synced_ids: HashSet<Uuid> = HashSet::new();
        let mut last_sync_at: Option<DateTime<Utc>> = None;
        for record in self.records.since(cutoff).await? {
            if record.status != SyncStatus::Success {
                continue;
            }
            synced_ids.insert(record.channel_id);
            if last_sync_at.map_or(true, |seen| record.created_at > seen) {
                last_sync_at = Some(record.created_at);
            }
        }

        let total_channels = active.len();
        let synced_channels = active.iter().filter(|c| synced_ids.contains(&c.id)).count();
        let status = if synced_channels == total_channels {
            SyncHealth::Healthy
        } else {
            SyncHealth::Degraded
        };

        Ok(SyncStatusReport {
            total_channels,
            synced_channels,
            last_sync_at,
            status,
        })
    }

    /// Newest audit entries first.
    pub async fn recent_records(&self, limit: usize) -> ServiceResult<Vec<SyncRecord>> {
        self.records.recent(limit).await
    }

    pub async fn records_for_channel(
        &self,
        channel_id: Uuid,
        limit: usize,
    ) -> ServiceResult<Vec<SyncRecord>> {
        self.records.for_channel(channel_id, limit).await
    }

    async fn resolve_binding(&self, binding_id: Uuid) -> Option<(ChannelBinding, Channel)> {
        let binding = match self.bindings.get(binding_id).await {
            Ok(Some(binding)) => binding,
            Ok(None) => {
                warn!("Binding {} not found", binding_id);
                return None;
            }
            Err(e) => {
                error!("Failed to load binding {}: {}", binding_id, e);
                return None;
            }
        };
        match self.channels.get(binding.channel_id).await {
            Ok(Some(channel)) => Some((binding, channel)),
            Ok(None) => {
                warn!("Channel {} of binding {} not found", binding.channel_id, binding_id);
                None
            }
            Err(e) => {
                error!("Failed to load channel {}: {}", binding.channel_id, e);
                None
            }
        }
    }

    async fn has_active_credential(&self, channel: &Channel) -> bool {
        match self
            .credentials
            .get_active(channel.id, API_KEY_CREDENTIAL)
            .await
        {
            Ok(Some(credential)) => !credential.value.trim().is_empty(),
            Ok(None) => false,
            Err(e) => {
                error!("Credential lookup for channel {} failed: {}", channel.code, e);
                false
            }
        }
    }

    async fn stamp_synced(&self, mut binding: ChannelBinding) -> Option<ChannelBinding> {
        let now = Utc::now();
        binding.last_sync_at = Some(now);
        binding.updated_at = now;
        let binding_id = binding.id;
        match self.bindings.save(binding).await {
            Ok(binding) => Some(binding),
            Err(e) => {
                error!("Failed to stamp sync time on binding {}: {}", binding_id, e);
                None
            }
        }
    }

    async fn record_failure(
        &self,
        channel: &Channel,
        binding: &ChannelBinding,
        action: SyncAction,
        detail: String,
    ) {
        warn!(
            "Sync {} for binding {} on channel {} failed: {}",
            action, binding.id, channel.code, detail
        );
        self.append_record(channel, binding, action, SyncStatus::Failure, detail)
            .await;
    }

    // Audit failures must not fail the sync itself.
    async fn append_record(
        &self,
        channel: &Channel,
        binding: &ChannelBinding,
        action: SyncAction,
        status: SyncStatus,
        detail: String,
    ) {
        let record = SyncRecord::new(
            channel.id,
            Some(binding.material_id),
            Some(binding.id),
            action,
            status,
            detail,
        );
        if let Err(e) = self.records.append(record).await {
            warn!("Failed to append sync record: {}", e);
        }
    }
}

/// Spawns the periodic full sync. Tick errors are logged and the loop
/// keeps running; aborting the returned handle stops it.
pub fn start_sync_scheduler(service: SyncService, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match service.sync_all_channels().await {
                Ok(count) => info!("Scheduled sync pushed {} binding update(s)", count),
                Err(e) => error!("Scheduled sync failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientSettings;
    use crate::entities::{ChannelCredential, ChannelType, Material};
    use crate::events;
    use crate::metrics::SyncMetrics;
    use crate::rate_limiter::RateLimiter;
    use crate::repositories::{
        InMemoryBindingRepository, InMemoryChannelRepository, InMemoryCredentialStore,
        InMemoryMaterialRepository, InMemorySyncRecordRepository,
    };
    use crate::retry::RetryConfig;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc;

    struct Fixture {
        service: SyncService,
        channels: Arc<InMemoryChannelRepository>,
        bindings: Arc<InMemoryBindingRepository>,
        materials: Arc<InMemoryMaterialRepository>,
        credentials: Arc<InMemoryCredentialStore>,
        records: Arc<InMemorySyncRecordRepository>,
        rx: mpsc::Receiver<Event>,
    }

    fn fixture_with(settings: ClientSettings) -> Fixture {
        let channels = Arc::new(InMemoryChannelRepository::new());
        let bindings = Arc::new(InMemoryBindingRepository::new());
        let materials = Arc::new(InMemoryMaterialRepository::new());
        let credentials = Arc::new(InMemoryCredentialStore::new());
        let records = Arc::new(InMemorySyncRecordRepository::new());

        let metrics = Arc::new(SyncMetrics::new());
        let limiter = Arc::new(RateLimiter::new(Arc::clone(&metrics)));
        let clients = Arc::new(PlatformClientFactory::with_defaults(
            limiter, metrics, settings,
        ));

        let (sender, rx) = events::channel(64);
        let service = SyncService::new(
            channels.clone(),
            bindings.clone(),
            materials.clone(),
            credentials.clone(),
            records.clone(),
            clients,
            Some(Arc::new(sender)),
            Duration::from_secs(3600),
        );
        Fixture {
            service,
            channels,
            bindings,
            materials,
            credentials,
            records,
            rx,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(ClientSettings::default())
    }

    async fn seed_channel(fx: &Fixture, code: &str, ratio: Option<u32>, with_key: bool) -> Channel {
        let mut channel = Channel::new(code.to_uppercase(), code, ChannelType::Shopify);
        channel.distribution_ratio = ratio;
        let channel = fx.channels.save(channel).await.unwrap();
        if with_key {
            fx.credentials
                .save(ChannelCredential::new(
                    channel.id,
                    API_KEY_CREDENTIAL,
                    "secret",
                ))
                .await
                .unwrap();
        }
        channel
    }

    async fn seed_material(fx: &Fixture, stock: Decimal) -> Material {
        let mut material = Material::new("M-1", "Widget", "pcs");
        material.current_stock = stock;
        fx.materials.save(material.clone()).await.unwrap();
        material
    }

    async fn seed_binding(fx: &Fixture, channel: &Channel, material: &Material, stock: i64) -> ChannelBinding {
        let mut binding = ChannelBinding::new(channel.id, material.id, "EXT-1");
        binding.stock = stock;
        fx.bindings.save(binding).await.unwrap()
    }

    #[tokio::test]
    async fn stock_update_persists_records_and_emits() {
        let mut fx = fixture();
        let channel = seed_channel(&fx, "shop-eu", None, true).await;
        let material = seed_material(&fx, dec!(100)).await;
        let binding = seed_binding(&fx, &channel, &material, 10).await;

        assert!(fx.service.update_binding_stock(binding.id, 42).await);

        let saved = fx.bindings.get(binding.id).await.unwrap().unwrap();
        assert_eq!(saved.stock, 42);
        assert!(saved.last_sync_at.is_some());

        let records = fx.records.recent(10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, SyncAction::StockUpdate);
        assert_eq!(records[0].status, SyncStatus::Success);
        assert!(records[0].detail.as_deref().unwrap().contains("42"));

        assert_matches!(
            fx.rx.recv().await,
            Some(Event::StockSynced { stock: 42, .. })
        );
    }

    #[tokio::test]
    async fn missing_credential_fails_before_any_local_write() {
        let fx = fixture();
        let channel = seed_channel(&fx, "shop-eu", None, false).await;
        let material = seed_material(&fx, dec!(100)).await;
        let binding = seed_binding(&fx, &channel, &material, 10).await;

        assert!(!fx.service.update_binding_stock(binding.id, 42).await);

        let saved = fx.bindings.get(binding.id).await.unwrap().unwrap();
        assert_eq!(saved.stock, 10);
        assert!(saved.last_sync_at.is_none());

        let records = fx.records.recent(10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, SyncStatus::Failure);
        assert!(records[0]
            .detail
            .as_deref()
            .unwrap()
            .contains("Missing API_KEY"));
    }

    #[tokio::test]
    async fn blank_credential_value_counts_as_missing() {
        let fx = fixture();
        let channel = seed_channel(&fx, "shop-eu", None, false).await;
        fx.credentials
            .save(ChannelCredential::new(channel.id, API_KEY_CREDENTIAL, "  "))
            .await
            .unwrap();
        let material = seed_material(&fx, dec!(100)).await;
        let binding = seed_binding(&fx, &channel, &material, 10).await;

        assert!(!fx.service.update_binding_price(binding.id, dec!(9.99)).await);
        let records = fx.records.recent(10).await.unwrap();
        assert_eq!(records[0].status, SyncStatus::Failure);
    }

    #[tokio::test]
    async fn unknown_binding_returns_false_without_records() {
        let fx = fixture();
        assert!(!fx.service.update_binding_stock(Uuid::new_v4(), 5).await);
        assert!(fx.records.recent(10).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_remote_retries_leave_a_failure_record() {
        let settings = ClientSettings {
            rate_limit_capacity: 0,
            rate_limit_refill_per_second: 1.0,
            retry: RetryConfig {
                max_attempts: 2,
                backoff: Duration::from_millis(50),
            },
        };
        let mut fx = fixture_with(settings);
        let channel = seed_channel(&fx, "shop-eu", None, true).await;
        let material = seed_material(&fx, dec!(100)).await;
        let binding = seed_binding(&fx, &channel, &material, 10).await;

        assert!(!fx.service.update_binding_stock(binding.id, 42).await);

        // the local mirror is written before the remote call
        let saved = fx.bindings.get(binding.id).await.unwrap().unwrap();
        assert_eq!(saved.stock, 42);
        assert!(saved.last_sync_at.is_none());

        let records = fx.records.recent(10).await.unwrap();
        assert_eq!(records[0].status, SyncStatus::Failure);
        assert_matches!(fx.rx.recv().await, Some(Event::SyncFailed { .. }));
    }

    #[tokio::test]
    async fn stock_delta_splits_by_ratio_with_remainder() {
        let mut fx = fixture();
        let first = seed_channel(&fx, "shop-a", Some(30), true).await;
        let second = seed_channel(&fx, "shop-b", Some(70), true).await;
        let material = seed_material(&fx, dec!(100)).await;
        let binding_a = seed_binding(&fx, &first, &material, 10).await;
        let binding_b = seed_binding(&fx, &second, &material, 20).await;

        let synced = fx
            .service
            .propagate_stock_change(material.id, 10)
            .await
            .unwrap();
        assert_eq!(synced, 2);

        assert_eq!(fx.bindings.get(binding_a.id).await.unwrap().unwrap().stock, 13);
        assert_eq!(fx.bindings.get(binding_b.id).await.unwrap().unwrap().stock, 27);

        let mut saw_propagated = false;
        while let Ok(event) = fx.rx.try_recv() {
            if let Event::StockPropagated { delta, channels, .. } = event {
                assert_eq!(delta, 10);
                assert_eq!(channels, 2);
                saw_propagated = true;
            }
        }
        assert!(saw_propagated);
    }

    #[tokio::test]
    async fn price_change_reaches_only_active_bindings() {
        let fx = fixture();
        let first = seed_channel(&fx, "shop-a", None, true).await;
        let second = seed_channel(&fx, "shop-b", None, true).await;
        let material = seed_material(&fx, dec!(100)).await;
        let active = seed_binding(&fx, &first, &material, 10).await;
        let mut dormant = ChannelBinding::new(second.id, material.id, "EXT-2");
        dormant.active = false;
        dormant.price = Some(dec!(5));
        let dormant = fx.bindings.save(dormant).await.unwrap();

        let synced = fx
            .service
            .propagate_price_change(material.id, dec!(12.50))
            .await
            .unwrap();
        assert_eq!(synced, 1);

        assert_eq!(
            fx.bindings.get(active.id).await.unwrap().unwrap().price,
            Some(dec!(12.50))
        );
        assert_eq!(
            fx.bindings.get(dormant.id).await.unwrap().unwrap().price,
            Some(dec!(5))
        );
    }

    #[tokio::test]
    async fn propagation_for_unknown_material_is_not_found() {
        let fx = fixture();
        let err = fx
            .service
            .propagate_stock_change(Uuid::new_v4(), 5)
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
    }

    #[tokio::test]
    async fn sync_channel_pushes_truncated_material_stock() {
        let fx = fixture();
        let channel = seed_channel(&fx, "shop-eu", None, true).await;
        let material = seed_material(&fx, dec!(55.7)).await;
        let binding = seed_binding(&fx, &channel, &material, 10).await;

        let synced = fx.service.sync_channel(channel.id).await.unwrap();
        assert_eq!(synced, 1);
        assert_eq!(fx.bindings.get(binding.id).await.unwrap().unwrap().stock, 55);

        let err = fx.service.sync_channel(Uuid::new_v4()).await.unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
    }

    #[tokio::test]
    async fn sync_all_counts_only_successful_pushes() {
        let fx = fixture();
        let good = seed_channel(&fx, "shop-good", None, true).await;
        let keyless = seed_channel(&fx, "shop-keyless", None, false).await;
        let material = seed_material(&fx, dec!(40)).await;
        seed_binding(&fx, &good, &material, 1).await;
        seed_binding(&fx, &keyless, &material, 2).await;

        let synced = fx.service.sync_all_channels().await.unwrap();
        assert_eq!(synced, 1);
    }

    #[tokio::test]
    async fn sync_status_tracks_channel_health() {
        let fx = fixture();
        let good = seed_channel(&fx, "shop-good", None, true).await;
        let material = seed_material(&fx, dec!(40)).await;
        seed_binding(&fx, &good, &material, 1).await;

        fx.service.sync_all_channels().await.unwrap();
        let report = fx.service.sync_status().await.unwrap();
        assert_eq!(report.total_channels, 1);
        assert_eq!(report.synced_channels, 1);
        assert!(report.last_sync_at.is_some());
        assert_eq!(report.status, SyncHealth::Healthy);

        let keyless = seed_channel(&fx, "shop-keyless", None, false).await;
        seed_binding(&fx, &keyless, &material, 2).await;
        fx.service.sync_all_channels().await.unwrap();

        let report = fx.service.sync_status().await.unwrap();
        assert_eq!(report.total_channels, 2);
        assert_eq!(report.synced_channels, 1);
        assert_eq!(report.status, SyncHealth::Degraded);
    }

    #[tokio::test]
    async fn sync_material_skips_inactive_bindings() {
        let fx = fixture();
        let channel = seed_channel(&fx, "shop-eu", None, true).await;
        let material = seed_material(&fx, dec!(9)).await;
        let active = seed_binding(&fx, &channel, &material, 1).await;
        let mut dormant = ChannelBinding::new(channel.id, material.id, "EXT-2");
        dormant.active = false;
        let dormant = fx.bindings.save(dormant).await.unwrap();

        let synced = fx.service.sync_material(material.id).await.unwrap();
        assert_eq!(synced, 1);
        assert_eq!(fx.bindings.get(active.id).await.unwrap().unwrap().stock, 9);
        assert_eq!(fx.bindings.get(dormant.id).await.unwrap().unwrap().stock, 0);
    }
}
