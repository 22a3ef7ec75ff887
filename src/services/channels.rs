/*!
 * Channel and binding management.
 *
 * Channels are the external platforms stock is mirrored to; a binding ties
 * one material to one channel-side listing. Credentials are stored per
 * channel and gate every remote dispatch. This service owns the lifecycle
 * of all three; pushing values out is the sync service's job.
 */

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::entities::{Channel, ChannelBinding, ChannelCredential, ChannelType};
use crate::errors::{ServiceError, ServiceResult};
use crate::repositories::{
    BindingRepository, ChannelRepository, CredentialStore, MaterialRepository,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateChannelRequest {
    #[validate(length(min = 1, message = "Channel name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Channel code is required"))]
    pub code: String,
    pub channel_type: ChannelType,
    pub description: Option<String>,
    pub base_url: Option<String>,
    pub webhook_url: Option<String>,
    #[validate(range(max = 100, message = "Distribution ratio must be 0-100"))]
    pub distribution_ratio: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateChannelRequest {
    #[validate(length(min = 1, message = "Channel name is required"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "Channel code is required"))]
    pub code: Option<String>,
    pub description: Option<String>,
    pub base_url: Option<String>,
    pub webhook_url: Option<String>,
    #[validate(range(max = 100, message = "Distribution ratio must be 0-100"))]
    pub distribution_ratio: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBindingRequest {
    pub external_sku: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i64>,
    pub active: Option<bool>,
}

#[derive(Clone)]
pub struct ChannelService {
    channels: Arc<dyn ChannelRepository>,
    bindings: Arc<dyn BindingRepository>,
    credentials: Arc<dyn CredentialStore>,
    materials: Arc<dyn MaterialRepository>,
}

impl ChannelService {
    pub fn new(
        channels: Arc<dyn ChannelRepository>,
        bindings: Arc<dyn BindingRepository>,
        credentials: Arc<dyn CredentialStore>,
        materials: Arc<dyn MaterialRepository>,
    ) -> Self {
        Self {
            channels,
            bindings,
            credentials,
            materials,
        }
    }

    async fn require_channel(&self, channel_id: Uuid) -> ServiceResult<Channel> {
        self.channels
            .get(channel_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Channel", channel_id))
    }

    #[instrument(skip(self, request), fields(code = %request.code))]
    pub async fn create_channel(&self, request: CreateChannelRequest) -> ServiceResult<Channel> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        if self.channels.get_by_code(&request.code).await?.is_some() {
            return Err(ServiceError::validation(format!(
                "Channel code '{}' already exists",
                request.code
            )));
        }
        if self.channels.get_by_name(&request.name).await?.is_some() {
            return Err(ServiceError::validation(format!(
                "Channel name '{}' already exists",
                request.name
            )));
        }

        let mut channel = Channel::new(request.name, request.code, request.channel_type);
        channel.description = request.description;
        channel.base_url = request.base_url;
        channel.webhook_url = request.webhook_url;
        channel.distribution_ratio = request.distribution_ratio;

        let channel = self.channels.save(channel).await?;
        info!("Created channel {} ({})", channel.code, channel.id);
        Ok(channel)
    }

    #[instrument(skip(self, request))]
    pub async fn update_channel(
        &self,
        channel_id: Uuid,
        request: UpdateChannelRequest,
    ) -> ServiceResult<Channel> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let mut channel = self.require_channel(channel_id).await?;

        if let Some(code) = request.code {
            if code != channel.code && self.channels.get_by_code(&code).await?.is_some() {
                return Err(ServiceError::validation(format!(
                    "Channel code '{}' already exists",
                    code
                )));
            }
            channel.code = code;
        }
        if let Some(name) = request.name {
            if name != channel.name && self.channels.get_by_name(&name).await?.is_some() {
                return Err(ServiceError::validation(format!(
                    "Channel name '{}' already exists",
                    name
                )));
            }
            channel.name = name;
        }
        if let Some(description) = request.description {
            channel.description = Some(description);
        }
        if let Some(base_url) = request.base_url {
            channel.base_url = Some(base_url);
        }
        if let Some(webhook_url) = request.webhook_url {
            channel.webhook_url = Some(webhook_url);
        }
        if let Some(ratio) = request.distribution_ratio {
            channel.distribution_ratio = Some(ratio);
        }
        channel.updated_at = Utc::now();

        self.channels.save(channel).await
    }

    pub async fn get_channel(&self, channel_id: Uuid) -> ServiceResult<Channel> {
        self.require_channel(channel_id).await
    }

    pub async fn list_channels(&self) -> ServiceResult<Vec<Channel>> {
        self.channels.list().await
    }

    pub async fn list_active_channels(&self) -> ServiceResult<Vec<Channel>> {
        self.channels.list_active().await
    }

    #[instrument(skip(self))]
    pub async fn delete_channel(&self, channel_id: Uuid) -> ServiceResult<()> {
        self.channels.delete(channel_id).await?;
        info!("Deleted channel {}", channel_id);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_active(&self, channel_id: Uuid, active: bool) -> ServiceResult<Channel> {
        let mut channel = self.require_channel(channel_id).await?;
        channel.active = active;
        channel.updated_at = Utc::now();
        self.channels.save(channel).await
    }

    /// Upsert by (channel, kind). Saving over an inactive credential
    /// reactivates it with the new value.
    #[instrument(skip(self, value))]
    pub async fn save_credential(
        &self,
        channel_id: Uuid,
        kind: &str,
        value: impl Into<String> + Send,
    ) -> ServiceResult<ChannelCredential> {
        self.require_channel(channel_id).await?;

        let existing = self
            .credentials
            .find(channel_id)
            .await?
            .into_iter()
            .find(|c| c.kind == kind);

        let credential = match existing {
            Some(mut credential) => {
                credential.value = value.into();
                credential.active = true;
                credential.updated_at = Utc::now();
                credential
            }
            None => ChannelCredential::new(channel_id, kind, value),
        };
        self.credentials.save(credential).await
    }

    /// Active credential value for the channel, if any.
    pub async fn get_credential(
        &self,
        channel_id: Uuid,
        kind: &str,
    ) -> ServiceResult<Option<String>> {
        Ok(self
            .credentials
            .get_active(channel_id, kind)
            .await?
            .map(|c| c.value))
    }

    #[instrument(skip(self))]
    pub async fn delete_credential(&self, channel_id: Uuid, kind: &str) -> ServiceResult<()> {
        let credential = self
            .credentials
            .find(channel_id)
            .await?
            .into_iter()
            .find(|c| c.kind == kind)
            .ok_or_else(|| {
                ServiceError::not_found("Credential", format!("{}/{}", channel_id, kind))
            })?;
        self.credentials.delete(credential.id).await
    }

    /// Binds a material to a channel listing. The mirror fields start from
    /// the material: sku = code, price = average cost, stock = integer part
    /// of current stock.
    #[instrument(skip(self))]
    pub async fn create_binding(
        &self,
        channel_id: Uuid,
        material_id: Uuid,
        external_product_id: &str,
    ) -> ServiceResult<ChannelBinding> {
        if external_product_id.trim().is_empty() {
            return Err(ServiceError::validation("External product id is required"));
        }
        self.require_channel(channel_id).await?;
        let material = self
            .materials
            .get(material_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Material", material_id))?;

        if self
            .bindings
            .find_by_channel_and_material(channel_id, material_id)
            .await?
            .is_some()
        {
            return Err(ServiceError::validation(format!(
                "Material {} is already bound to channel {}",
                material.code, channel_id
            )));
        }

        let mut binding = ChannelBinding::new(channel_id, material_id, external_product_id);
        binding.external_sku = Some(material.code.clone());
        binding.price = Some(material.average_cost);
        binding.stock = material.current_stock.trunc().to_i64().unwrap_or(0);

        let binding = self.bindings.save(binding).await?;
        info!(
            "Bound material {} to channel {} as {}",
            material.code, channel_id, binding.external_product_id
        );
        Ok(binding)
    }

    #[instrument(skip(self, request))]
    pub async fn update_binding(
        &self,
        binding_id: Uuid,
        request: UpdateBindingRequest,
    ) -> ServiceResult<ChannelBinding> {
        let mut binding = self
            .bindings
            .get(binding_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Binding", binding_id))?;

        if let Some(external_sku) = request.external_sku {
            binding.external_sku = Some(external_sku);
        }
        if let Some(price) = request.price {
            binding.price = Some(price);
        }
        if let Some(stock) = request.stock {
            binding.stock = stock;
        }
        if let Some(active) = request.active {
            binding.active = active;
        }
        binding.updated_at = Utc::now();

        self.bindings.save(binding).await
    }

    pub async fn get_binding(&self, binding_id: Uuid) -> ServiceResult<ChannelBinding> {
        self.bindings
            .get(binding_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Binding", binding_id))
    }

    pub async fn delete_binding(&self, binding_id: Uuid) -> ServiceResult<()> {
        self.bindings.delete(binding_id).await
    }

    /// Active channels that have at least one active binding to push.
    pub async fn channels_needing_sync(&self) -> ServiceResult<Vec<Channel>> {
        let mut due = Vec::new();
        for channel in self.channels.list_active().await? {
            let has_active_binding = self
                .bindings
                .bindings_for_channel(channel.id)
                .await?
                .iter()
                .any(|b| b.active);
            if has_active_binding {
                due.push(channel);
            }
        }
        Ok(due)
    }

    pub async fn mark_binding_synced(&self, binding_id: Uuid) -> ServiceResult<ChannelBinding> {
        let mut binding = self
            .bindings
            .get(binding_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Binding", binding_id))?;
        let now = Utc::now();
        binding.last_sync_at = Some(now);
        binding.updated_at = now;
        self.bindings.save(binding).await
    }

    pub async fn count_active_bindings(&self, channel_id: Uuid) -> ServiceResult<usize> {
        Ok(self
            .bindings
            .bindings_for_channel(channel_id)
            .await?
            .iter()
            .filter(|b| b.active)
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Material;
    use crate::repositories::{
        InMemoryBindingRepository, InMemoryChannelRepository, InMemoryCredentialStore,
        InMemoryMaterialRepository,
    };
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    struct Fixture {
        service: ChannelService,
        materials: Arc<InMemoryMaterialRepository>,
        credentials: Arc<InMemoryCredentialStore>,
    }

    fn fixture() -> Fixture {
        let channels = Arc::new(InMemoryChannelRepository::new());
        let bindings = Arc::new(InMemoryBindingRepository::new());
        let credentials = Arc::new(InMemoryCredentialStore::new());
        let materials = Arc::new(InMemoryMaterialRepository::new());
        let service = ChannelService::new(
            channels,
            bindings,
            credentials.clone(),
            materials.clone(),
        );
        Fixture {
            service,
            materials,
            credentials,
        }
    }

    fn shopify_request(name: &str, code: &str) -> CreateChannelRequest {
        CreateChannelRequest {
            name: name.to_string(),
            code: code.to_string(),
            channel_type: ChannelType::Shopify,
            description: None,
            base_url: None,
            webhook_url: None,
            distribution_ratio: None,
        }
    }

    #[tokio::test]
    async fn create_channel_rejects_duplicate_code_and_name() {
        let fx = fixture();
        fx.service
            .create_channel(shopify_request("EU Shop", "shop-eu"))
            .await
            .unwrap();

        let dup_code = fx
            .service
            .create_channel(shopify_request("Other", "shop-eu"))
            .await
            .unwrap_err();
        assert_matches!(dup_code, ServiceError::ValidationError(_));

        let dup_name = fx
            .service
            .create_channel(shopify_request("EU Shop", "shop-eu-2"))
            .await
            .unwrap_err();
        assert_matches!(dup_name, ServiceError::ValidationError(_));
    }

    #[tokio::test]
    async fn create_channel_rejects_blank_name() {
        let fx = fixture();
        let err = fx
            .service
            .create_channel(shopify_request("", "shop-eu"))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    #[tokio::test]
    async fn update_and_set_active_round_trip() {
        let fx = fixture();
        let channel = fx
            .service
            .create_channel(shopify_request("EU Shop", "shop-eu"))
            .await
            .unwrap();

        let updated = fx
            .service
            .update_channel(
                channel.id,
                UpdateChannelRequest {
                    distribution_ratio: Some(40),
                    description: Some("primary".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.distribution_ratio, Some(40));
        assert_eq!(updated.description.as_deref(), Some("primary"));
        assert_eq!(updated.code, "shop-eu");

        fx.service.set_active(channel.id, false).await.unwrap();
        assert!(fx.service.list_active_channels().await.unwrap().is_empty());
        assert_eq!(fx.service.list_channels().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn credential_upsert_reactivates_and_replaces_value() {
        let fx = fixture();
        let channel = fx
            .service
            .create_channel(shopify_request("EU Shop", "shop-eu"))
            .await
            .unwrap();

        let first = fx
            .service
            .save_credential(channel.id, "API_KEY", "secret-1")
            .await
            .unwrap();
        let mut deactivated = first.clone();
        deactivated.active = false;
        fx.credentials.save(deactivated).await.unwrap();

        let second = fx
            .service
            .save_credential(channel.id, "API_KEY", "secret-2")
            .await
            .unwrap();
        assert_eq!(second.id, first.id);
        assert!(second.active);
        assert_eq!(
            fx.service
                .get_credential(channel.id, "API_KEY")
                .await
                .unwrap()
                .as_deref(),
            Some("secret-2")
        );
        assert_eq!(fx.credentials.find(channel.id).await.unwrap().len(), 1);

        assert!(fx
            .service
            .get_credential(channel.id, "WEBHOOK_SECRET")
            .await
            .unwrap()
            .is_none());

        fx.service
            .delete_credential(channel.id, "API_KEY")
            .await
            .unwrap();
        let err = fx
            .service
            .delete_credential(channel.id, "API_KEY")
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
    }

    #[tokio::test]
    async fn binding_defaults_come_from_the_material() {
        let fx = fixture();
        let channel = fx
            .service
            .create_channel(shopify_request("EU Shop", "shop-eu"))
            .await
            .unwrap();
        let mut material = Material::new("M-1", "Widget", "pcs");
        material.current_stock = dec!(7.9);
        material.average_cost = dec!(2.50);
        fx.materials.save(material.clone()).await.unwrap();

        let binding = fx
            .service
            .create_binding(channel.id, material.id, "EXT-1")
            .await
            .unwrap();
        assert_eq!(binding.external_sku.as_deref(), Some("M-1"));
        assert_eq!(binding.price, Some(dec!(2.50)));
        assert_eq!(binding.stock, 7);
        assert!(binding.active);

        let dup = fx
            .service
            .create_binding(channel.id, material.id, "EXT-2")
            .await
            .unwrap_err();
        assert_matches!(dup, ServiceError::ValidationError(_));

        let missing = fx
            .service
            .create_binding(Uuid::new_v4(), material.id, "EXT-3")
            .await
            .unwrap_err();
        assert_matches!(missing, ServiceError::NotFound(_));
    }

    #[tokio::test]
    async fn channels_needing_sync_requires_an_active_binding() {
        let fx = fixture();
        let with_binding = fx
            .service
            .create_channel(shopify_request("EU Shop", "shop-eu"))
            .await
            .unwrap();
        let empty = fx
            .service
            .create_channel(shopify_request("US Shop", "shop-us"))
            .await
            .unwrap();
        let inactive_binding = fx
            .service
            .create_channel(shopify_request("UK Shop", "shop-uk"))
            .await
            .unwrap();

        let material = Material::new("M-1", "Widget", "pcs");
        fx.materials.save(material.clone()).await.unwrap();

        fx.service
            .create_binding(with_binding.id, material.id, "EXT-1")
            .await
            .unwrap();
        let dormant = fx
            .service
            .create_binding(inactive_binding.id, material.id, "EXT-2")
            .await
            .unwrap();
        fx.service
            .update_binding(
                dormant.id,
                UpdateBindingRequest {
                    active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let due = fx.service.channels_needing_sync().await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, with_binding.id);

        assert_eq!(
            fx.service.count_active_bindings(with_binding.id).await.unwrap(),
            1
        );
        assert_eq!(
            fx.service
                .count_active_bindings(inactive_binding.id)
                .await
                .unwrap(),
            0
        );
        let _ = empty;
    }

    #[tokio::test]
    async fn mark_binding_synced_stamps_last_sync() {
        let fx = fixture();
        let channel = fx
            .service
            .create_channel(shopify_request("EU Shop", "shop-eu"))
            .await
            .unwrap();
        let material = Material::new("M-1", "Widget", "pcs");
        fx.materials.save(material.clone()).await.unwrap();
        let binding = fx
            .service
            .create_binding(channel.id, material.id, "EXT-1")
            .await
            .unwrap();
        assert!(binding.last_sync_at.is_none());

        let synced = fx.service.mark_binding_synced(binding.id).await.unwrap();
        assert!(synced.last_sync_at.is_some());
    }
}
