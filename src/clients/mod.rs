/*!
 * Outbound platform clients.
 *
 * Every push runs through a shared transport that takes a token from the
 * channel's rate limit bucket and retries transient failures with constant
 * backoff. The demo clients stop at logging the call they would make; the
 * seam for a real HTTP integration is the [`PlatformClient`] trait.
 *
 * [`PlatformClientFactory`] dispatches on [`ChannelType`] through a lookup
 * table and falls back to a default client for types without a dedicated
 * integration.
 */

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;

use crate::entities::{Channel, ChannelBinding, ChannelType};
use crate::errors::{ServiceError, ServiceResult};
use crate::metrics::SyncMetrics;
use crate::rate_limiter::RateLimiter;
use crate::retry::{execute_with_retry, RetryConfig, RetryOutcome};

/// Rate limit and retry settings shared by the built-in clients.
#[derive(Debug, Clone, Copy)]
pub struct ClientSettings {
    pub rate_limit_capacity: u32,
    pub rate_limit_refill_per_second: f64,
    pub retry: RetryConfig,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            rate_limit_capacity: 5,
            rate_limit_refill_per_second: 1.0,
            retry: RetryConfig::default(),
        }
    }
}

#[async_trait]
pub trait PlatformClient: Send + Sync {
    fn name(&self) -> &'static str;

    async fn update_stock(
        &self,
        channel: &Channel,
        binding: &ChannelBinding,
        stock: i64,
    ) -> ServiceResult<()>;

    async fn update_price(
        &self,
        channel: &Channel,
        binding: &ChannelBinding,
        price: Decimal,
    ) -> ServiceResult<()>;
}

fn display_sku(binding: &ChannelBinding) -> &str {
    binding
        .external_sku
        .as_deref()
        .unwrap_or(&binding.external_product_id)
}

/// Rate-limited, retried delivery shared by the concrete clients.
#[derive(Debug)]
struct Transport {
    name: &'static str,
    limiter: Arc<RateLimiter>,
    metrics: Arc<SyncMetrics>,
    settings: ClientSettings,
}

impl Transport {
    async fn send(&self, channel: &Channel, payload: String) -> ServiceResult<()> {
        let outcome = execute_with_retry(&self.settings.retry, &self.metrics, self.name, || {
            let payload = payload.as_str();
            async move {
                if !self.limiter.try_acquire(
                    &channel.code,
                    self.settings.rate_limit_capacity,
                    self.settings.rate_limit_refill_per_second,
                ) {
                    return Err(ServiceError::RateLimited(format!(
                        "channel {}",
                        channel.code
                    )));
                }
                info!("[{}] {}", self.name, payload);
                Ok(())
            }
        })
        .await;

        match outcome {
            RetryOutcome::Succeeded { .. } => Ok(()),
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => Err(ServiceError::SyncExhausted {
                attempts,
                detail: last_error,
            }),
        }
    }
}

pub struct ShopifyClient {
    transport: Transport,
}

impl ShopifyClient {
    pub fn new(
        limiter: Arc<RateLimiter>,
        metrics: Arc<SyncMetrics>,
        settings: ClientSettings,
    ) -> Self {
        Self {
            transport: Transport {
                name: "shopify",
                limiter,
                metrics,
                settings,
            },
        }
    }
}

#[async_trait]
impl PlatformClient for ShopifyClient {
    fn name(&self) -> &'static str {
        self.transport.name
    }

    async fn update_stock(
        &self,
        channel: &Channel,
        binding: &ChannelBinding,
        stock: i64,
    ) -> ServiceResult<()> {
        let payload = format!(
            "set inventory level for {} on {} to {}",
            display_sku(binding),
            channel.code,
            stock
        );
        self.transport.send(channel, payload).await
    }

    async fn update_price(
        &self,
        channel: &Channel,
        binding: &ChannelBinding,
        price: Decimal,
    ) -> ServiceResult<()> {
        let payload = format!(
            "set variant price for {} on {} to {}",
            display_sku(binding),
            channel.code,
            price
        );
        self.transport.send(channel, payload).await
    }
}

pub struct EbayClient {
    transport: Transport,
}

impl EbayClient {
    pub fn new(
        limiter: Arc<RateLimiter>,
        metrics: Arc<SyncMetrics>,
        settings: ClientSettings,
    ) -> Self {
        Self {
            transport: Transport {
                name: "ebay",
                limiter,
                metrics,
                settings,
            },
        }
    }
}

#[async_trait]
impl PlatformClient for EbayClient {
    fn name(&self) -> &'static str {
        self.transport.name
    }

    async fn update_stock(
        &self,
        channel: &Channel,
        binding: &ChannelBinding,
        stock: i64,
    ) -> ServiceResult<()> {
        let payload = format!(
            "revise listing quantity for {} on {} to {}",
            display_sku(binding),
            channel.code,
            stock
        );
        self.transport.send(channel, payload).await
    }

    async fn update_price(
        &self,
        channel: &Channel,
        binding: &ChannelBinding,
        price: Decimal,
    ) -> ServiceResult<()> {
        let payload = format!(
            "revise listing price for {} on {} to {}",
            display_sku(binding),
            channel.code,
            price
        );
        self.transport.send(channel, payload).await
    }
}

/// Table of clients by channel type with a default fallback.
pub struct PlatformClientFactory {
    clients: HashMap<ChannelType, Arc<dyn PlatformClient>>,
    default_client: Arc<dyn PlatformClient>,
}

impl PlatformClientFactory {
    pub fn new(default_client: Arc<dyn PlatformClient>) -> Self {
        Self {
            clients: HashMap::new(),
            default_client,
        }
    }

    /// Builds the factory with the built-in clients: Shopify and eBay get
    /// dedicated integrations, everything else goes through the Shopify
    /// client as the default.
    pub fn with_defaults(
        limiter: Arc<RateLimiter>,
        metrics: Arc<SyncMetrics>,
        settings: ClientSettings,
    ) -> Self {
        let shopify: Arc<dyn PlatformClient> = Arc::new(ShopifyClient::new(
            Arc::clone(&limiter),
            Arc::clone(&metrics),
            settings,
        ));
        let ebay: Arc<dyn PlatformClient> = Arc::new(EbayClient::new(limiter, metrics, settings));

        let mut factory = Self::new(Arc::clone(&shopify));
        factory.register(ChannelType::Shopify, shopify);
        factory.register(ChannelType::Ebay, ebay);
        factory
    }

    pub fn register(&mut self, channel_type: ChannelType, client: Arc<dyn PlatformClient>) {
        self.clients.insert(channel_type, client);
    }

    pub fn client_for(&self, channel_type: ChannelType) -> Arc<dyn PlatformClient> {
        self.clients
            .get(&channel_type)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.default_client))
    }
}
