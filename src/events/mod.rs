use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::entities::MovementType;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the receiver is gone.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            error!("Dropping event: {}", e);
        }
    }
}

/// Creates a bounded event channel.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

// Define the various events that can occur in the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Channel sync events
    StockSynced {
        channel_id: Uuid,
        material_id: Uuid,
        stock: i64,
    },
    PriceSynced {
        channel_id: Uuid,
        material_id: Uuid,
        price: Decimal,
    },
    SyncFailed {
        channel_id: Uuid,
        material_id: Option<Uuid>,
        detail: String,
    },
    ChannelSyncCompleted {
        channel_id: Uuid,
        bindings: usize,
    },

    // Propagation events
    StockPropagated {
        material_id: Uuid,
        delta: i64,
        channels: usize,
    },
    PricePropagated {
        material_id: Uuid,
        price: Decimal,
        channels: usize,
    },

    // Warehouse events
    MovementRecorded {
        movement_id: Uuid,
        material_id: Uuid,
        movement_type: MovementType,
    },
    LowStockDetected {
        material_id: Uuid,
        current_stock: Decimal,
        minimum_stock: Decimal,
    },

    // Generic event for custom messages
    Generic {
        message: String,
        timestamp: DateTime<Utc>,
        metadata: serde_json::Value,
    },
}

impl Event {
    /// Create a generic event with string data
    pub fn with_data(data: String) -> Self {
        Event::Generic {
            message: data,
            timestamp: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }
}

// Function to process incoming events. Runs until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::StockSynced {
                channel_id,
                material_id,
                stock,
            } => {
                info!(
                    "Stock synced: channel={}, material={}, stock={}",
                    channel_id, material_id, stock
                );
            }
            Event::PriceSynced {
                channel_id,
                material_id,
                price,
            } => {
                info!(
                    "Price synced: channel={}, material={}, price={}",
                    channel_id, material_id, price
                );
            }
            Event::SyncFailed {
                channel_id,
                material_id,
                detail,
            } => {
                if let Err(e) = handle_sync_failure(channel_id, material_id, &detail).await {
                    error!(
                        "Failed to handle sync failure event: channel_id={}, error={}",
                        channel_id, e
                    );
                }
            }
            Event::ChannelSyncCompleted {
                channel_id,
                bindings,
            } => {
                info!(
                    "Channel sync completed: channel={}, bindings={}",
                    channel_id, bindings
                );
            }
            Event::StockPropagated {
                material_id,
                delta,
                channels,
            } => {
                info!(
                    "Stock change of {} propagated for material {} across {} channel(s)",
                    delta, material_id, channels
                );
            }
            Event::LowStockDetected {
                material_id,
                current_stock,
                minimum_stock,
            } => {
                if let Err(e) =
                    handle_low_stock(material_id, current_stock, minimum_stock).await
                {
                    error!(
                        "Failed to handle low stock event: material_id={}, error={}",
                        material_id, e
                    );
                }
            }
            _ => {
                info!("No specific handler for event: {:?}", event);
            }
        }
    }

    warn!("Event processing loop has ended");
}

// Handler functions for specific events
async fn handle_sync_failure(
    channel_id: Uuid,
    material_id: Option<Uuid>,
    detail: &str,
) -> Result<(), String> {
    warn!(
        "Channel sync failure: channel={}, material={:?}, detail={}",
        channel_id, material_id, detail
    );

    // Failed pushes stay visible in the sync journal for operators to replay
    Ok(())
}

async fn handle_low_stock(
    material_id: Uuid,
    current_stock: Decimal,
    minimum_stock: Decimal,
) -> Result<(), String> {
    warn!(
        "Low stock alert: material {} has {} units, minimum is {}",
        material_id, current_stock, minimum_stock
    );

    // Replenishment suggestions are produced by the ATP recommendation report
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (sender, mut rx) = channel(8);
        let id = Uuid::new_v4();

        sender
            .send(Event::ChannelSyncCompleted {
                channel_id: id,
                bindings: 3,
            })
            .await
            .unwrap();

        match rx.recv().await {
            Some(Event::ChannelSyncCompleted {
                channel_id,
                bindings,
            }) => {
                assert_eq!(channel_id, id);
                assert_eq!(bindings, 3);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_fails_once_receiver_is_dropped() {
        let (sender, rx) = channel(1);
        drop(rx);

        let result = sender.send(Event::with_data("ping".to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn processing_loop_drains_queue_and_exits() {
        let (sender, rx) = channel(8);
        sender
            .send(Event::StockPropagated {
                material_id: Uuid::new_v4(),
                delta: -5,
                channels: 2,
            })
            .await
            .unwrap();
        drop(sender);

        // returns once the channel closes
        process_events(rx).await;
    }
}
