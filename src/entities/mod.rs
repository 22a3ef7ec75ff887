/*!
 * Domain entities for the inventory core.
 *
 * These are plain data types; persistence lives behind the repository
 * traits in [`crate::repositories`]. Monetary and quantity fields use
 * `rust_decimal::Decimal` throughout.
 */

pub mod bom_edge;
pub mod channel;
pub mod channel_binding;
pub mod credential;
pub mod material;
pub mod stock_movement;
pub mod sync_record;

pub use bom_edge::{BomEdge, EdgeStatus};
pub use channel::{Channel, ChannelType};
pub use channel_binding::ChannelBinding;
pub use credential::{ChannelCredential, API_KEY_CREDENTIAL};
pub use material::{Material, MaterialStatus};
pub use stock_movement::{MovementType, StockMovement};
pub use sync_record::{SyncAction, SyncRecord, SyncStatus};
