// Core engines
pub mod atp;
pub mod bom;
pub mod distribution;

// Channel-facing services
pub mod channels;
pub mod sync;

// Warehouse ledger
pub mod stock_movements;

pub use atp::AtpService;
pub use bom::BomService;
pub use channels::ChannelService;
pub use stock_movements::StockMovementService;
pub use sync::{start_sync_scheduler, SyncService};
