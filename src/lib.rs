//! Stockpilot
//!
//! Authoritative inventory core for multi-channel commerce: BOM explosion,
//! available-to-promise checks and rate-limited propagation of stock and
//! price changes to external sales channels.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod clients;
pub mod config;
pub mod entities;
pub mod errors;
pub mod events;
pub mod metrics;
pub mod rate_limiter;
pub mod repositories;
pub mod retry;
pub mod services;

pub mod prelude {
    pub use crate::clients::*;
    pub use crate::entities::*;
    pub use crate::errors::*;
    pub use crate::events::*;
    pub use crate::metrics::*;
    pub use crate::rate_limiter::*;
    pub use crate::repositories::*;
    pub use crate::retry::*;
    pub use crate::services::*;
}
