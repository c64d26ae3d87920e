#![deny(unreachable_pub)]

// Core modules
mod consts;
mod errors;
mod helpers;
mod prelude;
mod req;

// Shared utilities
pub mod logging;
pub mod metrics;
pub mod serde_utils;
pub mod types;

// Feature modules
pub mod chain;
pub mod config;
pub mod engine;
pub mod identity;
pub mod pricing;
pub mod server;
pub mod store;

// Re-exports
pub use consts::*;
pub use errors::{BidRejection, Error, ErrorKind, HttpErrorKind};
pub use helpers::{identicon_url, truncate_address, Clock, ManualClock, SystemClock};
pub use req::HttpClient;
pub use types::*;
