//! Read-model and ledger type definitions.

mod auction;
mod bid;
mod common;
mod ledger;
mod user;

pub use auction::*;
pub use bid::*;
pub use common::*;
pub use ledger::*;
pub use user::*;
