//! Realm Ledger - deterministic game economy core
//!
//! Resource decay, lazy-accrual staking, power aggregation, faction contests
//! and periodic hazards over an externally supplied tick.

pub mod contest;
pub mod core;
pub mod decay;
pub mod economy;
pub mod events;
pub mod hazard;
pub mod power;
pub mod registry;
pub mod stake;

pub use economy::{Audit, Economy};
