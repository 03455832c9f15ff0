//! Resource decay (corruption) tracking

pub mod ledger;

pub use ledger::{DecayLedger, OwnerDecayRecord, ResourceWindow, RATE_DENOMINATOR};
