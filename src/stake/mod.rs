//! Generic lazy-accrual staking shared by mining and devotion

pub mod ledger;
pub mod policy;

pub use ledger::{Closure, StakeLedger, StakeRecord, Withdrawal};
pub use policy::Multiplier;
