//! Accrual arithmetic shared by every staking variant

use serde::{Deserialize, Serialize};

use crate::core::config::AccrualPolicy;
use crate::core::types::{RateClass, Tick};
use crate::stake::ledger::StakeRecord;

/// Settlement-time scaling held by the caller, in percent (100 = x1)
///
/// Never stored in a record: the same stake settles at whatever multiplier
/// the caller holds at claim time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Multiplier(pub u64);

impl Multiplier {
    pub const UNIT: Multiplier = Multiplier(100);

    pub fn percent(percent: u64) -> Self {
        Self(percent)
    }

    pub fn apply(&self, amount: u64) -> u64 {
        let scaled = amount as u128 * self.0 as u128 / 100;
        u64::try_from(scaled).unwrap_or(u64::MAX)
    }
}

impl Default for Multiplier {
    fn default() -> Self {
        Self::UNIT
    }
}

impl AccrualPolicy {
    pub fn rate(&self, class: RateClass) -> Option<u64> {
        self.rates.get(class.0 as usize).copied()
    }

    /// Whole accruing units in `principal`
    pub fn units(&self, principal: u64) -> u64 {
        principal / self.unit_size.max(1)
    }

    /// `elapsed * rate * units` since the record's start tick
    ///
    /// Excludes the record's banked amount.
    pub fn accrue(&self, record: &StakeRecord, now: Tick) -> u64 {
        let elapsed = now.saturating_sub(record.start_tick) as u128;
        let rate = self.rate(record.rate_class).unwrap_or(0) as u128;
        let units = self.units(record.principal) as u128;
        u64::try_from(elapsed * rate * units).unwrap_or(u64::MAX)
    }

    /// First tick at which the record may be settled
    pub fn ready_at(&self, record: &StakeRecord) -> Tick {
        record.start_tick.saturating_add(self.min_window)
    }
}
