//! Lazy-accrual staking ledger
//!
//! A record stores only principal, rate class and the tick its accrual window
//! started. Reward owed is derived on demand from the elapsed window. Every
//! mutation that changes principal or rate first banks what the old terms
//! earned, so no window is ever priced at the wrong terms.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::bounded::BoundedSet;
use crate::core::config::AccrualPolicy;
use crate::core::error::{Capacity, EconomyError, Result, Subject};
use crate::core::types::{ParticipantId, RateClass, StakeKind, Tick};
use crate::events::{EventKind, EventLog};
use crate::stake::policy::Multiplier;

/// Stake held by one owner in one ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeRecord {
    pub principal: u64,
    pub rate_class: RateClass,
    pub start_tick: Tick,
    /// Accrual flushed by a restake, withdrawal or hazard, paid at next settlement
    pub banked: u64,
    pub trapped: bool,
}

/// Result of closing a stake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Closure {
    pub principal: u64,
    pub reward: u64,
    /// Accrual lost by closing inside the claim window
    pub forfeited: u64,
}

/// Result of a withdrawal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Withdrawal {
    pub returned: u64,
    pub reward: u64,
    pub closed: bool,
}

#[derive(Debug, Clone)]
pub struct StakeLedger {
    kind: StakeKind,
    policy: AccrualPolicy,
    records: AHashMap<ParticipantId, StakeRecord>,
    /// Stakers per rate class
    populations: Vec<BoundedSet<ParticipantId>>,
    total_staked: u64,
    total_rewarded: u64,
    total_confiscated: u64,
}

impl StakeLedger {
    pub fn new(kind: StakeKind, policy: AccrualPolicy, max_population: usize) -> Self {
        let populations = policy.rates.iter().map(|_| BoundedSet::new(max_population)).collect();
        Self {
            kind,
            policy,
            records: AHashMap::new(),
            populations,
            total_staked: 0,
            total_rewarded: 0,
            total_confiscated: 0,
        }
    }

    pub fn kind(&self) -> StakeKind {
        self.kind
    }

    pub fn policy(&self) -> &AccrualPolicy {
        &self.policy
    }

    pub fn record(&self, owner: ParticipantId) -> Option<&StakeRecord> {
        self.records.get(&owner)
    }

    pub fn is_trapped(&self, owner: ParticipantId) -> bool {
        self.records.get(&owner).is_some_and(|r| r.trapped)
    }

    /// Stakers in a rate class
    pub fn members(&self, class: RateClass) -> &[ParticipantId] {
        self.populations
            .get(class.0 as usize)
            .map(|p| p.as_slice())
            .unwrap_or(&[])
    }

    /// Principal currently held by all records
    pub fn total_staked(&self) -> u64 {
        self.total_staked
    }

    /// Rewards released by settlements and closures
    pub fn total_rewarded(&self) -> u64 {
        self.total_rewarded
    }

    pub fn total_confiscated(&self) -> u64 {
        self.total_confiscated
    }

    fn existing(&self, owner: ParticipantId) -> Result<&StakeRecord> {
        let record = self
            .records
            .get(&owner)
            .ok_or(EconomyError::NotFound(Subject::Stake(self.kind, owner)))?;
        if record.trapped {
            return Err(EconomyError::Trapped(owner));
        }
        Ok(record)
    }

    /// Reward owed at `now` before any multiplier. Never mutates.
    ///
    /// A trapped stake accrues nothing; only what was banked at confiscation counts.
    pub fn accrued(&self, owner: ParticipantId, now: Tick) -> Result<u64> {
        let record = self
            .records
            .get(&owner)
            .ok_or(EconomyError::NotFound(Subject::Stake(self.kind, owner)))?;
        if record.trapped {
            return Ok(record.banked);
        }
        Ok(record.banked.saturating_add(self.policy.accrue(record, now)))
    }

    /// Validate an open without performing it
    pub fn check_open(&self, owner: ParticipantId, principal: u64, class: RateClass) -> Result<()> {
        if self.policy.rate(class).is_none() {
            return Err(EconomyError::NotFound(Subject::RateClass(self.kind, class)));
        }

        let existing = self.records.get(&owner);
        if existing.is_some_and(|r| r.trapped) {
            return Err(EconomyError::Trapped(owner));
        }

        let combined = existing.map(|r| r.principal).unwrap_or(0).saturating_add(principal);
        if principal == 0 || combined < self.policy.unit_size {
            return Err(EconomyError::InsufficientPrincipal {
                requested: self.policy.unit_size,
                available: combined,
            });
        }

        let moving = existing.map(|r| r.rate_class != class).unwrap_or(true);
        if moving && self.populations[class.0 as usize].is_full() {
            return Err(EconomyError::CapacityExceeded(Capacity::Population {
                ledger: self.kind,
                class,
                capacity: self.populations[class.0 as usize].capacity(),
            }));
        }

        Ok(())
    }

    /// Open a stake, or add to an existing one
    ///
    /// An existing record banks its accrual at the old principal and rate
    /// before the new terms take effect.
    pub fn open(
        &mut self,
        owner: ParticipantId,
        principal: u64,
        class: RateClass,
        now: Tick,
        log: &mut EventLog,
    ) -> Result<StakeRecord> {
        self.check_open(owner, principal, class)?;

        let previous_class = self.records.get(&owner).map(|r| r.rate_class);
        let record = match self.records.get_mut(&owner) {
            Some(record) => {
                let flushed = self.policy.accrue(record, now);
                record.banked = record.banked.saturating_add(flushed);
                record.principal += principal;
                record.rate_class = class;
                record.start_tick = now;
                *record
            }
            None => {
                let record = StakeRecord { principal, rate_class: class, start_tick: now, banked: 0, trapped: false };
                self.records.insert(owner, record);
                record
            }
        };

        if previous_class != Some(class) {
            if let Some(old) = previous_class {
                self.populations[old.0 as usize].remove(&owner);
            }
            if self.populations[class.0 as usize].insert(owner).is_err() {
                tracing::warn!("{} population refused {} after validation", self.kind, owner);
            }
        }

        self.total_staked += principal;
        tracing::debug!("{} staked {} into {} ({})", owner, principal, self.kind, class);
        log.record(
            now,
            EventKind::StakeOpened {
                ledger: self.kind,
                owner,
                added: principal,
                principal: record.principal,
                rate_class: class,
                banked: record.banked,
            },
        );

        Ok(record)
    }

    /// Pay out everything owed and restart the window at `now`
    ///
    /// Inside the claim window this fails with `TemporalGateNotElapsed`
    /// instead of succeeding with zero.
    pub fn settle(
        &mut self,
        owner: ParticipantId,
        now: Tick,
        multiplier: Multiplier,
        log: &mut EventLog,
    ) -> Result<u64> {
        let ready_at = self.policy.ready_at(self.existing(owner)?);
        if now < ready_at {
            return Err(EconomyError::TemporalGateNotElapsed { ready_at });
        }

        let kind = self.kind;
        let record = self
            .records
            .get_mut(&owner)
            .ok_or(EconomyError::NotFound(Subject::Stake(kind, owner)))?;
        let owed = record.banked.saturating_add(self.policy.accrue(record, now));
        let amount = multiplier.apply(owed);
        record.banked = 0;
        record.start_tick = now;

        self.total_rewarded = self.total_rewarded.saturating_add(amount);
        tracing::debug!("{} settled {} from {}", owner, amount, kind);
        log.record(now, EventKind::StakeSettled { ledger: kind, owner, amount });

        Ok(amount)
    }

    /// Return principal and delete the record
    ///
    /// Closing inside the claim window forfeits pending accrual.
    pub fn close(
        &mut self,
        owner: ParticipantId,
        now: Tick,
        multiplier: Multiplier,
        log: &mut EventLog,
    ) -> Result<Closure> {
        let record = *self.existing(owner)?;
        let pending = record.banked.saturating_add(self.policy.accrue(&record, now));
        let (reward, forfeited) = if now >= self.policy.ready_at(&record) {
            (multiplier.apply(pending), 0)
        } else {
            (0, pending)
        };

        self.records.remove(&owner);
        self.populations[record.rate_class.0 as usize].remove(&owner);
        self.total_staked -= record.principal;
        self.total_rewarded = self.total_rewarded.saturating_add(reward);

        tracing::debug!("{} closed {} stake of {} (reward {})", owner, self.kind, record.principal, reward);
        log.record(
            now,
            EventKind::StakeClosed { ledger: self.kind, owner, principal: record.principal, reward, forfeited },
        );

        Ok(Closure { principal: record.principal, reward, forfeited })
    }

    /// Take back part of the principal; withdrawing all of it closes the stake
    pub fn withdraw(
        &mut self,
        owner: ParticipantId,
        amount: u64,
        now: Tick,
        multiplier: Multiplier,
        log: &mut EventLog,
    ) -> Result<Withdrawal> {
        let principal = self.existing(owner)?.principal;
        if amount == 0 {
            return Err(EconomyError::InvalidParameter("withdrawal amount must be positive".into()));
        }
        if amount > principal {
            return Err(EconomyError::InsufficientPrincipal { requested: amount, available: principal });
        }
        if amount == principal {
            let closure = self.close(owner, now, multiplier, log)?;
            return Ok(Withdrawal { returned: closure.principal, reward: closure.reward, closed: true });
        }

        let kind = self.kind;
        let record = self
            .records
            .get_mut(&owner)
            .ok_or(EconomyError::NotFound(Subject::Stake(kind, owner)))?;
        let flushed = self.policy.accrue(record, now);
        record.banked = record.banked.saturating_add(flushed);
        record.start_tick = now;
        record.principal -= amount;
        let remaining = record.principal;
        self.total_staked -= amount;

        log.record(now, EventKind::StakeWithdrawn { ledger: kind, owner, amount, principal: remaining });
        Ok(Withdrawal { returned: amount, reward: 0, closed: false })
    }

    /// Amount `confiscate` would cut from `owner`, without cutting it
    pub fn confiscation_of(&self, owner: ParticipantId, percent: u64) -> Option<u64> {
        let record = self.records.get(&owner).filter(|r| !r.trapped)?;
        Some((record.principal as u128 * percent.min(100) as u128 / 100) as u64)
    }

    /// Confiscate `percent` of an active record's principal and trap it
    ///
    /// Returns `None` for absent or already trapped records.
    pub fn confiscate(&mut self, owner: ParticipantId, percent: u64, now: Tick) -> Option<u64> {
        let cut = self.confiscation_of(owner, percent)?;
        let record = self.records.get_mut(&owner)?;
        let flushed = self.policy.accrue(record, now);
        record.banked = record.banked.saturating_add(flushed);
        record.start_tick = now;

        record.principal -= cut;
        record.trapped = true;

        self.total_staked -= cut;
        self.total_confiscated = self.total_confiscated.saturating_add(cut);
        Some(cut)
    }

    /// Clear a trap. Accrual resumes from `now`; the trapped interval earns nothing.
    pub fn release(&mut self, owner: ParticipantId, now: Tick) -> Result<()> {
        let record = self
            .records
            .get_mut(&owner)
            .ok_or(EconomyError::NotFound(Subject::Stake(self.kind, owner)))?;
        if !record.trapped {
            return Err(EconomyError::NotTrapped(owner));
        }
        record.trapped = false;
        record.start_tick = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: ParticipantId = ParticipantId(1);
    const BOB: ParticipantId = ParticipantId(2);

    fn ledger(min_window: Tick) -> StakeLedger {
        let policy = AccrualPolicy { unit_size: 100, rates: vec![1, 3, 6], min_window };
        StakeLedger::new(StakeKind::Mining, policy, 2)
    }

    #[test]
    fn test_open_and_settle() {
        let mut ledger = ledger(0);
        let mut log = EventLog::new();
        ledger.open(ALICE, 300, RateClass(1), 10, &mut log).unwrap();

        // 3 units * rate 3 * 20 ticks
        assert_eq!(ledger.accrued(ALICE, 30), Ok(180));
        assert_eq!(ledger.settle(ALICE, 30, Multiplier::UNIT, &mut log), Ok(180));
        assert_eq!(ledger.record(ALICE).unwrap().principal, 300);
        assert_eq!(ledger.total_staked(), 300);
        assert_eq!(ledger.total_rewarded(), 180);
    }

    #[test]
    fn test_restake_banks_old_terms() {
        let mut ledger = ledger(0);
        let mut log = EventLog::new();
        ledger.open(ALICE, 100, RateClass(0), 0, &mut log).unwrap();

        // 10 ticks at 1 unit * rate 1 = 10 banked before the move
        let record = ledger.open(ALICE, 100, RateClass(2), 10, &mut log).unwrap();
        assert_eq!(record.banked, 10);
        assert_eq!(record.principal, 200);
        assert_eq!(ledger.members(RateClass(0)), &[] as &[ParticipantId]);
        assert_eq!(ledger.members(RateClass(2)), &[ALICE]);

        // 10 more ticks at 2 units * rate 6 = 120
        assert_eq!(ledger.settle(ALICE, 20, Multiplier::UNIT, &mut log), Ok(130));
    }

    #[test]
    fn test_second_settle_same_tick_is_zero() {
        let mut ledger = ledger(0);
        let mut log = EventLog::new();
        ledger.open(ALICE, 100, RateClass(0), 0, &mut log).unwrap();
        assert_eq!(ledger.settle(ALICE, 50, Multiplier::UNIT, &mut log), Ok(50));
        assert_eq!(ledger.settle(ALICE, 50, Multiplier::UNIT, &mut log), Ok(0));
    }

    #[test]
    fn test_gate_distinguishes_too_soon() {
        let mut ledger = ledger(100);
        let mut log = EventLog::new();
        ledger.open(ALICE, 100, RateClass(0), 0, &mut log).unwrap();

        assert_eq!(
            ledger.settle(ALICE, 99, Multiplier::UNIT, &mut log),
            Err(EconomyError::TemporalGateNotElapsed { ready_at: 100 })
        );
        assert_eq!(ledger.settle(ALICE, 100, Multiplier::percent(150), &mut log), Ok(150));
    }

    #[test]
    fn test_close_inside_window_forfeits() {
        let mut ledger = ledger(100);
        let mut log = EventLog::new();
        ledger.open(ALICE, 200, RateClass(0), 0, &mut log).unwrap();

        let closure = ledger.close(ALICE, 40, Multiplier::UNIT, &mut log).unwrap();
        assert_eq!(closure, Closure { principal: 200, reward: 0, forfeited: 80 });
        assert!(ledger.record(ALICE).is_none());
        assert_eq!(ledger.total_staked(), 0);
    }

    #[test]
    fn test_open_validation() {
        let mut ledger = ledger(0);
        let mut log = EventLog::new();

        assert!(matches!(
            ledger.open(ALICE, 50, RateClass(0), 0, &mut log),
            Err(EconomyError::InsufficientPrincipal { .. })
        ));
        assert_eq!(
            ledger.open(ALICE, 100, RateClass(5), 0, &mut log),
            Err(EconomyError::NotFound(Subject::RateClass(StakeKind::Mining, RateClass(5))))
        );

        ledger.open(ALICE, 100, RateClass(0), 0, &mut log).unwrap();
        ledger.open(BOB, 100, RateClass(0), 0, &mut log).unwrap();
        let carol = ParticipantId(3);
        assert!(matches!(
            ledger.open(carol, 100, RateClass(0), 0, &mut log),
            Err(EconomyError::CapacityExceeded(Capacity::Population { .. }))
        ));
        // Topping up an existing member of a full class is allowed
        assert!(ledger.open(ALICE, 100, RateClass(0), 5, &mut log).is_ok());
    }

    #[test]
    fn test_partial_withdraw_then_full() {
        let mut ledger = ledger(0);
        let mut log = EventLog::new();
        ledger.open(ALICE, 300, RateClass(0), 0, &mut log).unwrap();

        let partial = ledger.withdraw(ALICE, 100, 10, Multiplier::UNIT, &mut log).unwrap();
        assert_eq!(partial, Withdrawal { returned: 100, reward: 0, closed: false });
        assert_eq!(ledger.record(ALICE).unwrap().banked, 30);

        assert_eq!(
            ledger.withdraw(ALICE, 500, 10, Multiplier::UNIT, &mut log),
            Err(EconomyError::InsufficientPrincipal { requested: 500, available: 200 })
        );

        // 30 banked + 10 ticks * 2 units
        let full = ledger.withdraw(ALICE, 200, 20, Multiplier::UNIT, &mut log).unwrap();
        assert_eq!(full, Withdrawal { returned: 200, reward: 50, closed: true });
        assert_eq!(ledger.total_staked(), 0);
    }

    #[test]
    fn test_trap_blocks_everything_until_release() {
        let mut ledger = ledger(0);
        let mut log = EventLog::new();
        ledger.open(ALICE, 500, RateClass(2), 0, &mut log).unwrap();

        // 10 ticks * 5 units * 6 banked before the cut
        assert_eq!(ledger.confiscate(ALICE, 20, 10), Some(100));
        assert_eq!(ledger.confiscate(ALICE, 20, 10), None);
        let record = ledger.record(ALICE).unwrap();
        assert_eq!((record.principal, record.banked, record.trapped), (400, 300, true));
        assert_eq!(ledger.total_staked(), 400);
        assert_eq!(ledger.total_confiscated(), 100);
        assert_eq!(ledger.confiscation_of(ALICE, 20), None);

        // Trapped stakes report only what was banked
        assert_eq!(ledger.accrued(ALICE, 40), Ok(300));
        assert_eq!(ledger.accrued(ALICE, 1_000), Ok(300));

        assert_eq!(ledger.settle(ALICE, 20, Multiplier::UNIT, &mut log), Err(EconomyError::Trapped(ALICE)));
        assert_eq!(ledger.open(ALICE, 100, RateClass(2), 20, &mut log), Err(EconomyError::Trapped(ALICE)));
        assert!(ledger.close(ALICE, 20, Multiplier::UNIT, &mut log).is_err());

        ledger.release(ALICE, 50).unwrap();
        assert_eq!(ledger.release(ALICE, 50), Err(EconomyError::NotTrapped(ALICE)));
        // Nothing accrued between 10 and 50
        assert_eq!(ledger.accrued(ALICE, 50), Ok(300));
        // 4 units * 6 * 10 ticks after release
        assert_eq!(ledger.accrued(ALICE, 60), Ok(540));
        assert_eq!(ledger.confiscation_of(ALICE, 20), Some(80));
    }
}
