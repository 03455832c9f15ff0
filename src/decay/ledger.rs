//! Per-owner corruption ledger
//!
//! Decay is lazy: nothing changes while time passes. `current_level` derives
//! the level from the stored value plus the elapsed ticks of every held
//! resource, and `commit` folds that derivation back into storage.
//!
//! Rates are hundredths of a level per tick. Each held resource is floored on
//! its own, and its sub-level remainder stays with that resource's window, so
//! committing at any cadence yields the same level as one commit at the end.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::config::{DecayConfig, RarityTable};
use crate::core::error::{EconomyError, Result, Subject};
use crate::core::types::{ParticipantId, Rarity, ResourceId, Tick};
use crate::events::{EventKind, EventLog};
use crate::registry::OwnershipRegistry;

/// Rates are expressed per this many ticks-levels
pub const RATE_DENOMINATOR: u64 = 100;

/// Decay state of one owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerDecayRecord {
    pub stored_level: u64,
    pub last_tick_committed: Tick,
    pub flagged: bool,
}

/// Accrual window of one held resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceWindow {
    pub since: Tick,
    /// Hundredths accrued by this resource not yet worth a full level (< 100)
    pub carry: u64,
}

#[derive(Debug, Clone)]
pub struct DecayLedger {
    owners: AHashMap<ParticipantId, OwnerDecayRecord>,
    windows: AHashMap<ResourceId, ResourceWindow>,
    threshold: u64,
    rates: RarityTable,
}

impl DecayLedger {
    pub fn new(config: &DecayConfig) -> Self {
        Self {
            owners: AHashMap::new(),
            windows: AHashMap::new(),
            threshold: config.threshold,
            rates: config.rates,
        }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    pub fn record(&self, owner: ParticipantId) -> Option<&OwnerDecayRecord> {
        self.owners.get(&owner)
    }

    pub fn window(&self, resource: ResourceId) -> Option<ResourceWindow> {
        self.windows.get(&resource).copied()
    }

    pub fn acquired_tick(&self, resource: ResourceId) -> Option<Tick> {
        self.windows.get(&resource).map(|w| w.since)
    }

    /// Hundredths one resource has accrued in its current window, carry included
    fn hundredths(&self, resource: ResourceId, rarity: Rarity, now: Tick) -> u64 {
        let window = self
            .windows
            .get(&resource)
            .copied()
            .unwrap_or(ResourceWindow { since: now, carry: 0 });
        let elapsed = now.saturating_sub(window.since);
        window.carry.saturating_add(elapsed.saturating_mul(self.rates.get(rarity)))
    }

    /// Whole levels accrued by every resource `owner` holds, each floored separately
    fn pending<R: OwnershipRegistry + ?Sized>(&self, owner: ParticipantId, registry: &R, now: Tick) -> u64 {
        registry
            .resources_of(owner)
            .iter()
            .filter_map(|id| {
                let resource = registry.resource(*id)?;
                Some(self.hundredths(*id, resource.rarity, now) / RATE_DENOMINATOR)
            })
            .fold(0u64, |acc, part| acc.saturating_add(part))
    }

    /// Level `owner` would have if committed at `now`. Never mutates.
    pub fn current_level<R: OwnershipRegistry + ?Sized>(&self, owner: ParticipantId, registry: &R, now: Tick) -> u64 {
        let stored = self.owners.get(&owner).map(|r| r.stored_level).unwrap_or(0);
        stored.saturating_add(self.pending(owner, registry, now))
    }

    /// Whether `owner` is at or past the threshold right now, committed or not
    ///
    /// Acquisition is blocked as soon as the derived level reaches the
    /// threshold, before any commit has stored the flag.
    pub fn is_decayed<R: OwnershipRegistry + ?Sized>(&self, owner: ParticipantId, registry: &R, now: Tick) -> bool {
        self.owners.get(&owner).is_some_and(|r| r.flagged) || self.current_level(owner, registry, now) >= self.threshold
    }

    /// Fold pending decay into storage and restart every window at `now`
    ///
    /// Records a threshold event only on the unflagged to flagged edge.
    pub fn commit<R: OwnershipRegistry + ?Sized>(
        &mut self,
        owner: ParticipantId,
        registry: &R,
        now: Tick,
        log: &mut EventLog,
    ) -> Result<u64> {
        if !self.owners.contains_key(&owner) {
            return Err(EconomyError::NotFound(Subject::Owner(owner)));
        }

        let mut gained = 0u64;
        for id in registry.resources_of(owner) {
            let Some(resource) = registry.resource(*id) else {
                continue;
            };
            let total = self.hundredths(*id, resource.rarity, now);
            gained = gained.saturating_add(total / RATE_DENOMINATOR);
            self.windows.insert(*id, ResourceWindow { since: now, carry: total % RATE_DENOMINATOR });
        }

        let threshold = self.threshold;
        let record = self
            .owners
            .get_mut(&owner)
            .ok_or(EconomyError::NotFound(Subject::Owner(owner)))?;
        record.stored_level = record.stored_level.saturating_add(gained);
        record.last_tick_committed = now;
        let was_flagged = record.flagged;
        record.flagged = record.stored_level >= threshold;
        let level = record.stored_level;

        log.record(now, EventKind::DecayCommitted { owner, level });
        if record.flagged && !was_flagged {
            tracing::info!("{} crossed decay threshold at level {}", owner, level);
            log.record(now, EventKind::DecayThresholdCrossed { owner, level });
        }

        Ok(level)
    }

    /// Commit, then remove up to `amount` levels
    pub fn cleanse<R: OwnershipRegistry + ?Sized>(
        &mut self,
        owner: ParticipantId,
        amount: u64,
        registry: &R,
        now: Tick,
        log: &mut EventLog,
    ) -> Result<u64> {
        self.commit(owner, registry, now, log)?;

        let threshold = self.threshold;
        let record = self
            .owners
            .get_mut(&owner)
            .ok_or(EconomyError::NotFound(Subject::Owner(owner)))?;
        record.stored_level = record.stored_level.saturating_sub(amount);
        let level = record.stored_level;
        log.record(now, EventKind::DecayCleansed { owner, amount, level });

        if record.flagged && level < threshold {
            record.flagged = false;
            tracing::info!("{} cleansed below decay threshold (level {})", owner, level);
            log.record(now, EventKind::DecayFlagCleared { owner, level });
        }

        Ok(level)
    }

    /// Start the accrual window of `resource` for its new holder
    ///
    /// Creates the owner's record on first acquisition.
    pub fn on_acquire(&mut self, owner: ParticipantId, resource: ResourceId, now: Tick) {
        self.owners.entry(owner).or_insert(OwnerDecayRecord {
            stored_level: 0,
            last_tick_committed: now,
            flagged: false,
        });
        self.windows.insert(resource, ResourceWindow { since: now, carry: 0 });
    }

    /// Forget the accrual window of a resource leaving its holder
    ///
    /// The holder must be committed first or the window's decay is lost. The
    /// sub-level carry left after that commit is dropped with the window.
    pub fn on_release(&mut self, resource: ResourceId) {
        self.windows.remove(&resource);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Rarity;
    use crate::registry::ResourceRegistry;

    const ALICE: ParticipantId = ParticipantId(1);

    fn setup(rarity: Rarity) -> (DecayLedger, ResourceRegistry, ResourceId) {
        let mut ledger = DecayLedger::new(&DecayConfig::default());
        let mut registry = ResourceRegistry::new(8);
        let id = registry.mint(ALICE, rarity, None).unwrap();
        ledger.on_acquire(ALICE, id, 0);
        (ledger, registry, id)
    }

    #[test]
    fn test_current_level_is_pure() {
        let (ledger, registry, _) = setup(Rarity::Rare);
        // rate 4 -> floor(250 * 4 / 100) = 10
        assert_eq!(ledger.current_level(ALICE, &registry, 250), 10);
        assert_eq!(ledger.current_level(ALICE, &registry, 250), 10);
        assert_eq!(ledger.record(ALICE).map(|r| r.stored_level), Some(0));
    }

    #[test]
    fn test_commit_keeps_carry() {
        let (mut ledger, registry, id) = setup(Rarity::Common);
        let mut log = EventLog::new();

        // 50 ticks at rate 1 is half a level
        assert_eq!(ledger.commit(ALICE, &registry, 50, &mut log).unwrap(), 0);
        assert_eq!(ledger.acquired_tick(id), Some(50));
        assert_eq!(ledger.window(id).map(|w| w.carry), Some(50));

        assert_eq!(ledger.commit(ALICE, &registry, 100, &mut log).unwrap(), 1);
        assert_eq!(ledger.current_level(ALICE, &registry, 100), 1);
        assert_eq!(ledger.window(id).map(|w| w.carry), Some(0));
    }

    #[test]
    fn test_each_resource_floors_separately() {
        let (mut ledger, mut registry, first) = setup(Rarity::Common);
        let second = registry.mint(ALICE, Rarity::Common, None).unwrap();
        ledger.on_acquire(ALICE, second, 0);
        let mut log = EventLog::new();

        // Two half levels do not make a whole one
        assert_eq!(ledger.current_level(ALICE, &registry, 50), 0);
        assert_eq!(ledger.current_level(ALICE, &registry, 100), 2);

        assert_eq!(ledger.commit(ALICE, &registry, 50, &mut log).unwrap(), 0);
        assert_eq!(ledger.window(first).map(|w| w.carry), Some(50));
        assert_eq!(ledger.window(second).map(|w| w.carry), Some(50));
        assert_eq!(ledger.commit(ALICE, &registry, 150, &mut log).unwrap(), 2);
        assert_eq!(ledger.current_level(ALICE, &registry, 199), 2);
        assert_eq!(ledger.current_level(ALICE, &registry, 200), 4);
    }

    #[test]
    fn test_uncommitted_threshold_counts_as_decayed() {
        let mut config = DecayConfig::default();
        config.threshold = 5;
        let mut ledger = DecayLedger::new(&config);
        let mut registry = ResourceRegistry::new(8);
        let id = registry.mint(ALICE, Rarity::Legendary, None).unwrap();
        ledger.on_acquire(ALICE, id, 0);

        assert!(!ledger.is_decayed(ALICE, &registry, 49));
        assert!(ledger.is_decayed(ALICE, &registry, 50));
        assert!(!ledger.record(ALICE).unwrap().flagged);
    }

    #[test]
    fn test_threshold_event_fires_once() {
        let mut config = DecayConfig::default();
        config.threshold = 5;
        let mut ledger = DecayLedger::new(&config);
        let mut registry = ResourceRegistry::new(8);
        let id = registry.mint(ALICE, Rarity::Legendary, None).unwrap();
        ledger.on_acquire(ALICE, id, 0);
        let mut log = EventLog::new();

        ledger.commit(ALICE, &registry, 40, &mut log).unwrap();
        assert!(!ledger.record(ALICE).unwrap().flagged);

        ledger.commit(ALICE, &registry, 60, &mut log).unwrap();
        ledger.commit(ALICE, &registry, 80, &mut log).unwrap();
        ledger.commit(ALICE, &registry, 80, &mut log).unwrap();

        assert!(ledger.record(ALICE).unwrap().flagged);
        assert_eq!(log.count(|k| matches!(k, EventKind::DecayThresholdCrossed { .. })), 1);
    }

    #[test]
    fn test_cleanse_clears_flag() {
        let mut config = DecayConfig::default();
        config.threshold = 5;
        let mut ledger = DecayLedger::new(&config);
        let mut registry = ResourceRegistry::new(8);
        let id = registry.mint(ALICE, Rarity::Legendary, None).unwrap();
        ledger.on_acquire(ALICE, id, 0);
        let mut log = EventLog::new();

        ledger.commit(ALICE, &registry, 100, &mut log).unwrap();
        assert_eq!(ledger.record(ALICE).unwrap().stored_level, 10);

        assert_eq!(ledger.cleanse(ALICE, 3, &registry, 100, &mut log).unwrap(), 7);
        assert!(ledger.record(ALICE).unwrap().flagged);

        assert_eq!(ledger.cleanse(ALICE, 50, &registry, 100, &mut log).unwrap(), 0);
        assert!(!ledger.record(ALICE).unwrap().flagged);
        assert_eq!(log.count(|k| matches!(k, EventKind::DecayFlagCleared { .. })), 1);
    }

    #[test]
    fn test_commit_unknown_owner() {
        let ledger_config = DecayConfig::default();
        let mut ledger = DecayLedger::new(&ledger_config);
        let registry = ResourceRegistry::new(8);
        let mut log = EventLog::new();
        assert_eq!(
            ledger.commit(ALICE, &registry, 10, &mut log),
            Err(EconomyError::NotFound(Subject::Owner(ALICE)))
        );
        assert!(log.is_empty());
    }
}
