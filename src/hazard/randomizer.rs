//! Periodic hazard sweep over mining depths
//!
//! At most one sweep per interval. Each depth with a nonzero chance and at
//! least one staker rolls `hash(now, external, depth) mod 100`; a roll below
//! the depth's chance confiscates a fixed share of every active staker's
//! principal there and traps them until someone rescues them.
//!
//! Rolls are computable by anyone who knows the tick and the external value.

use serde::{Deserialize, Serialize};

use crate::core::config::HazardConfig;
use crate::core::entropy::EntropySource;
use crate::core::error::{EconomyError, Result, Subject};
use crate::core::types::{Depth, ParticipantId, Tick};
use crate::events::{EventKind, EventLog};
use crate::registry::{Account, BalanceLedger, OwnershipRegistry};
use crate::stake::StakeLedger;

/// One triggered hazard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardEntry {
    pub tick: Tick,
    pub depth: Depth,
    pub roll: u64,
    pub affected: Vec<ParticipantId>,
    pub amount_confiscated: u64,
}

/// Append-only record of triggered hazards
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HazardLog {
    entries: Vec<HazardEntry>,
}

impl HazardLog {
    pub fn entries(&self) -> &[HazardEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_confiscated(&self) -> u64 {
        self.entries.iter().map(|e| e.amount_confiscated).sum()
    }

    fn append(&mut self, entry: HazardEntry) {
        self.entries.push(entry);
    }
}

/// What one sweep rolled and triggered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub tick: Tick,
    /// Rolls of every depth that was eligible
    pub rolls: Vec<(Depth, u64)>,
    pub triggered: Vec<HazardEntry>,
}

/// A depth whose roll fired, with the cut planned for each active staker
struct Strike {
    depth: Depth,
    roll: u64,
    chance: u64,
    cuts: Vec<(ParticipantId, u64)>,
}

#[derive(Debug, Clone)]
pub struct EventRandomizer {
    interval: Tick,
    chances: Vec<u64>,
    confiscation_percent: u64,
    rescue_fee: u64,
    last_check: Tick,
    log: HazardLog,
}

impl EventRandomizer {
    /// The first sweep is allowed one interval after `genesis`
    pub fn new(config: &HazardConfig, genesis: Tick) -> Self {
        Self {
            interval: config.interval,
            chances: config.chances.clone(),
            confiscation_percent: config.confiscation_percent,
            rescue_fee: config.rescue_fee,
            last_check: genesis,
            log: HazardLog::default(),
        }
    }

    pub fn last_check(&self) -> Tick {
        self.last_check
    }

    pub fn next_check(&self) -> Tick {
        self.last_check.saturating_add(self.interval)
    }

    pub fn log(&self) -> &HazardLog {
        &self.log
    }

    pub fn chance(&self, depth: Depth) -> u64 {
        self.chances.get(depth as usize).copied().unwrap_or(0)
    }

    /// Run a sweep if the interval has elapsed
    ///
    /// Rolls and cuts are planned first. A sweep the escrow cannot cover fails
    /// without moving the gate or confiscating anything.
    pub fn check_hazards<L: BalanceLedger + ?Sized>(
        &mut self,
        stakes: &mut StakeLedger,
        balances: &mut L,
        entropy: &mut dyn EntropySource,
        now: Tick,
        external_entropy: u64,
        log: &mut EventLog,
    ) -> Result<SweepReport> {
        if now.saturating_sub(self.last_check) < self.interval {
            return Err(EconomyError::TemporalGateNotElapsed { ready_at: self.next_check() });
        }

        let mut rolls = Vec::new();
        let mut strikes = Vec::new();
        for depth in Depth::ALL {
            let chance = self.chance(depth);
            let members = stakes.members(depth.rate_class());
            if chance == 0 || members.is_empty() {
                continue;
            }

            let roll = entropy.draw(now, &[external_entropy, depth as u64]) % 100;
            rolls.push((depth, roll));
            if roll >= chance {
                continue;
            }

            let cuts = members
                .iter()
                .filter_map(|m| stakes.confiscation_of(*m, self.confiscation_percent).map(|cut| (*m, cut)))
                .collect();
            strikes.push(Strike { depth, roll, chance, cuts });
        }

        // Escrow must cover every cut before any stake is touched
        let escrow = Account::Escrow(stakes.kind());
        let requested = strikes
            .iter()
            .flat_map(|s| s.cuts.iter())
            .fold(0u64, |acc, (_, cut)| acc.saturating_add(*cut));
        let available = balances.balance_of(escrow);
        if available < requested {
            return Err(EconomyError::InsufficientBalance { requested, available });
        }

        self.last_check = now;
        let mut report = SweepReport { tick: now, rolls, triggered: Vec::new() };
        for Strike { depth, roll, chance, cuts } in strikes {
            let mut affected = Vec::with_capacity(cuts.len());
            let mut confiscated = 0u64;
            for (member, _) in cuts {
                if let Some(cut) = stakes.confiscate(member, self.confiscation_percent, now) {
                    affected.push(member);
                    confiscated = confiscated.saturating_add(cut);
                }
            }
            if confiscated > 0 {
                balances.burn(escrow, confiscated)?;
            }

            tracing::info!(
                "hazard at {:?} depth (roll {} < {}): {} trapped, {} confiscated",
                depth,
                roll,
                chance,
                affected.len(),
                confiscated
            );
            log.record(
                now,
                EventKind::HazardTriggered { depth, roll, affected: affected.clone(), confiscated },
            );

            let entry = HazardEntry { tick: now, depth, roll, affected, amount_confiscated: confiscated };
            self.log.append(entry.clone());
            report.triggered.push(entry);
        }

        Ok(report)
    }

    /// Fee `rescuer` pays; holders of a privileged resource rescue for free
    pub fn rescue_fee_for<R: OwnershipRegistry + ?Sized>(&self, registry: &R, rescuer: ParticipantId) -> u64 {
        let privileged = registry
            .resources_of(rescuer)
            .iter()
            .filter_map(|id| registry.resource(*id))
            .any(|r| r.rarity.is_privileged());
        if privileged {
            0
        } else {
            self.rescue_fee
        }
    }

    /// Free a trapped staker. Returns the fee burned from the rescuer.
    #[allow(clippy::too_many_arguments)]
    pub fn rescue<R: OwnershipRegistry + ?Sized, L: BalanceLedger + ?Sized>(
        &self,
        stakes: &mut StakeLedger,
        registry: &R,
        balances: &mut L,
        participant: ParticipantId,
        rescuer: ParticipantId,
        now: Tick,
        log: &mut EventLog,
    ) -> Result<u64> {
        if rescuer == participant {
            return Err(EconomyError::NotAuthorized(format!("{} cannot rescue themselves", participant)));
        }
        let record = stakes
            .record(participant)
            .ok_or(EconomyError::NotFound(Subject::Stake(stakes.kind(), participant)))?;
        if !record.trapped {
            return Err(EconomyError::NotTrapped(participant));
        }

        let fee = self.rescue_fee_for(registry, rescuer);
        if fee > 0 {
            balances.burn(Account::Participant(rescuer), fee)?;
        }
        stakes.release(participant, now)?;

        tracing::info!("{} rescued {} (fee {})", rescuer, participant, fee);
        log.record(now, EventKind::RescuePerformed { participant, rescuer, fee });
        Ok(fee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AccrualPolicy;
    use crate::core::entropy::ScriptedEntropy;
    use crate::core::types::{Rarity, StakeKind};
    use crate::registry::{BalanceBook, ResourceRegistry};

    const ALICE: ParticipantId = ParticipantId(1);
    const BOB: ParticipantId = ParticipantId(2);

    struct Fixture {
        randomizer: EventRandomizer,
        stakes: StakeLedger,
        balances: BalanceBook,
        log: EventLog,
    }

    fn fixture() -> Fixture {
        let config = HazardConfig { interval: 10, chances: vec![0, 50, 100], confiscation_percent: 20, rescue_fee: 5 };
        let policy = AccrualPolicy { unit_size: 10, rates: vec![1, 1, 1], min_window: 0 };
        let mut stakes = StakeLedger::new(StakeKind::Mining, policy, 8);
        let mut balances = BalanceBook::new();
        balances.approve_minter(Account::Treasury);
        let mut log = EventLog::new();

        for (who, depth) in [(ALICE, Depth::Abyssal), (BOB, Depth::Shallow)] {
            balances.mint(Account::Treasury, Account::Escrow(StakeKind::Mining), 100).unwrap();
            stakes.open(who, 100, depth.rate_class(), 0, &mut log).unwrap();
        }
        balances.mint(Account::Treasury, BOB.into(), 20).unwrap();

        Fixture { randomizer: EventRandomizer::new(&config, 0), stakes, balances, log }
    }

    #[test]
    fn test_interval_gate() {
        let mut f = fixture();
        let mut entropy = ScriptedEntropy::constant(0);
        let err = f
            .randomizer
            .check_hazards(&mut f.stakes, &mut f.balances, &mut entropy, 5, 0, &mut f.log)
            .unwrap_err();
        assert_eq!(err, EconomyError::TemporalGateNotElapsed { ready_at: 10 });
        assert_eq!(f.randomizer.last_check(), 0);
    }

    #[test]
    fn test_trigger_confiscates_and_burns() {
        let mut f = fixture();
        let mut entropy = ScriptedEntropy::constant(42);
        let report = f
            .randomizer
            .check_hazards(&mut f.stakes, &mut f.balances, &mut entropy, 10, 7, &mut f.log)
            .unwrap();

        // Shallow has zero chance, Deep is empty, Abyssal always fires
        assert_eq!(report.rolls, vec![(Depth::Abyssal, 42)]);
        assert_eq!(report.triggered.len(), 1);
        assert_eq!(report.triggered[0].affected, vec![ALICE]);
        assert_eq!(report.triggered[0].amount_confiscated, 20);
        assert!(f.stakes.is_trapped(ALICE));
        assert!(!f.stakes.is_trapped(BOB));
        assert_eq!(f.balances.balance_of(Account::Escrow(StakeKind::Mining)), 180);
        assert_eq!(f.stakes.total_staked(), 180);
        assert_eq!(f.randomizer.log().total_confiscated(), 20);
    }

    #[test]
    fn test_uncovered_sweep_changes_nothing() {
        let mut f = fixture();
        f.balances.burn(Account::Escrow(StakeKind::Mining), 190).unwrap();
        let mut entropy = ScriptedEntropy::constant(0);
        let events = f.log.len();

        let err = f
            .randomizer
            .check_hazards(&mut f.stakes, &mut f.balances, &mut entropy, 10, 0, &mut f.log)
            .unwrap_err();
        assert_eq!(err, EconomyError::InsufficientBalance { requested: 20, available: 10 });
        assert_eq!(f.randomizer.last_check(), 0);
        assert!(!f.stakes.is_trapped(ALICE));
        assert_eq!(f.stakes.record(ALICE).unwrap().principal, 100);
        assert_eq!(f.stakes.total_confiscated(), 0);
        assert!(f.randomizer.log().is_empty());
        assert_eq!(f.log.len(), events);
    }

    #[test]
    fn test_trapped_stakers_are_skipped() {
        let mut f = fixture();
        let mut entropy = ScriptedEntropy::constant(0);
        f.randomizer
            .check_hazards(&mut f.stakes, &mut f.balances, &mut entropy, 10, 0, &mut f.log)
            .unwrap();
        let report = f
            .randomizer
            .check_hazards(&mut f.stakes, &mut f.balances, &mut entropy, 20, 0, &mut f.log)
            .unwrap();

        assert_eq!(report.triggered.len(), 1);
        assert!(report.triggered[0].affected.is_empty());
        assert_eq!(report.triggered[0].amount_confiscated, 0);
        assert_eq!(f.stakes.record(ALICE).unwrap().principal, 80);
    }

    #[test]
    fn test_rescue_rules() {
        let mut f = fixture();
        let mut entropy = ScriptedEntropy::constant(0);
        f.randomizer
            .check_hazards(&mut f.stakes, &mut f.balances, &mut entropy, 10, 0, &mut f.log)
            .unwrap();
        let mut registry = ResourceRegistry::new(4);

        assert!(matches!(
            f.randomizer.rescue(&mut f.stakes, &registry, &mut f.balances, ALICE, ALICE, 11, &mut f.log),
            Err(EconomyError::NotAuthorized(_))
        ));
        assert_eq!(
            f.randomizer.rescue(&mut f.stakes, &registry, &mut f.balances, BOB, ALICE, 11, &mut f.log),
            Err(EconomyError::NotTrapped(BOB))
        );

        // Bob pays the fee
        assert_eq!(
            f.randomizer.rescue(&mut f.stakes, &registry, &mut f.balances, ALICE, BOB, 11, &mut f.log),
            Ok(5)
        );
        assert_eq!(f.balances.balance_of(BOB.into()), 15);
        assert!(!f.stakes.is_trapped(ALICE));

        // Legendary holders rescue for free
        registry.mint(BOB, Rarity::Legendary, None).unwrap();
        assert_eq!(f.randomizer.rescue_fee_for(&registry, BOB), 0);
    }

    #[test]
    fn test_rescue_without_funds_leaves_trap() {
        let mut f = fixture();
        let mut entropy = ScriptedEntropy::constant(0);
        f.randomizer
            .check_hazards(&mut f.stakes, &mut f.balances, &mut entropy, 10, 0, &mut f.log)
            .unwrap();
        let registry = ResourceRegistry::new(4);
        let carol = ParticipantId(3);

        assert!(matches!(
            f.randomizer.rescue(&mut f.stakes, &registry, &mut f.balances, ALICE, carol, 11, &mut f.log),
            Err(EconomyError::InsufficientBalance { .. })
        ));
        assert!(f.stakes.is_trapped(ALICE));
    }
}
