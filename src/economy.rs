//! The economy facade
//!
//! `Economy` owns every store and threads them explicitly into each
//! operation. Each method validates everything it can before its first
//! write, so an `Err` leaves the economy exactly as it was.

use serde::{Deserialize, Serialize};

use crate::contest::resolver::{self, Resolution, ResolveContext};
use crate::contest::{ContestBook, ContestTerms, TitleBook};
use crate::core::config::EconomyConfig;
use crate::core::entropy::{EntropySource, HashEntropy};
use crate::core::error::{Capacity, EconomyError, Result, Subject};
use crate::core::types::{ContestId, Depth, Faction, ParticipantId, RateClass, Rarity, ResourceId, StakeKind, Tick};
use crate::decay::DecayLedger;
use crate::events::{EventKind, EventLog};
use crate::hazard::{EventRandomizer, SweepReport};
use crate::power::{PowerAggregator, PowerBreakdown};
use crate::registry::{Account, BalanceBook, BalanceLedger, OwnershipRegistry, ResourceRegistry};
use crate::stake::{Closure, Multiplier, StakeLedger, StakeRecord, Withdrawal};

/// Aggregate counters for conservation checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    pub total_minted: u64,
    pub total_burned: u64,
    pub total_supply: u64,
    /// Principal held by each ledger: mining, devotion
    pub staked: [u64; 2],
    /// Balance held in each escrow account: mining, devotion
    pub escrowed: [u64; 2],
    pub stake_rewards: u64,
    pub confiscated: u64,
    pub contest_payouts: u64,
    pub resources: usize,
    pub events: usize,
}

pub struct Economy {
    config: EconomyConfig,
    registry: ResourceRegistry,
    balances: BalanceBook,
    decay: DecayLedger,
    mining: StakeLedger,
    devotion: StakeLedger,
    titles: TitleBook,
    contests: ContestBook,
    hazards: EventRandomizer,
    entropy: Box<dyn EntropySource>,
    events: EventLog,
}

impl Economy {
    /// Build an empty economy. The treasury is the only approved minter.
    pub fn new(config: EconomyConfig, genesis: Tick) -> Self {
        let mut balances = BalanceBook::new();
        balances.approve_minter(Account::Treasury);

        Self {
            registry: ResourceRegistry::new(config.registry.max_holdings),
            balances,
            decay: DecayLedger::new(&config.decay),
            mining: StakeLedger::new(StakeKind::Mining, config.stake.mining.clone(), config.stake.max_population),
            devotion: StakeLedger::new(
                StakeKind::Devotion,
                config.stake.devotion.clone(),
                config.stake.max_population,
            ),
            titles: TitleBook::new(&config.titles),
            contests: ContestBook::new(config.contest.max_roster),
            hazards: EventRandomizer::new(&config.hazard, genesis),
            entropy: Box::new(HashEntropy),
            events: EventLog::new(),
            config,
        }
    }

    /// Replace the entropy source, e.g. with a scripted one in tests
    pub fn with_entropy(mut self, entropy: impl EntropySource + 'static) -> Self {
        self.entropy = Box::new(entropy);
        self
    }

    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn balances(&self) -> &BalanceBook {
        &self.balances
    }

    /// Approve or revoke an account's right to mint
    pub fn set_minter(&mut self, minter: Account, approved: bool) {
        if approved {
            self.balances.approve_minter(minter);
        } else {
            self.balances.revoke_minter(minter);
        }
    }

    pub fn decay(&self) -> &DecayLedger {
        &self.decay
    }

    pub fn ledger(&self, kind: StakeKind) -> &StakeLedger {
        match kind {
            StakeKind::Mining => &self.mining,
            StakeKind::Devotion => &self.devotion,
        }
    }

    pub fn titles(&self) -> &TitleBook {
        &self.titles
    }

    pub fn contests(&self) -> &ContestBook {
        &self.contests
    }

    pub fn hazards(&self) -> &EventRandomizer {
        &self.hazards
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn balance_of(&self, participant: ParticipantId) -> u64 {
        self.balances.balance_of(participant.into())
    }

    /// Credit a participant from the treasury
    pub fn fund(&mut self, participant: ParticipantId, amount: u64) -> Result<()> {
        self.balances.mint(Account::Treasury, participant.into(), amount)
    }

    // ------------------------------------------------------------------
    // Resources and decay
    // ------------------------------------------------------------------

    fn check_not_decayed(&self, owner: ParticipantId, now: Tick) -> Result<()> {
        if self.decay.is_decayed(owner, &self.registry, now) {
            return Err(EconomyError::CapacityExceeded(Capacity::Decayed {
                owner,
                level: self.decay.current_level(owner, &self.registry, now),
            }));
        }
        Ok(())
    }

    /// Create a resource for `owner`. Decayed owners may not acquire.
    pub fn mint_resource(
        &mut self,
        owner: ParticipantId,
        rarity: Rarity,
        label: Option<String>,
        now: Tick,
    ) -> Result<ResourceId> {
        self.check_not_decayed(owner, now)?;
        let resource = self.registry.mint(owner, rarity, label)?;
        self.decay.on_acquire(owner, resource, now);

        tracing::debug!("{} acquired new {:?} resource {}", owner, rarity, resource);
        self.events.record(now, EventKind::ResourceAcquired { owner, resource, rarity, from: None });
        Ok(resource)
    }

    /// Move a resource between holders
    ///
    /// The releaser's decay is committed first so the window they held it for
    /// stays theirs; the receiver's window for it starts at `now`.
    pub fn transfer_resource(&mut self, resource: ResourceId, to: ParticipantId, now: Tick) -> Result<()> {
        let from = self.registry.check_transfer(resource, to)?;
        self.check_not_decayed(to, now)?;
        let rarity = self
            .registry
            .resource(resource)
            .map(|r| r.rarity)
            .ok_or(EconomyError::NotFound(Subject::Resource(resource)))?;

        if self.decay.record(from).is_some() {
            self.decay.commit(from, &self.registry, now, &mut self.events)?;
        }
        self.registry.transfer(resource, to)?;
        self.decay.on_release(resource);
        self.decay.on_acquire(to, resource, now);

        tracing::debug!("{} moved from {} to {}", resource, from, to);
        self.events.record(now, EventKind::ResourceReleased { owner: from, resource });
        self.events.record(now, EventKind::ResourceAcquired { owner: to, resource, rarity, from: Some(from) });
        Ok(())
    }

    /// Destroy a resource after committing its holder's decay
    pub fn destroy_resource(&mut self, resource: ResourceId, now: Tick) -> Result<()> {
        let owner = self
            .registry
            .owner_of(resource)
            .ok_or(EconomyError::NotFound(Subject::Resource(resource)))?;

        if self.decay.record(owner).is_some() {
            self.decay.commit(owner, &self.registry, now, &mut self.events)?;
        }
        self.registry.burn(resource)?;
        self.decay.on_release(resource);

        tracing::debug!("{} destroyed {}", owner, resource);
        self.events.record(now, EventKind::ResourceDestroyed { owner, resource });
        Ok(())
    }

    pub fn current_level(&self, owner: ParticipantId, now: Tick) -> u64 {
        self.decay.current_level(owner, &self.registry, now)
    }

    pub fn is_decayed(&self, owner: ParticipantId, now: Tick) -> bool {
        self.decay.is_decayed(owner, &self.registry, now)
    }

    pub fn commit_decay(&mut self, owner: ParticipantId, now: Tick) -> Result<u64> {
        self.decay.commit(owner, &self.registry, now, &mut self.events)
    }

    /// Burn `amount * cleanse_price` from the owner and remove `amount` levels
    pub fn purify(&mut self, owner: ParticipantId, amount: u64, now: Tick) -> Result<u64> {
        if self.decay.record(owner).is_none() {
            return Err(EconomyError::NotFound(Subject::Owner(owner)));
        }
        let cost = amount
            .checked_mul(self.config.decay.cleanse_price)
            .ok_or_else(|| EconomyError::InvalidParameter(format!("purifying {} levels overflows", amount)))?;

        if cost > 0 {
            self.balances.burn(owner.into(), cost)?;
        }
        self.decay.cleanse(owner, amount, &self.registry, now, &mut self.events)
    }

    // ------------------------------------------------------------------
    // Power
    // ------------------------------------------------------------------

    pub fn power_breakdown(&self, participant: ParticipantId) -> PowerBreakdown {
        PowerAggregator::new(&self.config.power, &self.registry, &self.titles).breakdown(participant)
    }

    pub fn power(&self, participant: ParticipantId) -> u64 {
        self.power_breakdown(participant).total()
    }

    // ------------------------------------------------------------------
    // Staking
    // ------------------------------------------------------------------

    /// Settlement multiplier for `owner` in `kind`
    ///
    /// Devotion pays `tier_bonus_percent` extra per title tier; mining is flat.
    pub fn multiplier(&self, kind: StakeKind, owner: ParticipantId) -> Multiplier {
        match kind {
            StakeKind::Mining => Multiplier::UNIT,
            StakeKind::Devotion => {
                let bonus = self.titles.tier(owner).rank() * self.config.stake.tier_bonus_percent;
                Multiplier::percent(100 + bonus)
            }
        }
    }

    /// Stake principal into the mine at `depth`
    pub fn open_mining(
        &mut self,
        owner: ParticipantId,
        principal: u64,
        depth: Depth,
        now: Tick,
    ) -> Result<StakeRecord> {
        self.open_stake(StakeKind::Mining, owner, principal, depth.rate_class(), now)
    }

    /// Pledge belief points
    pub fn open_devotion(&mut self, owner: ParticipantId, principal: u64, now: Tick) -> Result<StakeRecord> {
        self.open_stake(StakeKind::Devotion, owner, principal, RateClass(0), now)
    }

    fn open_stake(
        &mut self,
        kind: StakeKind,
        owner: ParticipantId,
        principal: u64,
        class: RateClass,
        now: Tick,
    ) -> Result<StakeRecord> {
        let ledger = match kind {
            StakeKind::Mining => &mut self.mining,
            StakeKind::Devotion => &mut self.devotion,
        };
        ledger.check_open(owner, principal, class)?;
        self.balances.transfer(owner.into(), Account::Escrow(kind), principal)?;
        ledger.open(owner, principal, class, now, &mut self.events)
    }

    /// Reward owed right now, before the multiplier
    pub fn accrued(&self, kind: StakeKind, owner: ParticipantId, now: Tick) -> Result<u64> {
        self.ledger(kind).accrued(owner, now)
    }

    /// Check the treasury can mint the most `owner` could be paid at `now`
    fn check_treasury(&self, kind: StakeKind, owner: ParticipantId, now: Tick) -> Result<()> {
        if !self.balances.can_mint(Account::Treasury) {
            return Err(EconomyError::NotAuthorized("treasury may not mint stake rewards".into()));
        }
        let owed = self.ledger(kind).accrued(owner, now).unwrap_or(0);
        self.balances.check_mint(Account::Treasury, self.multiplier(kind, owner).apply(owed))
    }

    /// Claim accrued reward; the treasury mints it to the owner
    pub fn settle(&mut self, kind: StakeKind, owner: ParticipantId, now: Tick) -> Result<u64> {
        self.check_treasury(kind, owner, now)?;
        let multiplier = self.multiplier(kind, owner);
        let ledger = match kind {
            StakeKind::Mining => &mut self.mining,
            StakeKind::Devotion => &mut self.devotion,
        };

        let amount = ledger.settle(owner, now, multiplier, &mut self.events)?;
        if amount > 0 {
            self.balances.mint(Account::Treasury, owner.into(), amount)?;
        }
        Ok(amount)
    }

    /// Close a stake: principal returns from escrow and the reward is minted
    pub fn close(&mut self, kind: StakeKind, owner: ParticipantId, now: Tick) -> Result<Closure> {
        self.check_treasury(kind, owner, now)?;
        let multiplier = self.multiplier(kind, owner);
        let ledger = match kind {
            StakeKind::Mining => &mut self.mining,
            StakeKind::Devotion => &mut self.devotion,
        };

        let closure = ledger.close(owner, now, multiplier, &mut self.events)?;
        self.balances.transfer(Account::Escrow(kind), owner.into(), closure.principal)?;
        if closure.reward > 0 {
            self.balances.mint(Account::Treasury, owner.into(), closure.reward)?;
        }
        Ok(closure)
    }

    /// Take back part of the principal
    pub fn withdraw(&mut self, kind: StakeKind, owner: ParticipantId, amount: u64, now: Tick) -> Result<Withdrawal> {
        self.check_treasury(kind, owner, now)?;
        let multiplier = self.multiplier(kind, owner);
        let ledger = match kind {
            StakeKind::Mining => &mut self.mining,
            StakeKind::Devotion => &mut self.devotion,
        };

        let withdrawal = ledger.withdraw(owner, amount, now, multiplier, &mut self.events)?;
        self.balances.transfer(Account::Escrow(kind), owner.into(), withdrawal.returned)?;
        if withdrawal.reward > 0 {
            self.balances.mint(Account::Treasury, owner.into(), withdrawal.reward)?;
        }
        Ok(withdrawal)
    }

    // ------------------------------------------------------------------
    // Hazards
    // ------------------------------------------------------------------

    /// Sweep the mines. Confiscated principal is burned from escrow.
    pub fn check_hazards(&mut self, now: Tick, external_entropy: u64) -> Result<SweepReport> {
        self.hazards.check_hazards(
            &mut self.mining,
            &mut self.balances,
            self.entropy.as_mut(),
            now,
            external_entropy,
            &mut self.events,
        )
    }

    /// Free a trapped miner. Returns the fee the rescuer paid.
    pub fn rescue(&mut self, participant: ParticipantId, rescuer: ParticipantId, now: Tick) -> Result<u64> {
        self.hazards.rescue(
            &mut self.mining,
            &self.registry,
            &mut self.balances,
            participant,
            rescuer,
            now,
            &mut self.events,
        )
    }

    // ------------------------------------------------------------------
    // Contests
    // ------------------------------------------------------------------

    /// Register a contest under the next free id
    pub fn create_contest(&mut self, terms: ContestTerms, now: Tick) -> Result<ContestId> {
        let id = self.contests.next_free_id();
        self.configure_contest(id, terms, now)
    }

    /// Register a contest under a caller-chosen id
    pub fn configure_contest(&mut self, contest: ContestId, terms: ContestTerms, now: Tick) -> Result<ContestId> {
        self.contests.configure(contest, terms, now)?;

        tracing::info!(
            "{} configured: pool {}, quorum {}, closes {:?}",
            contest,
            terms.reward_pool,
            terms.quorum_min,
            terms.closes_at
        );
        self.events.record(
            now,
            EventKind::ContestConfigured {
                contest,
                reward_pool: terms.reward_pool,
                quorum: terms.quorum_min,
                closes_at: terms.closes_at,
            },
        );
        Ok(contest)
    }

    pub fn join(&mut self, contest: ContestId, participant: ParticipantId, faction: Faction, now: Tick) -> Result<()> {
        resolver::join(&mut self.contests, contest, participant, faction, now, &mut self.events)
    }

    pub fn resolve(&mut self, contest: ContestId, now: Tick) -> Result<Resolution> {
        resolver::resolve(
            &mut self.contests,
            contest,
            now,
            ResolveContext {
                contest_config: &self.config.contest,
                power_config: &self.config.power,
                registry: &self.registry,
                titles: &mut self.titles,
                balances: &mut self.balances,
                entropy: self.entropy.as_mut(),
                log: &mut self.events,
            },
        )
    }

    pub fn expire(&mut self, contest: ContestId, now: Tick) -> Result<()> {
        resolver::expire(&mut self.contests, &mut self.titles, contest, now, &mut self.events)
    }

    // ------------------------------------------------------------------
    // Audit
    // ------------------------------------------------------------------

    pub fn audit(&self) -> Audit {
        Audit {
            total_minted: self.balances.total_minted(),
            total_burned: self.balances.total_burned(),
            total_supply: self.balances.total_supply(),
            staked: [self.mining.total_staked(), self.devotion.total_staked()],
            escrowed: [
                self.balances.balance_of(Account::Escrow(StakeKind::Mining)),
                self.balances.balance_of(Account::Escrow(StakeKind::Devotion)),
            ],
            stake_rewards: self.mining.total_rewarded().saturating_add(self.devotion.total_rewarded()),
            confiscated: self.mining.total_confiscated(),
            contest_payouts: self.contests.total_paid(),
            resources: self.registry.len(),
            events: self.events.len(),
        }
    }
}
