//! Contest joining, resolution and expiry
//!
//! Resolution compares the summed power of both rosters plus a bounded jitter
//! drawn from the entropy source. On exactly equal totals Dawn wins. That rule
//! is part of the game and is covered by tests; do not replace it with a draw.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::contest::record::{ContestBook, Outcome};
use crate::contest::title::TitleBook;
use crate::core::bounded::BoundedInsert;
use crate::core::config::{ContestConfig, PowerConfig};
use crate::core::entropy::EntropySource;
use crate::core::error::{Capacity, EconomyError, Result};
use crate::core::types::{ContestId, Faction, ParticipantId, Tick, TitleTier};
use crate::events::{EventKind, EventLog};
use crate::power::PowerAggregator;
use crate::registry::{Account, BalanceLedger, OwnershipRegistry};

/// Side that wins when both totals are equal
pub const TIE_BREAK_FACTION: Faction = Faction::Dawn;

/// What a successful resolution did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub contest: ContestId,
    pub winner: Faction,
    pub power: [u64; 2],
    pub jitter: [u64; 2],
    pub reward_per_winner: u64,
    pub paid: u64,
    pub winners: Vec<ParticipantId>,
    pub losers: Vec<ParticipantId>,
    pub promotions: Vec<(ParticipantId, TitleTier)>,
}

/// Jitter for one side: `hash(now, side, contest) mod (roster * per_member)`
pub fn jitter(
    entropy: &mut dyn EntropySource,
    now: Tick,
    contest: ContestId,
    faction: Faction,
    roster_size: usize,
    per_member: u64,
) -> u64 {
    let modulus = (roster_size as u64).saturating_mul(per_member);
    if modulus == 0 {
        return 0;
    }
    entropy.draw(now, &[faction.tag(), contest.0 as u64]) % modulus
}

/// Winner of two totals, Dawn first
pub fn winner_of(power: [u64; 2]) -> Faction {
    match power[0].cmp(&power[1]) {
        Ordering::Greater => Faction::Dawn,
        Ordering::Less => Faction::Dusk,
        Ordering::Equal => TIE_BREAK_FACTION,
    }
}

/// Add `participant` to a faction roster
pub fn join(
    book: &mut ContestBook,
    contest: ContestId,
    participant: ParticipantId,
    faction: Faction,
    now: Tick,
    log: &mut EventLog,
) -> Result<()> {
    let record = book.get_mut(contest)?;
    if !record.is_open() {
        return Err(EconomyError::AlreadyResolved(contest));
    }
    if record.faction_of(participant).is_some() {
        return Err(EconomyError::AlreadyJoined { contest, participant });
    }

    let roster = record.roster_mut(faction);
    let capacity = roster.capacity();
    match roster.insert(participant) {
        Ok(_) => {}
        Err(BoundedInsert::Full) => {
            return Err(EconomyError::CapacityExceeded(Capacity::FactionFull { contest, faction, capacity }));
        }
        Err(BoundedInsert::Duplicate) => {
            return Err(EconomyError::AlreadyJoined { contest, participant });
        }
    }

    tracing::debug!("{} joined {} for {:?}", participant, contest, faction);
    log.record(now, EventKind::ContestJoined { contest, participant, faction });
    Ok(())
}

/// Everything `resolve` needs to read or write besides the contest itself
pub struct ResolveContext<'a, R: OwnershipRegistry + ?Sized, L: BalanceLedger + ?Sized> {
    pub contest_config: &'a ContestConfig,
    pub power_config: &'a PowerConfig,
    pub registry: &'a R,
    pub titles: &'a mut TitleBook,
    pub balances: &'a mut L,
    pub entropy: &'a mut dyn EntropySource,
    pub log: &'a mut EventLog,
}

/// Resolve an open contest that has quorum on both sides
///
/// Each winner is minted `floor(pool / winners)`; the remainder stays unissued.
pub fn resolve<R: OwnershipRegistry + ?Sized, L: BalanceLedger + ?Sized>(
    book: &mut ContestBook,
    contest: ContestId,
    now: Tick,
    ctx: ResolveContext<'_, R, L>,
) -> Result<Resolution> {
    let record = book.get(contest)?;
    if !record.is_open() {
        return Err(EconomyError::AlreadyResolved(contest));
    }
    if !record.has_quorum() {
        return Err(EconomyError::QuorumNotMet {
            contest,
            quorum: record.terms.quorum_min,
            sizes: record.roster_sizes(),
        });
    }
    if !ctx.balances.can_mint(Account::Treasury) {
        return Err(EconomyError::NotAuthorized("treasury may not mint contest rewards".into()));
    }

    let rosters = [record.roster(Faction::Dawn).to_vec(), record.roster(Faction::Dusk).to_vec()];
    let reward_pool = record.terms.reward_pool;

    let mut power = [0u64; 2];
    let mut jitters = [0u64; 2];
    {
        let aggregator = PowerAggregator::new(ctx.power_config, ctx.registry, &*ctx.titles);
        for faction in Faction::BOTH {
            let side = faction.index();
            jitters[side] = jitter(
                &mut *ctx.entropy,
                now,
                contest,
                faction,
                rosters[side].len(),
                ctx.contest_config.jitter_per_member,
            );
            power[side] = aggregator.roster_power(&rosters[side]).saturating_add(jitters[side]);
        }
    }

    let winner = winner_of(power);
    let winners = rosters[winner.index()].clone();
    let losers = rosters[winner.opponent().index()].clone();
    if winners.is_empty() {
        return Err(EconomyError::NoWinners(contest));
    }

    let reward_per_winner = reward_pool / winners.len() as u64;
    let paid = reward_per_winner * winners.len() as u64;
    ctx.balances.check_mint(Account::Treasury, paid)?;

    // Validation is complete; from here on every step is a committed write
    book.get_mut(contest)?.conclude(Outcome::Victory {
        winner,
        power,
        jitter: jitters,
        reward_per_winner,
        paid,
    });

    let mut promotions = Vec::new();
    for participant in &winners {
        if reward_per_winner > 0 {
            ctx.balances.mint(Account::Treasury, Account::Participant(*participant), reward_per_winner)?;
        }
        if let Some(tier) = ctx.titles.record_win(*participant, now, ctx.log) {
            promotions.push((*participant, tier));
        }
    }
    for participant in &losers {
        ctx.titles.record_loss(*participant);
    }

    tracing::info!(
        "{} resolved: {:?} wins {} to {} ({} paid to {} winners)",
        contest,
        winner,
        power[winner.index()],
        power[winner.opponent().index()],
        paid,
        winners.len()
    );
    ctx.log.record(
        now,
        EventKind::ContestResolved { contest, winner, power, reward_per_winner, paid },
    );

    Ok(Resolution {
        contest,
        winner,
        power,
        jitter: jitters,
        reward_per_winner,
        paid,
        winners,
        losers,
        promotions,
    })
}

/// Abandon an open contest whose close tick passed without quorum
///
/// Every rostered participant is credited a draw and nothing is paid.
pub fn expire(
    book: &mut ContestBook,
    titles: &mut TitleBook,
    contest: ContestId,
    now: Tick,
    log: &mut EventLog,
) -> Result<()> {
    let record = book.get(contest)?;
    if !record.is_open() {
        return Err(EconomyError::AlreadyResolved(contest));
    }
    match record.terms.closes_at {
        Some(closes_at) if now >= closes_at => {}
        _ => return Err(EconomyError::ContestStillOpen(contest)),
    }
    if record.has_quorum() {
        return Err(EconomyError::QuorumReached(contest));
    }

    let sizes = record.roster_sizes();
    let participants: Vec<ParticipantId> = Faction::BOTH
        .iter()
        .flat_map(|f| record.roster(*f).iter().copied())
        .collect();

    book.get_mut(contest)?.conclude(Outcome::Abandoned);
    for participant in participants {
        titles.record_draw(participant);
    }

    tracing::info!("{} abandoned without quorum (rosters {:?})", contest, sizes);
    log.record(now, EventKind::ContestAbandoned { contest, rosters: sizes });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contest::record::ContestTerms;
    use crate::core::config::TitleConfig;
    use crate::core::entropy::ScriptedEntropy;
    use crate::registry::{BalanceBook, ResourceRegistry};

    fn p(id: u32) -> ParticipantId {
        ParticipantId(id)
    }

    #[test]
    fn test_winner_of_tie_goes_to_dawn() {
        assert_eq!(winner_of([10, 9]), Faction::Dawn);
        assert_eq!(winner_of([9, 10]), Faction::Dusk);
        assert_eq!(winner_of([10, 10]), Faction::Dawn);
    }

    #[test]
    fn test_jitter_is_bounded() {
        let mut entropy = ScriptedEntropy::constant(u64::MAX);
        for size in 1..6 {
            let j = jitter(&mut entropy, 5, ContestId(1), Faction::Dusk, size, 10);
            assert!(j < size as u64 * 10);
        }
        assert_eq!(jitter(&mut entropy, 5, ContestId(1), Faction::Dusk, 0, 10), 0);
    }

    #[test]
    fn test_join_rules() {
        let mut book = ContestBook::new(1);
        let mut log = EventLog::new();
        let terms = ContestTerms { reward_pool: 0, quorum_min: 1, closes_at: None };
        book.configure(ContestId(1), terms, 0).unwrap();

        join(&mut book, ContestId(1), p(1), Faction::Dawn, 0, &mut log).unwrap();
        assert_eq!(
            join(&mut book, ContestId(1), p(1), Faction::Dusk, 0, &mut log),
            Err(EconomyError::AlreadyJoined { contest: ContestId(1), participant: p(1) })
        );
        assert_eq!(
            join(&mut book, ContestId(1), p(2), Faction::Dawn, 0, &mut log),
            Err(EconomyError::CapacityExceeded(Capacity::FactionFull {
                contest: ContestId(1),
                faction: Faction::Dawn,
                capacity: 1
            }))
        );
        assert!(join(&mut book, ContestId(2), p(2), Faction::Dawn, 0, &mut log).is_err());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_resolve_pays_floor_share() {
        let mut book = ContestBook::new(4);
        let mut log = EventLog::new();
        let terms = ContestTerms { reward_pool: 100, quorum_min: 1, closes_at: None };
        book.configure(ContestId(1), terms, 0).unwrap();
        for id in 1..=3 {
            join(&mut book, ContestId(1), p(id), Faction::Dusk, 0, &mut log).unwrap();
        }
        join(&mut book, ContestId(1), p(9), Faction::Dawn, 0, &mut log).unwrap();

        let registry = ResourceRegistry::new(4);
        let mut titles = TitleBook::new(&TitleConfig::default());
        let mut balances = BalanceBook::new();
        balances.approve_minter(Account::Treasury);
        let mut entropy = ScriptedEntropy::constant(0);

        let resolution = resolve(
            &mut book,
            ContestId(1),
            10,
            ResolveContext {
                contest_config: &ContestConfig::default(),
                power_config: &PowerConfig::default(),
                registry: &registry,
                titles: &mut titles,
                balances: &mut balances,
                entropy: &mut entropy,
                log: &mut log,
            },
        )
        .unwrap();

        // Three base-power members beat one
        assert_eq!(resolution.winner, Faction::Dusk);
        assert_eq!(resolution.power, [15, 45]);
        assert_eq!(resolution.reward_per_winner, 33);
        assert_eq!(resolution.paid, 99);
        assert_eq!(balances.total_minted(), 99);
        assert_eq!(titles.record(p(9)).losses, 1);
        assert_eq!(titles.record(p(2)).wins, 1);
    }

    #[test]
    fn test_unmintable_payout_leaves_contest_open() {
        let mut book = ContestBook::new(4);
        let mut log = EventLog::new();
        let terms = ContestTerms { reward_pool: 100, quorum_min: 1, closes_at: None };
        book.configure(ContestId(1), terms, 0).unwrap();
        join(&mut book, ContestId(1), p(1), Faction::Dawn, 0, &mut log).unwrap();
        join(&mut book, ContestId(1), p(2), Faction::Dusk, 0, &mut log).unwrap();

        let registry = ResourceRegistry::new(4);
        let mut titles = TitleBook::new(&TitleConfig::default());
        let mut balances = BalanceBook::new();
        balances.approve_minter(Account::Treasury);
        balances.mint(Account::Treasury, Account::Participant(p(7)), u64::MAX - 50).unwrap();
        let mut entropy = ScriptedEntropy::constant(0);
        let events = log.len();

        let result = resolve(
            &mut book,
            ContestId(1),
            10,
            ResolveContext {
                contest_config: &ContestConfig::default(),
                power_config: &PowerConfig::default(),
                registry: &registry,
                titles: &mut titles,
                balances: &mut balances,
                entropy: &mut entropy,
                log: &mut log,
            },
        );

        assert!(matches!(result, Err(EconomyError::InvalidParameter(_))));
        assert!(book.get(ContestId(1)).unwrap().is_open());
        assert_eq!(titles.record(p(1)).wins, 0);
        assert_eq!(titles.record(p(2)).losses, 0);
        assert_eq!(balances.total_minted(), u64::MAX - 50);
        assert_eq!(log.len(), events);
    }

    #[test]
    fn test_expire_requires_close_tick_and_no_quorum() {
        let mut book = ContestBook::new(4);
        let mut titles = TitleBook::new(&TitleConfig::default());
        let mut log = EventLog::new();
        let terms = ContestTerms { reward_pool: 50, quorum_min: 2, closes_at: Some(100) };
        book.configure(ContestId(4), terms, 0).unwrap();
        join(&mut book, ContestId(4), p(1), Faction::Dawn, 0, &mut log).unwrap();

        assert_eq!(
            expire(&mut book, &mut titles, ContestId(4), 99, &mut log),
            Err(EconomyError::ContestStillOpen(ContestId(4)))
        );
        expire(&mut book, &mut titles, ContestId(4), 100, &mut log).unwrap();

        let record = book.get(ContestId(4)).unwrap();
        assert_eq!(record.outcome, Some(Outcome::Abandoned));
        assert_eq!(titles.record(p(1)).draws, 1);
        assert_eq!(
            expire(&mut book, &mut titles, ContestId(4), 200, &mut log),
            Err(EconomyError::AlreadyResolved(ContestId(4)))
        );
    }
}
