//! Realm Ledger - season simulator
//!
//! Runs a seeded, scripted season against the economy core: participants
//! acquire and trade resources, stake into mines and shrines, fight contests
//! and weather hazard sweeps. Prints an audit summary as JSON or text.

use std::path::PathBuf;

use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use realm_ledger::contest::ContestTerms;
use realm_ledger::core::types::{ContestId, Depth, Faction, ParticipantId, Rarity, StakeKind, Tick, TitleTier};
use realm_ledger::core::{EconomyConfig, EconomyError};
use realm_ledger::registry::OwnershipRegistry;
use realm_ledger::{Audit, Economy};

/// Rarities handed out during a season; the apex is minted once up front
const SEASON_RARITIES: [Rarity; 5] = [Rarity::Common, Rarity::Uncommon, Rarity::Rare, Rarity::Epic, Rarity::Legendary];

/// Realm Ledger season simulator
#[derive(Parser, Debug)]
#[command(name = "realm_sim")]
#[command(about = "Run a deterministic season against the realm economy")]
struct Args {
    /// Economy config (TOML). Defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Season length in ticks
    #[arg(long, default_value_t = 2_000)]
    ticks: Tick,

    /// Ticks between rounds of participant actions
    #[arg(long, default_value_t = 10)]
    step: Tick,

    /// Number of participants
    #[arg(long, default_value_t = 12)]
    participants: u32,

    /// Starting balance of every participant
    #[arg(long, default_value_t = 2_000)]
    funds: u64,

    /// Output format: json or text
    #[arg(long, default_value = "json")]
    format: String,
}

#[derive(Debug, Default, Serialize)]
struct SeasonStats {
    accepted: usize,
    rejected: usize,
    contests_resolved: usize,
    contests_abandoned: usize,
    hazard_sweeps: usize,
}

#[derive(Serialize)]
struct Standing {
    participant: u32,
    wins: u32,
    losses: u32,
    draws: u32,
    tier: TitleTier,
    power: u64,
    balance: u64,
}

#[derive(Serialize)]
struct SeasonSummary {
    seed: u64,
    ticks: Tick,
    participants: u32,
    stats: SeasonStats,
    hazards_triggered: usize,
    audit: Audit,
    leaderboard: Vec<Standing>,
}

fn tally<T>(stats: &mut SeasonStats, result: Result<T, EconomyError>) -> Option<T> {
    match result {
        Ok(value) => {
            stats.accepted += 1;
            Some(value)
        }
        Err(e) => {
            stats.rejected += 1;
            tracing::debug!("rejected: {}", e);
            None
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("realm_ledger=info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match EconomyConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => EconomyConfig::default(),
    };

    let seed = args.seed.unwrap_or_else(rand::random);
    tracing::info!("Realm season starting (seed {}, {} ticks)", seed, args.ticks);

    let summary = run_season(config, &args, seed);

    if args.format == "json" {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to serialize summary: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        print_text(&summary);
    }
}

fn run_season(config: EconomyConfig, args: &Args, seed: u64) -> SeasonSummary {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut economy = Economy::new(config, 0);
    let mut stats = SeasonStats::default();

    let roster: Vec<ParticipantId> = (1..=args.participants.max(2)).map(ParticipantId::new).collect();
    for participant in &roster {
        tally(&mut stats, economy.fund(*participant, args.funds));
    }
    tally(&mut stats, economy.mint_resource(roster[0], Rarity::Apex, Some("Heart of the Realm".into()), 0));

    let step = args.step.max(1);
    let mut tick = step;
    while tick <= args.ticks {
        for participant in &roster {
            act(&mut economy, &mut rng, &mut stats, &roster, *participant, tick);
        }

        if tick % 100 == 0 {
            schedule_contest(&mut economy, &mut rng, &mut stats, &roster, tick);
        }
        settle_contests(&mut economy, &mut stats, tick);

        if economy.check_hazards(tick, rng.gen()).is_ok() {
            stats.hazard_sweeps += 1;
        }

        tick += step;
    }

    let leaderboard = economy
        .titles()
        .leaderboard(5)
        .into_iter()
        .map(|(participant, record)| Standing {
            participant: participant.0,
            wins: record.wins,
            losses: record.losses,
            draws: record.draws,
            tier: record.tier,
            power: economy.power(participant),
            balance: economy.balance_of(participant),
        })
        .collect();

    SeasonSummary {
        seed,
        ticks: args.ticks,
        participants: roster.len() as u32,
        stats,
        hazards_triggered: economy.hazards().log().len(),
        audit: economy.audit(),
        leaderboard,
    }
}

/// One random action for one participant
fn act(
    economy: &mut Economy,
    rng: &mut ChaCha8Rng,
    stats: &mut SeasonStats,
    roster: &[ParticipantId],
    participant: ParticipantId,
    now: Tick,
) {
    match rng.gen_range(0..100) {
        0..=9 => {
            let rarity = SEASON_RARITIES[rng.gen_range(0..SEASON_RARITIES.len())];
            tally(stats, economy.mint_resource(participant, rarity, None, now));
        }
        10..=19 => {
            let held = economy.registry().resources_of(participant);
            if held.is_empty() {
                return;
            }
            let resource = held[rng.gen_range(0..held.len())];
            let to = roster[rng.gen_range(0..roster.len())];
            tally(stats, economy.transfer_resource(resource, to, now));
        }
        20..=34 => {
            let depth = Depth::ALL[rng.gen_range(0..Depth::ALL.len())];
            let principal = rng.gen_range(100..=300);
            tally(stats, economy.open_mining(participant, principal, depth, now));
        }
        35..=44 => {
            let principal = rng.gen_range(10..=100);
            tally(stats, economy.open_devotion(participant, principal, now));
        }
        45..=59 => {
            let kind = if rng.gen_bool(0.5) { StakeKind::Mining } else { StakeKind::Devotion };
            tally(stats, economy.settle(kind, participant, now));
        }
        60..=64 => {
            tally(stats, economy.close(StakeKind::Mining, participant, now));
        }
        65..=69 => {
            if economy.is_decayed(participant, now) {
                let level = economy.current_level(participant, now);
                let amount = level.min(economy.balance_of(participant) / economy.config().decay.cleanse_price.max(1));
                tally(stats, economy.purify(participant, amount, now));
            }
        }
        70..=74 => {
            let trapped: Vec<ParticipantId> = roster
                .iter()
                .copied()
                .filter(|p| *p != participant && economy.ledger(StakeKind::Mining).is_trapped(*p))
                .collect();
            if let Some(target) = trapped.first() {
                tally(stats, economy.rescue(*target, participant, now));
            }
        }
        _ => {}
    }
}

fn schedule_contest(
    economy: &mut Economy,
    rng: &mut ChaCha8Rng,
    stats: &mut SeasonStats,
    roster: &[ParticipantId],
    now: Tick,
) {
    let terms = ContestTerms {
        reward_pool: rng.gen_range(100..=1_000),
        quorum_min: rng.gen_range(1..=3),
        closes_at: Some(now + 80),
    };
    let Some(contest) = tally(stats, economy.create_contest(terms, now)) else {
        return;
    };

    for participant in roster {
        if rng.gen_bool(0.6) {
            let faction = if rng.gen_bool(0.5) { Faction::Dawn } else { Faction::Dusk };
            tally(stats, economy.join(contest, *participant, faction, now));
        }
    }
}

/// Resolve every open contest with quorum; abandon the ones past their close
fn settle_contests(economy: &mut Economy, stats: &mut SeasonStats, now: Tick) {
    let open: Vec<ContestId> = economy.contests().open_ids();
    for contest in open {
        let Ok(record) = economy.contests().get(contest) else {
            continue;
        };
        if record.has_quorum() {
            if tally(stats, economy.resolve(contest, now)).is_some() {
                stats.contests_resolved += 1;
            }
        } else if record.terms.closes_at.is_some_and(|closes_at| now >= closes_at)
            && tally(stats, economy.expire(contest, now)).is_some()
        {
            stats.contests_abandoned += 1;
        }
    }
}

fn print_text(summary: &SeasonSummary) {
    println!("=== REALM SEASON ===");
    println!("Seed: {}  Ticks: {}  Participants: {}", summary.seed, summary.ticks, summary.participants);
    println!();
    println!(
        "Operations: {} accepted, {} rejected",
        summary.stats.accepted, summary.stats.rejected
    );
    println!(
        "Contests: {} resolved, {} abandoned",
        summary.stats.contests_resolved, summary.stats.contests_abandoned
    );
    println!(
        "Hazards: {} sweeps, {} triggered, {} confiscated",
        summary.stats.hazard_sweeps, summary.hazards_triggered, summary.audit.confiscated
    );
    println!();
    println!(
        "Supply: {} (minted {}, burned {})",
        summary.audit.total_supply, summary.audit.total_minted, summary.audit.total_burned
    );
    println!(
        "Staked: mining {}, devotion {}  Rewards: {}  Contest payouts: {}",
        summary.audit.staked[0], summary.audit.staked[1], summary.audit.stake_rewards, summary.audit.contest_payouts
    );
    println!();
    println!("Leaderboard:");
    for (rank, standing) in summary.leaderboard.iter().enumerate() {
        println!(
            "  {}. p#{} {:?} - {}W/{}L/{}D, power {}, balance {}",
            rank + 1,
            standing.participant,
            standing.tier,
            standing.wins,
            standing.losses,
            standing.draws,
            standing.power,
            standing.balance
        );
    }
}
