//! Economy configuration with documented constants
//!
//! Every tunable number lives here. Formulas that are part of the game rules
//! (attack/defense terms, the tie-break side) are constants in their own
//! modules instead.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::ConfigError;
use crate::core::types::{Depth, Rarity, Tick, TitleTier};

/// One value per resource class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RarityTable {
    pub common: u64,
    pub uncommon: u64,
    pub rare: u64,
    pub epic: u64,
    pub legendary: u64,
    pub apex: u64,
}

impl RarityTable {
    pub fn get(&self, rarity: Rarity) -> u64 {
        match rarity {
            Rarity::Common => self.common,
            Rarity::Uncommon => self.uncommon,
            Rarity::Rare => self.rare,
            Rarity::Epic => self.epic,
            Rarity::Legendary => self.legendary,
            Rarity::Apex => self.apex,
        }
    }
}

/// Corruption settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
    /// Level at or above which an owner is flagged as decayed
    pub threshold: u64,

    /// Decay per tick, in hundredths of a level, for each held resource
    ///
    /// A Common resource at rate 1 adds one level every 100 ticks.
    pub rates: RarityTable,

    /// Balance burned per level removed by purification
    pub cleanse_price: u64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            threshold: 1_000,
            rates: RarityTable { common: 1, uncommon: 2, rare: 4, epic: 6, legendary: 10, apex: 20 },
            cleanse_price: 5,
        }
    }
}

/// Ownership registry bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Maximum resources a single owner may hold
    ///
    /// Bounds every per-owner enumeration (decay commit, power aggregation).
    pub max_holdings: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { max_holdings: 32 }
    }
}

/// Parameters of one lazy-accrual staking ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualPolicy {
    /// Principal per accruing unit; remainders below one unit earn nothing
    pub unit_size: u64,

    /// Reward per unit per tick, indexed by rate class
    pub rates: Vec<u64>,

    /// Ticks that must elapse after the last settlement before a claim
    pub min_window: Tick,
}

/// Staking variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StakeConfig {
    /// One rate class per depth: Shallow, Deep, Abyssal
    pub mining: AccrualPolicy,

    /// Single rate class, gated by a claim window
    pub devotion: AccrualPolicy,

    /// Maximum stakers per rate class
    pub max_population: usize,

    /// Extra devotion yield per title tier, in percent
    pub tier_bonus_percent: u64,
}

impl Default for StakeConfig {
    fn default() -> Self {
        Self {
            mining: AccrualPolicy { unit_size: 100, rates: vec![1, 3, 6], min_window: 0 },
            devotion: AccrualPolicy { unit_size: 10, rates: vec![1], min_window: 100 },
            max_population: 64,
            tier_bonus_percent: 10,
        }
    }
}

/// Power aggregation inputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    /// Strength contributed by each held resource
    pub strengths: RarityTable,

    /// Flat bonus for holding the apex resource
    pub apex_bonus: u64,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            strengths: RarityTable { common: 10, uncommon: 20, rare: 40, epic: 80, legendary: 150, apex: 300 },
            apex_bonus: 1_000,
        }
    }
}

/// Contest settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContestConfig {
    /// Hard cap on each faction roster
    pub max_roster: usize,

    /// Jitter modulus per roster member
    ///
    /// A side with n members receives jitter in `0..n * jitter_per_member`.
    pub jitter_per_member: u64,
}

impl Default for ContestConfig {
    fn default() -> Self {
        Self { max_roster: 16, jitter_per_member: 10 }
    }
}

/// Hazard sweep settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardConfig {
    /// Minimum ticks between sweeps
    pub interval: Tick,

    /// Percent chance of a hazard per depth: Shallow, Deep, Abyssal
    pub chances: Vec<u64>,

    /// Percent of principal confiscated from each caught miner
    pub confiscation_percent: u64,

    /// Balance burned from a rescuer without a privileged resource
    pub rescue_fee: u64,
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            interval: 50,
            chances: vec![0, 10, 30],
            confiscation_percent: 20,
            rescue_fee: 50,
        }
    }
}

/// Title progression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleConfig {
    /// Wins required for each tier, Recruit first
    pub thresholds: Vec<u32>,
}

impl Default for TitleConfig {
    fn default() -> Self {
        Self { thresholds: vec![0, 5, 10, 25, 50] }
    }
}

/// Configuration for the whole economy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub decay: DecayConfig,
    pub registry: RegistryConfig,
    pub stake: StakeConfig,
    pub power: PowerConfig,
    pub contest: ContestConfig,
    pub hazard: HazardConfig,
    pub titles: TitleConfig,
}

impl EconomyConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate a config from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse and validate a config from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: EconomyConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.decay.threshold == 0 {
            return Err(ConfigError::Invalid("decay.threshold must be positive".into()));
        }

        if self.registry.max_holdings == 0 {
            return Err(ConfigError::Invalid("registry.max_holdings must be positive".into()));
        }

        for (name, policy) in [("mining", &self.stake.mining), ("devotion", &self.stake.devotion)] {
            if policy.unit_size == 0 {
                return Err(ConfigError::Invalid(format!("stake.{}.unit_size must be positive", name)));
            }
            if policy.rates.is_empty() {
                return Err(ConfigError::Invalid(format!("stake.{}.rates must not be empty", name)));
            }
        }

        if self.stake.mining.rates.len() != Depth::ALL.len() {
            return Err(ConfigError::Invalid(format!(
                "stake.mining.rates needs one rate per depth ({}), got {}",
                Depth::ALL.len(),
                self.stake.mining.rates.len()
            )));
        }

        if self.stake.max_population == 0 {
            return Err(ConfigError::Invalid("stake.max_population must be positive".into()));
        }

        if self.contest.max_roster == 0 || self.contest.jitter_per_member == 0 {
            return Err(ConfigError::Invalid(
                "contest.max_roster and contest.jitter_per_member must be positive".into(),
            ));
        }

        if self.hazard.chances.len() != Depth::ALL.len() {
            return Err(ConfigError::Invalid(format!(
                "hazard.chances needs one chance per depth ({}), got {}",
                Depth::ALL.len(),
                self.hazard.chances.len()
            )));
        }

        if self.hazard.chances.iter().any(|c| *c > 100) || self.hazard.confiscation_percent > 100 {
            return Err(ConfigError::Invalid("hazard percentages must be <= 100".into()));
        }

        let thresholds = &self.titles.thresholds;
        if thresholds.len() != TitleTier::ALL.len() {
            return Err(ConfigError::Invalid(format!(
                "titles.thresholds needs {} entries, got {}",
                TitleTier::ALL.len(),
                thresholds.len()
            )));
        }
        if thresholds[0] != 0 || thresholds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::Invalid(
                "titles.thresholds must start at 0 and be strictly ascending".into(),
            ));
        }

        Ok(())
    }
}
