//! Core type definitions used throughout the ledger

use serde::{Deserialize, Serialize};
use std::fmt;

/// Externally supplied tick counter (simulation time unit)
pub type Tick = u64;

/// Unique identifier for participants (player accounts)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub u32);

impl ParticipantId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p#{}", self.0)
    }
}

/// Unique identifier for scarce resources held in the ownership registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub u32);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r#{}", self.0)
    }
}

/// Unique identifier for contests
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContestId(pub u32);

impl ContestId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for ContestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c#{}", self.0)
    }
}

/// Resource class. Drives decay rate and strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Rarity {
    Common = 0,
    Uncommon = 1,
    Rare = 2,
    Epic = 3,
    Legendary = 4,
    /// Unique, maximally powerful instance
    Apex = 5,
}

impl Rarity {
    pub const ALL: [Rarity; 6] = [
        Rarity::Common,
        Rarity::Uncommon,
        Rarity::Rare,
        Rarity::Epic,
        Rarity::Legendary,
        Rarity::Apex,
    ];

    /// Holders of privileged resources rescue trapped miners for free
    pub fn is_privileged(&self) -> bool {
        matches!(self, Rarity::Legendary | Rarity::Apex)
    }
}

/// One of the two opposing factions in a contest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    Dawn,
    Dusk,
}

impl Faction {
    pub const BOTH: [Faction; 2] = [Faction::Dawn, Faction::Dusk];

    /// Roster slot for this faction
    pub fn index(&self) -> usize {
        match self {
            Faction::Dawn => 0,
            Faction::Dusk => 1,
        }
    }

    /// Tag mixed into the jitter hash
    pub fn tag(&self) -> u64 {
        self.index() as u64
    }

    pub fn opponent(&self) -> Faction {
        match self {
            Faction::Dawn => Faction::Dusk,
            Faction::Dusk => Faction::Dawn,
        }
    }
}

/// Mining depth. Doubles as the accrual rate class and the hazard risk class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Depth {
    Shallow = 0,
    Deep = 1,
    Abyssal = 2,
}

impl Depth {
    pub const ALL: [Depth; 3] = [Depth::Shallow, Depth::Deep, Depth::Abyssal];

    pub fn rate_class(&self) -> RateClass {
        RateClass(*self as u8)
    }

    pub fn from_rate_class(class: RateClass) -> Option<Depth> {
        Depth::ALL.get(class.0 as usize).copied()
    }
}

/// Index into an accrual policy's rate table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RateClass(pub u8);

impl fmt::Display for RateClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class {}", self.0)
    }
}

/// Which staking ledger a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StakeKind {
    /// Principal sunk into a mine, exposed to hazards
    Mining,
    /// Belief points pledged for a tier-scaled yield
    Devotion,
}

impl fmt::Display for StakeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StakeKind::Mining => write!(f, "mining"),
            StakeKind::Devotion => write!(f, "devotion"),
        }
    }
}

/// Title tier earned through contest wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TitleTier {
    Recruit = 0,
    Veteran = 1,
    Champion = 2,
    Warlord = 3,
    Legend = 4,
}

impl TitleTier {
    pub const ALL: [TitleTier; 5] = [
        TitleTier::Recruit,
        TitleTier::Veteran,
        TitleTier::Champion,
        TitleTier::Warlord,
        TitleTier::Legend,
    ];

    /// Returns true if this tier outranks the other
    pub fn outranks(&self, other: &TitleTier) -> bool {
        (*self as u8) > (*other as u8)
    }

    pub fn rank(&self) -> u64 {
        *self as u64
    }
}
