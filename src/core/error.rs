use std::fmt;

use thiserror::Error;

use crate::core::types::{ContestId, Faction, ParticipantId, RateClass, ResourceId, StakeKind, Tick};

/// What a lookup failed to find
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Contest(ContestId),
    Resource(ResourceId),
    Owner(ParticipantId),
    Stake(StakeKind, ParticipantId),
    RateClass(StakeKind, RateClass),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Contest(id) => write!(f, "contest {}", id),
            Subject::Resource(id) => write!(f, "resource {}", id),
            Subject::Owner(id) => write!(f, "decay record for {}", id),
            Subject::Stake(kind, owner) => write!(f, "{} stake of {}", kind, owner),
            Subject::RateClass(kind, class) => write!(f, "{} {}", kind, class),
        }
    }
}

/// Which bound was hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    FactionFull { contest: ContestId, faction: Faction, capacity: usize },
    Holdings { owner: ParticipantId, capacity: usize },
    Population { ledger: StakeKind, class: RateClass, capacity: usize },
    /// Owner crossed the decay threshold and may not acquire more
    Decayed { owner: ParticipantId, level: u64 },
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capacity::FactionFull { contest, faction, capacity } => {
                write!(f, "{:?} roster of {} is full ({})", faction, contest, capacity)
            }
            Capacity::Holdings { owner, capacity } => {
                write!(f, "{} already holds {} resources", owner, capacity)
            }
            Capacity::Population { ledger, class, capacity } => {
                write!(f, "{} {} population is full ({})", ledger, class, capacity)
            }
            Capacity::Decayed { owner, level } => {
                write!(f, "{} is decayed (level {}) and cannot acquire", owner, level)
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EconomyError {
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("{participant} already joined {contest}")]
    AlreadyJoined { contest: ContestId, participant: ParticipantId },

    #[error("Not found: {0}")]
    NotFound(Subject),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(Capacity),

    #[error("{contest} quorum {quorum} not met (rosters {sizes:?})")]
    QuorumNotMet { contest: ContestId, quorum: usize, sizes: [usize; 2] },

    #[error("{0} reached quorum and must be resolved")]
    QuorumReached(ContestId),

    #[error("{0} is not open")]
    AlreadyResolved(ContestId),

    #[error("{0} is still open")]
    ContestStillOpen(ContestId),

    #[error("{0} has no winners")]
    NoWinners(ContestId),

    #[error("Nothing to claim before tick {ready_at}")]
    TemporalGateNotElapsed { ready_at: Tick },

    #[error("Insufficient principal: requested {requested}, available {available}")]
    InsufficientPrincipal { requested: u64, available: u64 },

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: u64, available: u64 },

    #[error("{0} is trapped and awaits rescue")]
    Trapped(ParticipantId),

    #[error("{0} is not trapped")]
    NotTrapped(ParticipantId),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, EconomyError>;

/// Error type for configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
