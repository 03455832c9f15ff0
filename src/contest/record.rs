//! Contest records and their store

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::bounded::BoundedSet;
use crate::core::error::{EconomyError, Result, Subject};
use crate::core::types::{ContestId, Faction, ParticipantId, Tick};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContestStatus {
    Open,
    /// Terminal; the record is immutable from here on
    Resolved,
}

/// How a contest ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Victory {
        winner: Faction,
        /// Aggregated power including jitter, Dawn first
        power: [u64; 2],
        jitter: [u64; 2],
        reward_per_winner: u64,
        paid: u64,
    },
    /// Closed without quorum; every rostered participant drew
    Abandoned,
}

/// Terms a contest is configured with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestTerms {
    pub reward_pool: u64,
    /// Minimum roster size on each side
    pub quorum_min: usize,
    /// Tick after which an unresolved contest may be abandoned
    pub closes_at: Option<Tick>,
}

#[derive(Debug, Clone)]
pub struct ContestRecord {
    pub id: ContestId,
    pub status: ContestStatus,
    pub terms: ContestTerms,
    pub created_at: Tick,
    pub outcome: Option<Outcome>,
    rosters: [BoundedSet<ParticipantId>; 2],
}

impl ContestRecord {
    fn new(id: ContestId, terms: ContestTerms, max_roster: usize, created_at: Tick) -> Self {
        Self {
            id,
            status: ContestStatus::Open,
            terms,
            created_at,
            outcome: None,
            rosters: [BoundedSet::new(max_roster), BoundedSet::new(max_roster)],
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == ContestStatus::Open
    }

    pub fn roster(&self, faction: Faction) -> &[ParticipantId] {
        self.rosters[faction.index()].as_slice()
    }

    pub fn roster_sizes(&self) -> [usize; 2] {
        [self.rosters[0].len(), self.rosters[1].len()]
    }

    pub fn faction_of(&self, participant: ParticipantId) -> Option<Faction> {
        Faction::BOTH
            .into_iter()
            .find(|f| self.rosters[f.index()].contains(&participant))
    }

    pub fn has_quorum(&self) -> bool {
        self.rosters.iter().all(|r| r.len() >= self.terms.quorum_min)
    }

    pub(crate) fn roster_mut(&mut self, faction: Faction) -> &mut BoundedSet<ParticipantId> {
        &mut self.rosters[faction.index()]
    }

    pub(crate) fn conclude(&mut self, outcome: Outcome) {
        self.status = ContestStatus::Resolved;
        self.outcome = Some(outcome);
    }
}

/// Store of every contest, addressed by id
#[derive(Debug, Clone)]
pub struct ContestBook {
    contests: AHashMap<ContestId, ContestRecord>,
    max_roster: usize,
    next_id: u32,
}

impl ContestBook {
    pub fn new(max_roster: usize) -> Self {
        Self { contests: AHashMap::new(), max_roster, next_id: 1 }
    }

    pub fn max_roster(&self) -> usize {
        self.max_roster
    }

    pub fn len(&self) -> usize {
        self.contests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contests.is_empty()
    }

    pub fn get(&self, id: ContestId) -> Result<&ContestRecord> {
        self.contests.get(&id).ok_or(EconomyError::NotFound(Subject::Contest(id)))
    }

    pub(crate) fn get_mut(&mut self, id: ContestId) -> Result<&mut ContestRecord> {
        self.contests.get_mut(&id).ok_or(EconomyError::NotFound(Subject::Contest(id)))
    }

    /// Next id not taken by any configured contest
    pub fn next_free_id(&self) -> ContestId {
        let mut candidate = self.next_id;
        while self.contests.contains_key(&ContestId(candidate)) {
            candidate += 1;
        }
        ContestId(candidate)
    }

    pub fn check_terms(&self, terms: &ContestTerms) -> Result<()> {
        if terms.quorum_min == 0 {
            return Err(EconomyError::InvalidParameter("quorum must be at least 1".into()));
        }
        if terms.quorum_min > self.max_roster {
            return Err(EconomyError::InvalidParameter(format!(
                "quorum {} exceeds roster capacity {}",
                terms.quorum_min, self.max_roster
            )));
        }
        Ok(())
    }

    /// Register a contest under a caller-chosen id
    pub fn configure(&mut self, id: ContestId, terms: ContestTerms, now: Tick) -> Result<&ContestRecord> {
        if self.contests.contains_key(&id) {
            return Err(EconomyError::AlreadyExists(format!("contest {}", id)));
        }
        self.check_terms(&terms)?;

        if id.0 >= self.next_id {
            self.next_id = id.0 + 1;
        }
        let record = ContestRecord::new(id, terms, self.max_roster, now);
        Ok(self.contests.entry(id).or_insert(record))
    }

    pub fn records(&self) -> impl Iterator<Item = &ContestRecord> + '_ {
        self.contests.values()
    }

    /// Reward actually paid by every resolved contest
    pub fn total_paid(&self) -> u64 {
        self.contests
            .values()
            .filter_map(|c| match c.outcome {
                Some(Outcome::Victory { paid, .. }) => Some(paid),
                _ => None,
            })
            .fold(0u64, |acc, paid| acc.saturating_add(paid))
    }

    /// Ids of contests still open, ascending
    pub fn open_ids(&self) -> Vec<ContestId> {
        let mut ids: Vec<_> = self.contests.values().filter(|c| c.is_open()).map(|c| c.id).collect();
        ids.sort();
        ids
    }
}
