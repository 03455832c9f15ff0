//! Domain events and the append-only audit log

use serde::{Deserialize, Serialize};

use crate::core::types::{ContestId, Depth, Faction, ParticipantId, RateClass, Rarity, ResourceId, StakeKind, Tick, TitleTier};

/// A committed state transition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub tick: Tick,
    pub kind: EventKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    // Ownership
    ResourceAcquired { owner: ParticipantId, resource: ResourceId, rarity: Rarity, from: Option<ParticipantId> },
    ResourceReleased { owner: ParticipantId, resource: ResourceId },
    ResourceDestroyed { owner: ParticipantId, resource: ResourceId },

    // Decay
    DecayCommitted { owner: ParticipantId, level: u64 },
    DecayThresholdCrossed { owner: ParticipantId, level: u64 },
    DecayCleansed { owner: ParticipantId, amount: u64, level: u64 },
    DecayFlagCleared { owner: ParticipantId, level: u64 },

    // Staking
    StakeOpened { ledger: StakeKind, owner: ParticipantId, added: u64, principal: u64, rate_class: RateClass, banked: u64 },
    StakeSettled { ledger: StakeKind, owner: ParticipantId, amount: u64 },
    StakeWithdrawn { ledger: StakeKind, owner: ParticipantId, amount: u64, principal: u64 },
    StakeClosed { ledger: StakeKind, owner: ParticipantId, principal: u64, reward: u64, forfeited: u64 },

    // Contests
    ContestConfigured { contest: ContestId, reward_pool: u64, quorum: usize, closes_at: Option<Tick> },
    ContestJoined { contest: ContestId, participant: ParticipantId, faction: Faction },
    ContestResolved { contest: ContestId, winner: Faction, power: [u64; 2], reward_per_winner: u64, paid: u64 },
    ContestAbandoned { contest: ContestId, rosters: [usize; 2] },
    TitleTierChanged { participant: ParticipantId, from: TitleTier, to: TitleTier },

    // Hazards
    HazardTriggered { depth: Depth, roll: u64, affected: Vec<ParticipantId>, confiscated: u64 },
    RescuePerformed { participant: ParticipantId, rescuer: ParticipantId, fee: u64 },
}

/// The complete event log
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<Event>,
    next_event_id: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tick: Tick, kind: EventKind) -> u64 {
        let id = self.next_event_id;
        self.next_event_id += 1;
        self.events.push(Event { id, tick, kind });
        id
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }

    /// Events recorded at or after the given id
    pub fn since(&self, id: u64) -> &[Event] {
        let start = self.events.partition_point(|e| e.id < id);
        &self.events[start..]
    }

    /// Count events matching a predicate
    pub fn count(&self, predicate: impl Fn(&EventKind) -> bool) -> usize {
        self.events.iter().filter(|e| predicate(&e.kind)).count()
    }
}
