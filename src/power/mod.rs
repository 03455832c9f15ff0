//! Power aggregation for contest resolution
//!
//! A participant's power is a pure function of current state:
//!
//! ```text
//! power = attack + defense + resource_power + apex_bonus
//! attack  = 2 * wins + 10
//! defense = wins + draws + 5
//! ```
//!
//! `resource_power` sums the strength of every resource the participant holds
//! right now; the apex bonus applies only while the apex resource is held.
//! It is the experience term of the formula; wins and draws already count
//! through attack and defense.

use serde::{Deserialize, Serialize};

use crate::contest::title::TitleBook;
use crate::core::config::PowerConfig;
use crate::core::types::ParticipantId;
use crate::registry::OwnershipRegistry;

pub const ATTACK_PER_WIN: u64 = 2;
pub const BASE_ATTACK: u64 = 10;
pub const BASE_DEFENSE: u64 = 5;

/// Individual power terms
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerBreakdown {
    pub attack: u64,
    pub defense: u64,
    pub resource_power: u64,
    pub apex_bonus: u64,
}

impl PowerBreakdown {
    pub fn total(&self) -> u64 {
        self.attack
            .saturating_add(self.defense)
            .saturating_add(self.resource_power)
            .saturating_add(self.apex_bonus)
    }
}

/// Read-only view over the stores power depends on
pub struct PowerAggregator<'a, R: OwnershipRegistry + ?Sized> {
    config: &'a PowerConfig,
    registry: &'a R,
    titles: &'a TitleBook,
}

impl<'a, R: OwnershipRegistry + ?Sized> PowerAggregator<'a, R> {
    pub fn new(config: &'a PowerConfig, registry: &'a R, titles: &'a TitleBook) -> Self {
        Self { config, registry, titles }
    }

    pub fn breakdown(&self, participant: ParticipantId) -> PowerBreakdown {
        let record = self.titles.record(participant);
        let wins = record.wins as u64;

        let resource_power = self
            .registry
            .resources_of(participant)
            .iter()
            .filter_map(|id| self.registry.resource(*id))
            .map(|r| self.config.strengths.get(r.rarity))
            .fold(0u64, |acc, s| acc.saturating_add(s));

        let apex_bonus = if self.registry.holds_apex(participant) {
            self.config.apex_bonus
        } else {
            0
        };

        PowerBreakdown {
            attack: ATTACK_PER_WIN * wins + BASE_ATTACK,
            defense: wins + record.draws as u64 + BASE_DEFENSE,
            resource_power,
            apex_bonus,
        }
    }

    pub fn power(&self, participant: ParticipantId) -> u64 {
        self.breakdown(participant).total()
    }

    /// Sum of power over a roster
    pub fn roster_power(&self, roster: &[ParticipantId]) -> u64 {
        roster.iter().fold(0u64, |acc, p| acc.saturating_add(self.power(*p)))
    }
}
