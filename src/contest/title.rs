//! Win/loss standings and title tiers

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::config::TitleConfig;
use crate::core::types::{ParticipantId, Tick, TitleTier};
use crate::events::{EventKind, EventLog};

/// Contest history of one participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleRecord {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub tier: TitleTier,
}

impl Default for TitleRecord {
    fn default() -> Self {
        Self { wins: 0, losses: 0, draws: 0, tier: TitleTier::Recruit }
    }
}

#[derive(Debug, Clone)]
pub struct TitleBook {
    records: AHashMap<ParticipantId, TitleRecord>,
    /// Wins required per tier, Recruit first
    thresholds: Vec<u32>,
}

impl TitleBook {
    pub fn new(config: &TitleConfig) -> Self {
        Self { records: AHashMap::new(), thresholds: config.thresholds.clone() }
    }

    /// Standing of `participant`; unknown participants have a blank record
    pub fn record(&self, participant: ParticipantId) -> TitleRecord {
        self.records.get(&participant).copied().unwrap_or_default()
    }

    pub fn tier(&self, participant: ParticipantId) -> TitleTier {
        self.record(participant).tier
    }

    /// Highest tier whose threshold `wins` meets
    pub fn tier_for(&self, wins: u32) -> TitleTier {
        TitleTier::ALL
            .iter()
            .zip(&self.thresholds)
            .filter(|(_, needed)| wins >= **needed)
            .map(|(tier, _)| *tier)
            .last()
            .unwrap_or(TitleTier::Recruit)
    }

    /// Count a win and upgrade the tier if a threshold was crossed
    ///
    /// Returns the new tier when it changed.
    pub fn record_win(&mut self, participant: ParticipantId, now: Tick, log: &mut EventLog) -> Option<TitleTier> {
        let wins = {
            let record = self.records.entry(participant).or_default();
            record.wins = record.wins.saturating_add(1);
            record.wins
        };
        let earned = self.tier_for(wins);

        let record = self.records.entry(participant).or_default();
        // Tiers never go down, even if thresholds were reconfigured upwards
        if !earned.outranks(&record.tier) {
            return None;
        }
        let from = record.tier;
        record.tier = earned;

        tracing::info!("{} advanced from {:?} to {:?}", participant, from, earned);
        log.record(now, EventKind::TitleTierChanged { participant, from, to: earned });
        Some(earned)
    }

    pub fn record_loss(&mut self, participant: ParticipantId) {
        let record = self.records.entry(participant).or_default();
        record.losses = record.losses.saturating_add(1);
    }

    pub fn record_draw(&mut self, participant: ParticipantId) {
        let record = self.records.entry(participant).or_default();
        record.draws = record.draws.saturating_add(1);
    }

    /// Participants ordered by tier then wins, best first
    pub fn leaderboard(&self, limit: usize) -> Vec<(ParticipantId, TitleRecord)> {
        let mut entries: Vec<_> = self.records.iter().map(|(id, r)| (*id, *r)).collect();
        entries.sort_by(|a, b| {
            b.1.tier
                .cmp(&a.1.tier)
                .then(b.1.wins.cmp(&a.1.wins))
                .then(a.0.cmp(&b.0))
        });
        entries.truncate(limit);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: ParticipantId = ParticipantId(1);

    #[test]
    fn test_tier_for_thresholds() {
        let book = TitleBook::new(&TitleConfig::default());
        assert_eq!(book.tier_for(0), TitleTier::Recruit);
        assert_eq!(book.tier_for(4), TitleTier::Recruit);
        assert_eq!(book.tier_for(5), TitleTier::Veteran);
        assert_eq!(book.tier_for(24), TitleTier::Champion);
        assert_eq!(book.tier_for(500), TitleTier::Legend);
    }

    #[test]
    fn test_tier_change_fires_only_on_crossing() {
        let mut book = TitleBook::new(&TitleConfig::default());
        let mut log = EventLog::new();

        for tick in 0..4 {
            assert_eq!(book.record_win(ALICE, tick, &mut log), None);
        }
        assert_eq!(book.record_win(ALICE, 4, &mut log), Some(TitleTier::Veteran));
        assert_eq!(book.record_win(ALICE, 5, &mut log), None);

        let changes: Vec<_> = log
            .events()
            .iter()
            .filter(|e| matches!(e.kind, EventKind::TitleTierChanged { .. }))
            .collect();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].tick, 4);
    }

    #[test]
    fn test_losses_and_draws_do_not_move_tier() {
        let mut book = TitleBook::new(&TitleConfig::default());
        for _ in 0..10 {
            book.record_loss(ALICE);
            book.record_draw(ALICE);
        }
        let record = book.record(ALICE);
        assert_eq!((record.wins, record.losses, record.draws), (0, 10, 10));
        assert_eq!(record.tier, TitleTier::Recruit);
    }

    #[test]
    fn test_leaderboard_order() {
        let mut book = TitleBook::new(&TitleConfig::default());
        let mut log = EventLog::new();
        for _ in 0..6 {
            book.record_win(ParticipantId(2), 0, &mut log);
        }
        book.record_win(ParticipantId(3), 0, &mut log);
        book.record_loss(ParticipantId(4));

        let board = book.leaderboard(2);
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].0, ParticipantId(2));
        assert_eq!(board[1].0, ParticipantId(3));
    }
}
