//! Player roster for one session.
//!
//! Insertion order is meaningful: rating turns walk the roster front to
//! back, and a rejoining player is moved to the end rather than kept in
//! place.

use crate::error::GameError;
use crate::types::PlayerId;
use serde::{Deserialize, Serialize};

/// Per-player state inside a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    /// Accumulated rating score for the current competition.
    pub score: i64,
    /// How many ratings this player has received this competition.
    pub rate_count: usize,
    pub ready: bool,
    pub rate_ready: bool,
}

impl Player {
    fn new(id: PlayerId) -> Self {
        Self {
            id,
            score: 0,
            rate_count: 0,
            ready: false,
            rate_ready: false,
        }
    }
}

/// Serializable view of a player, used in snapshots and broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub score: i64,
    pub rate_count: usize,
    pub ready: bool,
    pub rate_ready: bool,
}

impl From<&Player> for PlayerSummary {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            score: p.score,
            rate_count: p.rate_count,
            ready: p.ready,
            rate_ready: p.rate_ready,
        }
    }
}

/// Ordered player list with a fixed capacity.
#[derive(Debug, Clone)]
pub struct Roster {
    capacity: usize,
    players: Vec<Player>,
}

impl Roster {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            players: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.players.iter().any(|p| p.id == *id)
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn summaries(&self) -> Vec<PlayerSummary> {
        self.players.iter().map(PlayerSummary::from).collect()
    }

    /// Add a player at the end of the roster. A player already present is
    /// treated as a rejoin: the stale entry is removed and a fresh one is
    /// appended, so reconnecting resets per-round state.
    pub fn add(&mut self, id: PlayerId) -> Result<&Player, GameError> {
        let rejoin = self.contains(&id);
        if !rejoin && self.players.len() >= self.capacity {
            return Err(GameError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        if rejoin {
            self.players.retain(|p| p.id != id);
        }
        self.players.push(Player::new(id));
        Ok(self.players.last().expect("player was just pushed"))
    }

    pub fn remove(&mut self, id: &PlayerId) -> Result<Player, GameError> {
        let pos = self
            .players
            .iter()
            .position(|p| p.id == *id)
            .ok_or_else(|| GameError::PlayerNotFound {
                player_id: id.clone(),
            })?;
        Ok(self.players.remove(pos))
    }

    fn get_mut(&mut self, id: &PlayerId) -> Result<&mut Player, GameError> {
        self.players
            .iter_mut()
            .find(|p| p.id == *id)
            .ok_or_else(|| GameError::PlayerNotFound {
                player_id: id.clone(),
            })
    }

    pub fn set_ready(&mut self, id: &PlayerId, ready: bool) -> Result<(), GameError> {
        self.get_mut(id)?.ready = ready;
        Ok(())
    }

    pub fn set_rate_ready(&mut self, id: &PlayerId) -> Result<(), GameError> {
        self.get_mut(id)?.rate_ready = true;
        Ok(())
    }

    pub fn add_score(&mut self, id: &PlayerId, score: i64) -> Result<(), GameError> {
        let player = self.get_mut(id)?;
        player.score += score;
        player.rate_count += 1;
        Ok(())
    }

    pub fn all_ready(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.ready)
    }

    pub fn all_rate_ready(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.rate_ready)
    }

    /// The next player whose drawing has not been rated yet, in roster
    /// order. `None` once every player has received at least one rating.
    pub fn next_unrated(&self) -> Option<&PlayerId> {
        self.players
            .iter()
            .find(|p| p.rate_count == 0)
            .map(|p| &p.id)
    }

    /// Whether rating is finished for one player's drawing. A player no
    /// longer on the roster counts as finished so a mid-rating departure
    /// cannot stall the round.
    pub fn rating_complete(&self, id: &PlayerId) -> bool {
        match self.players.iter().find(|p| p.id == *id) {
            None => true,
            Some(p) => p.rate_count >= self.players.len(),
        }
    }

    pub fn rating_complete_for_all(&self) -> bool {
        self.players
            .iter()
            .all(|p| p.rate_count >= self.players.len())
    }

    /// Clear per-competition state on every player, keeping membership.
    pub fn reset_round(&mut self) {
        for player in &mut self.players {
            player.score = 0;
            player.rate_count = 0;
            player.ready = false;
            player.rate_ready = false;
        }
    }

    /// Players ordered by score, highest first. Ties keep roster order.
    pub fn standings(&self) -> Vec<PlayerSummary> {
        let mut players = self.summaries();
        players.sort_by(|a, b| b.score.cmp(&a.score));
        players
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ids(roster: &Roster) -> Vec<&str> {
        roster.players().iter().map(|p| p.id.as_ref()).collect()
    }

    #[test]
    fn add_keeps_insertion_order() {
        let mut roster = Roster::new(4);
        roster.add(PlayerId::new("a")).unwrap();
        roster.add(PlayerId::new("b")).unwrap();
        roster.add(PlayerId::new("c")).unwrap();
        assert_eq!(ids(&roster), vec!["a", "b", "c"]);
    }

    #[test]
    fn add_rejects_when_full() {
        let mut roster = Roster::new(2);
        roster.add(PlayerId::new("a")).unwrap();
        roster.add(PlayerId::new("b")).unwrap();
        let err = roster.add(PlayerId::new("c")).unwrap_err();
        assert!(matches!(err, GameError::CapacityExceeded { capacity: 2 }));
    }

    #[test]
    fn rejoin_moves_player_to_end_and_resets_state() {
        let mut roster = Roster::new(4);
        roster.add(PlayerId::new("a")).unwrap();
        roster.add(PlayerId::new("b")).unwrap();
        roster.set_ready(&PlayerId::new("a"), true).unwrap();
        roster.add_score(&PlayerId::new("a"), 5).unwrap();

        roster.add(PlayerId::new("a")).unwrap();

        assert_eq!(ids(&roster), vec!["b", "a"]);
        let a = &roster.players()[1];
        assert!(!a.ready);
        assert_eq!(a.score, 0);
        assert_eq!(a.rate_count, 0);
    }

    #[test]
    fn rejoin_works_at_full_capacity() {
        let mut roster = Roster::new(2);
        roster.add(PlayerId::new("a")).unwrap();
        roster.add(PlayerId::new("b")).unwrap();
        roster.add(PlayerId::new("a")).unwrap();
        assert_eq!(ids(&roster), vec!["b", "a"]);
    }

    #[test]
    fn remove_unknown_player_fails() {
        let mut roster = Roster::new(4);
        let err = roster.remove(&PlayerId::new("ghost")).unwrap_err();
        assert!(matches!(err, GameError::PlayerNotFound { .. }));
    }

    #[test]
    fn all_ready_is_false_for_empty_roster() {
        let roster = Roster::new(4);
        assert!(!roster.all_ready());
        assert!(!roster.all_rate_ready());
    }

    #[test]
    fn all_ready_tracks_every_player() {
        let mut roster = Roster::new(4);
        roster.add(PlayerId::new("a")).unwrap();
        roster.add(PlayerId::new("b")).unwrap();
        roster.set_ready(&PlayerId::new("a"), true).unwrap();
        assert!(!roster.all_ready());
        roster.set_ready(&PlayerId::new("b"), true).unwrap();
        assert!(roster.all_ready());
        roster.set_ready(&PlayerId::new("a"), false).unwrap();
        assert!(!roster.all_ready());
    }

    #[test]
    fn next_unrated_walks_roster_order() {
        let mut roster = Roster::new(4);
        roster.add(PlayerId::new("a")).unwrap();
        roster.add(PlayerId::new("b")).unwrap();
        roster.add(PlayerId::new("c")).unwrap();

        assert_eq!(roster.next_unrated(), Some(&PlayerId::new("a")));

        roster.add_score(&PlayerId::new("a"), 3).unwrap();
        assert_eq!(roster.next_unrated(), Some(&PlayerId::new("b")));

        roster.add_score(&PlayerId::new("b"), 1).unwrap();
        roster.add_score(&PlayerId::new("c"), 2).unwrap();
        assert_eq!(roster.next_unrated(), None);
    }

    #[test]
    fn rating_complete_requires_one_rating_per_player() {
        let mut roster = Roster::new(4);
        roster.add(PlayerId::new("a")).unwrap();
        roster.add(PlayerId::new("b")).unwrap();
        roster.add(PlayerId::new("c")).unwrap();

        let a = PlayerId::new("a");
        assert!(!roster.rating_complete(&a));
        roster.add_score(&a, 1).unwrap();
        roster.add_score(&a, 2).unwrap();
        assert!(!roster.rating_complete(&a));
        roster.add_score(&a, 3).unwrap();
        assert!(roster.rating_complete(&a));
    }

    #[test]
    fn departed_player_counts_as_rated() {
        let roster = Roster::new(4);
        assert!(roster.rating_complete(&PlayerId::new("gone")));
    }

    #[test]
    fn rating_complete_for_all() {
        let mut roster = Roster::new(4);
        roster.add(PlayerId::new("a")).unwrap();
        roster.add(PlayerId::new("b")).unwrap();

        assert!(!roster.rating_complete_for_all());
        for ratee in ["a", "b"] {
            for _ in 0..2 {
                roster.add_score(&PlayerId::new(ratee), 1).unwrap();
            }
        }
        assert!(roster.rating_complete_for_all());
    }

    #[test]
    fn reset_round_clears_scores_but_keeps_members() {
        let mut roster = Roster::new(4);
        roster.add(PlayerId::new("a")).unwrap();
        roster.add(PlayerId::new("b")).unwrap();
        roster.set_ready(&PlayerId::new("a"), true).unwrap();
        roster.set_rate_ready(&PlayerId::new("b")).unwrap();
        roster.add_score(&PlayerId::new("b"), 7).unwrap();

        roster.reset_round();

        assert_eq!(ids(&roster), vec!["a", "b"]);
        for p in roster.players() {
            assert_eq!(p.score, 0);
            assert_eq!(p.rate_count, 0);
            assert!(!p.ready);
            assert!(!p.rate_ready);
        }
    }

    #[test]
    fn standings_sort_by_score_descending_stable() {
        let mut roster = Roster::new(4);
        roster.add(PlayerId::new("a")).unwrap();
        roster.add(PlayerId::new("b")).unwrap();
        roster.add(PlayerId::new("c")).unwrap();
        roster.add_score(&PlayerId::new("b"), 9).unwrap();
        roster.add_score(&PlayerId::new("a"), 3).unwrap();
        roster.add_score(&PlayerId::new("c"), 3).unwrap();

        let order: Vec<_> = roster
            .standings()
            .iter()
            .map(|p| p.id.as_ref().to_string())
            .collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }
}
