//! The persisted game aggregate and turn bookkeeping
//!
//! [`GameState`] is a plain value: every action builds the next state
//! from the previous one with the `with_*` methods, so a half-applied
//! update is never observable.

use std::collections::HashSet;

use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    bank::QuestionId,
    constants::{
        roster::{MAX_PLAYERS, MIN_PLAYERS},
        storage::VERSION,
    },
    roster::{Player, PlayerId},
};

/// The whole persisted game: roster, played questions and whose turn it is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Schema version tag
    #[garde(custom(is_current_version))]
    pub version: u32,
    /// Ordered roster
    #[garde(length(min = MIN_PLAYERS, max = MAX_PLAYERS), custom(has_unique_ids), dive)]
    pub players: Vec<Player>,
    /// Ids of resolved questions, in resolution order, without duplicates
    #[garde(custom(has_no_duplicates))]
    pub used: Vec<QuestionId>,
    /// The player whose turn is active
    #[garde(custom(resolves_in(&self.players)))]
    pub current_player_id: Option<PlayerId>,
}

fn is_current_version(version: &u32, _ctx: &()) -> garde::Result {
    if *version == VERSION {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "version {version} is not the current version {VERSION}"
        )))
    }
}

#[allow(clippy::ptr_arg)]
fn has_unique_ids(players: &Vec<Player>, _ctx: &()) -> garde::Result {
    match players.iter().map(|player| &player.id).duplicates().next() {
        Some(id) => Err(garde::Error::new(format!("duplicate player id {id}"))),
        None => Ok(()),
    }
}

#[allow(clippy::ptr_arg)]
fn has_no_duplicates(used: &Vec<QuestionId>, _ctx: &()) -> garde::Result {
    match used.iter().duplicates().next() {
        Some(id) => Err(garde::Error::new(format!("question {id} is marked twice"))),
        None => Ok(()),
    }
}

fn resolves_in(players: &[Player]) -> impl FnOnce(&Option<PlayerId>, &()) -> garde::Result + '_ {
    move |current, _| match current {
        Some(id) if players.iter().any(|player| &player.id == id) => Ok(()),
        None if players.is_empty() => Ok(()),
        Some(id) => Err(garde::Error::new(format!("player {id} is not in the roster"))),
        None => Err(garde::Error::new("no current player".to_owned())),
    }
}

/// Resolves the current player against a roster
///
/// Keeps `current` if it names a player of the roster, otherwise falls
/// back to the first player. Returns `None` only for an empty roster.
pub fn normalized_current_player_id(
    players: &[Player],
    current: Option<&PlayerId>,
) -> Option<PlayerId> {
    let first = players.first()?;
    match current {
        Some(id) if players.iter().any(|player| &player.id == id) => Some(id.clone()),
        _ => Some(first.id.clone()),
    }
}

/// Returns the player after `from` in roster order, wrapping around
///
/// If `from` is no longer in the roster the turn goes to the first
/// player. Returns `None` only for an empty roster.
pub fn next_player_id(players: &[Player], from: &PlayerId) -> Option<PlayerId> {
    let first = players.first()?;
    match players.iter().position(|player| &player.id == from) {
        Some(index) => Some(players[(index + 1) % players.len()].id.clone()),
        None => Some(first.id.clone()),
    }
}

impl GameState {
    /// Replaces the roster
    #[must_use]
    pub fn with_players(self, players: Vec<Player>) -> Self {
        Self { players, ..self }
    }

    /// Sets the current player without checking it
    #[must_use]
    pub fn with_current_player(self, current_player_id: Option<PlayerId>) -> Self {
        Self {
            current_player_id,
            ..self
        }
    }

    /// Re-resolves the current player against the roster
    #[must_use]
    pub fn with_normalized_current_player(self) -> Self {
        let current_player_id =
            normalized_current_player_id(&self.players, self.current_player_id.as_ref());
        if current_player_id != self.current_player_id {
            tracing::debug!(
                "Current player {:?} re-resolved to {:?}",
                self.current_player_id,
                current_player_id
            );
        }
        self.with_current_player(current_player_id)
    }

    /// Marks a question as resolved
    ///
    /// Marking an id that is already used leaves the state unchanged.
    #[must_use]
    pub fn with_question_used(mut self, id: QuestionId) -> Self {
        if !self.is_used(&id) {
            self.used.push(id);
        }
        self
    }

    /// Whether a question has been resolved
    pub fn is_used(&self, id: &QuestionId) -> bool {
        self.used.contains(id)
    }

    /// Looks up a player by id
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|player| &player.id == id)
    }

    /// The player whose turn is active, if it resolves
    pub fn current_player(&self) -> Option<&Player> {
        self.current_player_id.as_ref().and_then(|id| self.player(id))
    }

    /// The set of resolved question ids
    pub fn used_set(&self) -> HashSet<&QuestionId> {
        self.used.iter().collect()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{persistence::build_initial_state, roster};
    use proptest::prelude::*;
    use serde_json::json;

    fn two_players() -> Vec<Player> {
        roster::normalize_players(&json!([
            {"id": "p1", "name": "A", "score": 0},
            {"id": "p2", "name": "B", "score": 0},
        ]))
    }

    #[test]
    fn test_normalized_current_player_keeps_valid_id() {
        let players = two_players();
        assert_eq!(
            normalized_current_player_id(&players, Some(&"p2".into())),
            Some("p2".into())
        );
    }

    #[test]
    fn test_normalized_current_player_falls_back_to_first() {
        let players = two_players();
        assert_eq!(
            normalized_current_player_id(&players, Some(&"p9".into())),
            Some("p1".into())
        );
        assert_eq!(normalized_current_player_id(&players, None), Some("p1".into()));
        assert_eq!(normalized_current_player_id(&[], Some(&"p1".into())), None);
    }

    #[test]
    fn test_next_player_wraps() {
        let players = two_players();
        assert_eq!(next_player_id(&players, &"p1".into()), Some("p2".into()));
        assert_eq!(next_player_id(&players, &"p2".into()), Some("p1".into()));
    }

    #[test]
    fn test_next_player_of_unknown_is_first() {
        let players = two_players();
        assert_eq!(next_player_id(&players, &"gone".into()), Some("p1".into()));
        assert_eq!(next_player_id(&[], &"p1".into()), None);
    }

    #[test]
    fn test_question_marked_once() {
        let state = build_initial_state(two_players())
            .with_question_used("q11".into())
            .with_question_used("q11".into());
        assert_eq!(state.used, vec![QuestionId::from("q11")]);
        assert!(state.is_used(&"q11".into()));
        assert!(state.validate().is_ok());
    }

    #[test]
    fn test_with_normalized_current_player_repairs_dangling_id() {
        let state = build_initial_state(two_players())
            .with_current_player(Some("p2".into()))
            .with_players(roster::remove_player(&two_players()));
        assert!(state.validate().is_err());

        let state = state.with_normalized_current_player();
        assert_eq!(state.current_player_id, Some("p1".into()));
        assert!(state.validate().is_ok());
    }

    #[test]
    fn test_validation_catches_broken_invariants() {
        let state = build_initial_state(two_players());
        assert!(state.validate().is_ok());

        let mut duplicate_ids = state.clone();
        duplicate_ids.players[1].id = "p1".into();
        assert!(duplicate_ids.validate().is_err());

        let mut duplicate_used = state.clone();
        duplicate_used.used = vec!["q1".into(), "q1".into()];
        assert!(duplicate_used.validate().is_err());

        let mut wrong_version = state.clone();
        wrong_version.version = 0;
        assert!(wrong_version.validate().is_err());

        let mut empty = state;
        empty.players.clear();
        empty.current_player_id = None;
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_serialized_shape() {
        let state = build_initial_state(two_players()).with_question_used("q11".into());
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(
            value,
            json!({
                "version": 1,
                "players": [
                    {"id": "p1", "name": "A", "score": 0},
                    {"id": "p2", "name": "B", "score": 0},
                ],
                "used": ["q11"],
                "currentPlayerId": "p1",
            })
        );
    }

    proptest! {
        #[test]
        fn next_player_cycles_back(size in 1usize..=MAX_PLAYERS, start in 0usize..MAX_PLAYERS) {
            let players = roster::create_initial_players(size);
            let start = players[start % size].id.clone();

            let mut current = start.clone();
            for _ in 0..size {
                current = next_player_id(&players, &current).unwrap();
            }
            prop_assert_eq!(current, start);
        }

        #[test]
        fn next_player_visits_everyone(size in 1usize..=MAX_PLAYERS) {
            let players = roster::create_initial_players(size);
            let mut current = players[0].id.clone();
            let mut seen = HashSet::new();
            for _ in 0..size {
                seen.insert(current.clone());
                current = next_player_id(&players, &current).unwrap();
            }
            prop_assert_eq!(seen.len(), size);
        }
    }
}
