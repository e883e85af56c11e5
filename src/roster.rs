//! Player roster and scoring
//!
//! All functions here are pure: they borrow a roster and return a new one,
//! leaving the input untouched. Functions that act on a single player take
//! its id; an unknown id matches nothing and the roster comes back
//! unchanged. Adding and removing act on the roster as a whole.

use std::collections::HashSet;

use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::roster::{MAX_NAME_LENGTH, MAX_PLAYERS, MIN_PLAYERS, UNNAMED};

/// A stable player identifier
///
/// Players created by this module are numbered `p1`, `p2`, ...; ids read
/// from a stored snapshot may be any non-empty string.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct PlayerId(String);

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl PlayerId {
    /// Builds the id `p{number}`
    pub fn numbered(number: u64) -> Self {
        Self(format!("p{number}"))
    }

    /// Returns the numeric suffix if the id has the form `p<digits>`
    pub fn number(&self) -> Option<u64> {
        self.0
            .strip_prefix('p')
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse().ok())
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A participant and their running score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Player {
    /// Unique, stable identifier
    #[garde(skip)]
    pub id: PlayerId,
    /// Display name
    #[garde(length(chars, min = 1, max = MAX_NAME_LENGTH))]
    pub name: String,
    /// Accumulated points
    #[garde(skip)]
    pub score: i64,
}

fn default_name(number: u64) -> String {
    format!("Player {number}")
}

fn create_player(number: u64) -> Player {
    Player {
        id: PlayerId::numbered(number),
        name: default_name(number),
        score: 0,
    }
}

/// Trims a requested name and cuts it to [`MAX_NAME_LENGTH`] characters
///
/// Returns `None` if nothing is left after trimming.
fn clean_name(name: &str) -> Option<String> {
    let trimmed = rustrict::trim_whitespace(name);
    if trimmed.is_empty() {
        return None;
    }
    let cut: String = trimmed.chars().take(MAX_NAME_LENGTH).collect();
    Some(cut.trim_end().to_owned())
}

fn coerce_score(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or_default(),
        _ => 0,
    }
}

/// Number for the next added player: one past the highest `p<N>` suffix
///
/// If that would overflow, the lowest unused number is taken instead.
fn next_player_number(players: &[Player]) -> u64 {
    let taken: HashSet<u64> = players
        .iter()
        .filter_map(|player| player.id.number())
        .collect();

    match taken.iter().max() {
        None => 1,
        Some(max) => max.checked_add(1).unwrap_or_else(|| {
            (1..=u64::MAX)
                .find(|number| !taken.contains(number))
                .unwrap_or_default()
        }),
    }
}

/// Creates `count` fresh players named "Player 1".."Player N"
///
/// `count` is clamped to the roster bounds.
pub fn create_initial_players(count: usize) -> Vec<Player> {
    let count = count.clamp(MIN_PLAYERS, MAX_PLAYERS) as u64;
    (1..=count).map(create_player).collect_vec()
}

/// Repairs a roster read from an untrusted source
///
/// Anything that is not a non-empty array yields one default player.
/// Otherwise each of the first [`MAX_PLAYERS`] entries is coerced: a
/// missing id becomes `p{index+1}`, a blank name becomes
/// `Player {index+1}` and a non-numeric score becomes 0. An id that is
/// already taken by an earlier entry is replaced by a fresh `p<N>` id.
pub fn normalize_players(raw: &Value) -> Vec<Player> {
    let entries = match raw.as_array() {
        Some(entries) if !entries.is_empty() => entries,
        _ => return create_initial_players(MIN_PLAYERS),
    };

    let mut players = entries
        .iter()
        .take(MAX_PLAYERS)
        .enumerate()
        .map(|(index, entry)| {
            let number = index as u64 + 1;
            Player {
                id: entry
                    .get("id")
                    .and_then(Value::as_str)
                    .filter(|id| !id.is_empty())
                    .map_or_else(|| PlayerId::numbered(number), PlayerId::from),
                name: entry
                    .get("name")
                    .and_then(Value::as_str)
                    .and_then(clean_name)
                    .unwrap_or_else(|| default_name(number)),
                score: coerce_score(entry.get("score")),
            }
        })
        .collect_vec();

    let mut seen = HashSet::new();
    for index in 0..players.len() {
        if !seen.insert(players[index].id.clone()) {
            let id = PlayerId::numbered(next_player_number(&players));
            tracing::debug!("Replaced duplicate player id {} with {id}", players[index].id);
            players[index].id = id.clone();
            seen.insert(id);
        }
    }

    while players.len() < MIN_PLAYERS {
        players.push(create_player(next_player_number(&players)));
    }

    players
}

/// Appends a new player unless the roster is full
///
/// The new id is one past the highest `p<N>` suffix in use, so ids never
/// collide even after removals.
pub fn add_player(players: &[Player]) -> Vec<Player> {
    if players.len() >= MAX_PLAYERS {
        return players.to_vec();
    }

    let mut next = players.to_vec();
    next.push(create_player(next_player_number(players)));
    next
}

/// Drops the last player in roster order unless at the minimum
pub fn remove_player(players: &[Player]) -> Vec<Player> {
    if players.len() <= MIN_PLAYERS {
        return players.to_vec();
    }

    players[..players.len() - 1].to_vec()
}

/// Renames the player with `id`
///
/// The name is trimmed and cut to [`MAX_NAME_LENGTH`] characters; blank
/// text becomes [`UNNAMED`].
pub fn rename_player(players: &[Player], id: &PlayerId, name: &str) -> Vec<Player> {
    let name = clean_name(name).unwrap_or_else(|| UNNAMED.to_owned());
    players
        .iter()
        .map(|player| {
            if &player.id == id {
                Player {
                    name: name.clone(),
                    ..player.clone()
                }
            } else {
                player.clone()
            }
        })
        .collect_vec()
}

/// Adds `value` to the score of player `id` if the answer was correct
pub fn apply_question_result(
    players: &[Player],
    id: &PlayerId,
    value: u32,
    is_correct: bool,
) -> Vec<Player> {
    let delta = if is_correct { i64::from(value) } else { 0 };
    players
        .iter()
        .map(|player| {
            if &player.id == id {
                Player {
                    score: player.score.saturating_add(delta),
                    ..player.clone()
                }
            } else {
                player.clone()
            }
        })
        .collect_vec()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn ids(players: &[Player]) -> Vec<&str> {
        players.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_create_initial_players() {
        let players = create_initial_players(3);
        assert_eq!(ids(&players), ["p1", "p2", "p3"]);
        assert_eq!(players[2].name, "Player 3");
        assert!(players.iter().all(|p| p.score == 0));
    }

    #[test]
    fn test_create_initial_players_clamps() {
        assert_eq!(create_initial_players(0).len(), MIN_PLAYERS);
        assert_eq!(create_initial_players(100).len(), MAX_PLAYERS);
    }

    #[test]
    fn test_player_id_number() {
        assert_eq!(PlayerId::from("p12").number(), Some(12));
        assert_eq!(PlayerId::from("p").number(), None);
        assert_eq!(PlayerId::from("p1a").number(), None);
        assert_eq!(PlayerId::from("x3").number(), None);
        assert_eq!(PlayerId::from("p+3").number(), None);
    }

    #[test]
    fn test_normalize_players_empty_inputs() {
        for raw in [Value::Null, json!([]), json!("players"), json!({"id": "p1"})] {
            let players = normalize_players(&raw);
            assert_eq!(players, create_initial_players(1));
        }
    }

    #[test]
    fn test_normalize_players_repairs_entries() {
        let raw = json!([
            {"id": "alpha", "name": "  Ann  ", "score": 300},
            {"id": "", "name": "   ", "score": "lots"},
            {"name": "Cid", "score": 12.7},
            null,
        ]);
        let players = normalize_players(&raw);

        assert_eq!(ids(&players), ["alpha", "p2", "p3", "p4"]);
        assert_eq!(players[0].name, "Ann");
        assert_eq!(players[0].score, 300);
        assert_eq!(players[1].name, "Player 2");
        assert_eq!(players[1].score, 0);
        assert_eq!(players[2].name, "Cid");
        assert_eq!(players[2].score, 12);
        assert_eq!(players[3].name, "Player 4");
    }

    #[test]
    fn test_normalize_players_keeps_negative_scores() {
        let players = normalize_players(&json!([{"id": "p1", "name": "A", "score": -200}]));
        assert_eq!(players[0].score, -200);
    }

    #[test]
    fn test_normalize_players_truncates_roster() {
        let raw = Value::Array((0..20).map(|i| json!({"id": format!("p{}", i + 1)})).collect());
        let players = normalize_players(&raw);
        assert_eq!(players.len(), MAX_PLAYERS);
        assert_eq!(players.last().unwrap().id.as_str(), "p15");
    }

    #[test]
    fn test_normalize_players_resolves_duplicate_ids() {
        let raw = json!([{"id": "p2", "name": "A"}, {"name": "B"}, {"id": "p2", "name": "C"}]);
        let players = normalize_players(&raw);
        assert_eq!(ids(&players), ["p2", "p3", "p4"]);
    }

    #[test]
    fn test_normalize_players_cuts_long_names() {
        let raw = json!([{"id": "p1", "name": "x".repeat(50)}]);
        let players = normalize_players(&raw);
        assert_eq!(players[0].name.chars().count(), MAX_NAME_LENGTH);
        assert!(players[0].validate().is_ok());
    }

    #[test]
    fn test_add_player_uses_next_suffix() {
        let players = create_initial_players(3);
        let players = remove_player(&players);
        let players = rename_player(&players, &"p1".into(), "Zed");
        let players = add_player(&players);
        assert_eq!(ids(&players), ["p1", "p2", "p3"]);

        let custom = normalize_players(&json!([{"id": "host"}, {"id": "p7"}]));
        assert_eq!(ids(&add_player(&custom)), ["host", "p7", "p8"]);
    }

    #[test]
    fn test_add_player_after_largest_suffix() {
        let max_id = format!("p{}", u64::MAX);
        let players = normalize_players(&json!([{"id": max_id, "name": "A"}]));

        let players = add_player(&add_player(&players));
        assert_eq!(ids(&players), [max_id.as_str(), "p1", "p2"]);
    }

    #[test]
    fn test_normalize_players_repairs_duplicate_largest_suffix() {
        let max_id = format!("p{}", u64::MAX);
        let players = normalize_players(&json!([{"id": max_id}, {"id": max_id}, {"id": "p1"}]));
        assert_eq!(ids(&players), [max_id.as_str(), "p2", "p1"]);
    }

    #[test]
    fn test_add_player_at_capacity_is_noop() {
        let players = create_initial_players(MAX_PLAYERS);
        assert_eq!(add_player(&players), players);
    }

    #[test]
    fn test_remove_player_drops_last() {
        let players = normalize_players(&json!([{"id": "p3"}, {"id": "p1"}, {"id": "p2"}]));
        assert_eq!(ids(&remove_player(&players)), ["p3", "p1"]);
    }

    #[test]
    fn test_remove_player_at_minimum_is_noop() {
        let players = create_initial_players(1);
        assert_eq!(remove_player(&players), players);
    }

    #[test]
    fn test_rename_player() {
        let players = create_initial_players(2);
        let renamed = rename_player(&players, &"p2".into(), "  Bea ");
        assert_eq!(renamed[1].name, "Bea");
        assert_eq!(renamed[0], players[0]);

        let blank = rename_player(&players, &"p1".into(), " \t ");
        assert_eq!(blank[0].name, UNNAMED);
    }

    #[test]
    fn test_rename_unknown_player_is_noop() {
        let players = create_initial_players(2);
        assert_eq!(rename_player(&players, &"p9".into(), "Ghost"), players);
    }

    #[test]
    fn test_apply_question_result() {
        let players = create_initial_players(2);
        let scored = apply_question_result(&players, &"p1".into(), 400, true);
        assert_eq!(scored[0].score, 400);
        assert_eq!(scored[1].score, 0);

        let missed = apply_question_result(&scored, &"p1".into(), 600, false);
        assert_eq!(missed, scored);

        let unknown = apply_question_result(&scored, &"p5".into(), 800, true);
        assert_eq!(unknown, scored);
    }

    fn roster(size: usize, removals: usize) -> Vec<Player> {
        let mut players = create_initial_players(size + removals);
        for _ in 0..removals {
            players = remove_player(&players);
        }
        players
    }

    proptest! {
        #[test]
        fn add_then_remove_restores_roster(size in 1usize..=MAX_PLAYERS, removals in 0usize..3) {
            let players = roster(size, removals.min(MAX_PLAYERS - size));
            let round_trip = remove_player(&add_player(&players));

            if players.len() == MAX_PLAYERS {
                prop_assert_eq!(round_trip.len(), MAX_PLAYERS - 1);
            } else {
                prop_assert_eq!(&round_trip, &players);
            }
        }

        #[test]
        fn added_ids_are_unique(size in 1usize..MAX_PLAYERS, removals in 0usize..5) {
            let players = add_player(&roster(size, removals.min(MAX_PLAYERS - size)));
            let unique: HashSet<_> = players.iter().map(|p| &p.id).collect();
            prop_assert_eq!(unique.len(), players.len());
        }

        #[test]
        fn question_result_only_touches_target(
            size in 1usize..=MAX_PLAYERS,
            target in 0usize..MAX_PLAYERS,
            value in prop::sample::select(vec![200u32, 400, 600, 800]),
            is_correct in any::<bool>(),
        ) {
            let players = create_initial_players(size);
            let target = target % size;
            let id = players[target].id.clone();
            let next = apply_question_result(&players, &id, value, is_correct);

            prop_assert_eq!(ids(&next), ids(&players));
            for (index, (before, after)) in players.iter().zip(&next).enumerate() {
                let expected = if index == target && is_correct {
                    before.score + i64::from(value)
                } else {
                    before.score
                };
                prop_assert_eq!(after.score, expected);
            }
        }
    }
}
