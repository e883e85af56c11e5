//! Read-only view of the game for the rendering layer
//!
//! The controller never draws anything itself. After each action it hands
//! a [`View`] to a [`Renderer`] and reports a [`Status`] line. A view
//! borrows the controller's state, so a renderer cannot mutate it.

use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::{
    bank::{GameData, QuestionId},
    constants::roster::{MAX_PLAYERS, MIN_PLAYERS},
    controller::ActiveQuestion,
    roster::Player,
    state::GameState,
};

/// Severity of a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    /// Regular progress information
    Info,
    /// A failure the user should notice
    Danger,
}

/// The single status line shown above the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    /// Severity
    pub tone: Tone,
    /// Message text
    pub text: String,
}

impl Status {
    /// An informational status
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            tone: Tone::Info,
            text: text.into(),
        }
    }

    /// A failure status
    pub fn danger(text: impl Into<String>) -> Self {
        Self {
            tone: Tone::Danger,
            text: text.into(),
        }
    }

    /// The usual status: an optional note followed by whose turn it is
    pub fn current_player(note: Option<&str>, player: Option<&Player>) -> Self {
        let name = player.map_or("not selected", |player| player.name.as_str());
        match note {
            Some(note) => Self::info(format!("{note} Current player: {name}.")),
            None => Self::info(format!("Current player: {name}.")),
        }
    }
}

/// Receiver of everything the controller wants displayed
///
/// Implementations might write to a DOM, a terminal or a test log.
pub trait Renderer {
    /// Redraws the roster, the board and the open question
    fn render(&mut self, view: &View<'_>);

    /// Replaces the status line
    fn show_status(&mut self, status: &Status);
}

/// Display state of a board cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CellState {
    /// Not played yet; clicking opens the question
    Available,
    /// Already resolved; disabled
    Used,
    /// No question has this value in the category; disabled
    Empty,
}

/// One (category, value) cell of the board
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardCell {
    /// Point value shown on the cell
    pub value: u32,
    /// The question bound to the cell
    pub question_id: Option<QuestionId>,
    /// Whether the cell can be played
    pub state: CellState,
}

/// A category row of the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardRow {
    /// Category display name
    pub category: String,
    /// One cell per value of the ladder
    pub cells: Vec<BoardCell>,
}

/// The player with the highest score
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Leader {
    /// Player name
    pub name: String,
    /// Player score
    pub score: i64,
}

/// Roster panel summary
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSummary {
    /// Number of players
    pub count: usize,
    /// Maximum number of players
    pub capacity: usize,
    /// Whether another player can be added
    pub can_add: bool,
    /// Whether a player can be removed
    pub can_remove: bool,
    /// First player holding the top score
    pub leader: Option<Leader>,
}

impl RosterSummary {
    /// The `count/capacity` counter text
    pub fn counter(&self) -> String {
        format!("{}/{}", self.count, self.capacity)
    }
}

/// Borrowed view of the controller's state
#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
    /// The persisted game state
    pub state: &'a GameState,
    /// The question bank, once loaded
    pub data: Option<&'a GameData>,
    /// The question open in the modal, if any
    pub active_question: Option<&'a ActiveQuestion>,
}

#[skip_serializing_none]
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ViewMessage<'a> {
    title: Option<&'a str>,
    state: &'a GameState,
    roster: RosterSummary,
    board: Option<Vec<BoardRow>>,
    active_question: Option<&'a ActiveQuestion>,
    can_reveal: bool,
    can_submit: bool,
}

impl View<'_> {
    /// Summarises the roster panel
    pub fn roster(&self) -> RosterSummary {
        let players = &self.state.players;
        let leader = players
            .iter()
            .fold(None::<&Player>, |best, player| match best {
                Some(best) if best.score >= player.score => Some(best),
                _ => Some(player),
            })
            .map(|player| Leader {
                name: player.name.clone(),
                score: player.score,
            });

        RosterSummary {
            count: players.len(),
            capacity: MAX_PLAYERS,
            can_add: players.len() < MAX_PLAYERS,
            can_remove: players.len() > MIN_PLAYERS,
            leader,
        }
    }

    /// Lays out the board, or `None` while the question bank is loading
    pub fn board(&self) -> Option<Vec<BoardRow>> {
        let data = self.data?;
        let used = self.state.used_set();

        Some(
            data.categories()
                .iter()
                .map(|category| BoardRow {
                    category: category.name.clone(),
                    cells: data
                        .values()
                        .iter()
                        .map(|&value| match category.question_with_value(value) {
                            Some(question) => BoardCell {
                                value,
                                question_id: Some(question.id.clone()),
                                state: if used.contains(&question.id) {
                                    CellState::Used
                                } else {
                                    CellState::Available
                                },
                            },
                            None => BoardCell {
                                value,
                                question_id: None,
                                state: CellState::Empty,
                            },
                        })
                        .collect(),
                })
                .collect(),
        )
    }

    /// Whether the "show answer" button is enabled
    pub fn can_reveal(&self) -> bool {
        self.active_question.is_some_and(ActiveQuestion::can_reveal)
    }

    /// Whether the correct/wrong buttons are enabled
    ///
    /// Both require the answer to be revealed and the selected player to
    /// be in the roster.
    pub fn can_submit(&self) -> bool {
        self.active_question.is_some_and(|active| {
            active.answer_revealed
                && active
                    .selected_player
                    .as_ref()
                    .is_some_and(|id| self.state.player(id).is_some())
        })
    }

    /// Serializes the view, with the derived board and roster, to JSON
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(&ViewMessage {
            title: self.data.map(GameData::title),
            state: self.state,
            roster: self.roster(),
            board: self.board(),
            active_question: self.active_question,
            can_reveal: self.can_reveal(),
            can_submit: self.can_submit(),
        })
        .expect("default serializer cannot fail")
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{
        bank::tests::sample_data,
        persistence::build_initial_state,
        roster::{self, PlayerId},
    };
    use serde_json::json;

    fn state_with_scores(scores: &[i64]) -> GameState {
        let players = roster::create_initial_players(scores.len())
            .into_iter()
            .zip(scores)
            .map(|(player, &score)| Player { score, ..player })
            .collect();
        build_initial_state(players)
    }

    fn active(revealed: bool, selected: Option<&str>) -> ActiveQuestion {
        ActiveQuestion {
            question: sample_data().find_question(&"q11".into()).unwrap(),
            answer_revealed: revealed,
            selected_player: selected.map(PlayerId::from),
        }
    }

    #[test]
    fn test_status_current_player() {
        let players = roster::create_initial_players(1);
        assert_eq!(
            Status::current_player(None, players.first()).text,
            "Current player: Player 1."
        );
        assert_eq!(
            Status::current_player(Some("Game reset."), None).text,
            "Game reset. Current player: not selected."
        );
        assert_eq!(Status::danger("x").tone, Tone::Danger);
    }

    #[test]
    fn test_roster_summary() {
        let state = state_with_scores(&[200, 600, 600]);
        let view = View {
            state: &state,
            data: None,
            active_question: None,
        };
        let summary = view.roster();
        assert_eq!(summary.counter(), "3/15");
        assert!(summary.can_add);
        assert!(summary.can_remove);
        assert_eq!(
            summary.leader,
            Some(Leader {
                name: "Player 2".to_string(),
                score: 600
            })
        );
    }

    #[test]
    fn test_roster_summary_bounds() {
        let single = state_with_scores(&[0]);
        let view = View {
            state: &single,
            data: None,
            active_question: None,
        };
        assert!(!view.roster().can_remove);

        let full = state_with_scores(&[0; MAX_PLAYERS]);
        let view = View {
            state: &full,
            data: None,
            active_question: None,
        };
        assert!(!view.roster().can_add);
    }

    #[test]
    fn test_board_marks_used_cells() {
        let data = sample_data();
        let state = state_with_scores(&[0]).with_question_used("q23".into());
        let view = View {
            state: &state,
            data: Some(&data),
            active_question: None,
        };

        let board = view.board().unwrap();
        assert_eq!(board.len(), 5);
        assert_eq!(board[1].category, "Category 2");
        assert_eq!(board[1].cells[2].value, 600);
        assert_eq!(board[1].cells[2].state, CellState::Used);
        assert_eq!(board[1].cells[1].state, CellState::Available);
        assert_eq!(board[1].cells[1].question_id, Some("q22".into()));
    }

    #[test]
    fn test_board_absent_until_loaded() {
        let state = state_with_scores(&[0]);
        let view = View {
            state: &state,
            data: None,
            active_question: None,
        };
        assert!(view.board().is_none());
    }

    #[test]
    fn test_button_states() {
        let state = state_with_scores(&[0, 0]);
        let cases = [
            (active(false, Some("p1")), true, false),
            (active(true, Some("p1")), false, true),
            (active(true, Some("p9")), false, false),
            (active(true, None), false, false),
        ];

        for (active, can_reveal, can_submit) in cases {
            let view = View {
                state: &state,
                data: None,
                active_question: Some(&active),
            };
            assert_eq!(view.can_reveal(), can_reveal);
            assert_eq!(view.can_submit(), can_submit);
        }
    }

    #[test]
    fn test_to_message() {
        let data = sample_data();
        let state = state_with_scores(&[400]);
        let view = View {
            state: &state,
            data: Some(&data),
            active_question: None,
        };

        let message: serde_json::Value = serde_json::from_str(&view.to_message()).unwrap();
        assert_eq!(message["title"], json!("Sample"));
        assert_eq!(message["roster"]["leader"]["score"], json!(400));
        assert_eq!(message["board"][0]["cells"][0]["state"], json!("available"));
        assert_eq!(message["state"]["currentPlayerId"], json!("p1"));
        assert!(message.get("activeQuestion").is_none());
    }
}
