//! The game controller
//!
//! [`GameController`] owns the [`GameState`], the loaded question bank
//! and the transient modal state. Each user intent maps to one method.
//! A method that changes the game builds the next state, then persists
//! it, then re-renders, so the renderer never sees a half-applied
//! action and every action produces exactly one write.
//!
//! A single question cell moves `Unused -> Opened -> AnswerRevealed ->
//! Resolved`. `Resolved` is terminal; dismissing an opened question
//! leaves it unused.

use garde::Validate;
use itertools::Itertools;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::{
    bank::{GameData, LoadError, QuestionId, QuestionView},
    config::{self, Options},
    constants::storage::VERSION,
    persistence::{KeyValueStore, StatePersistence, StoredState, build_initial_state},
    roster::{self, PlayerId},
    state::{GameState, next_player_id, normalized_current_player_id},
    view::{Renderer, Status, View},
};

const LOADING: &str = "Loading game data...";
const NOT_LOADED: &str = "Game data has not loaded yet.";
const QUESTION_NOT_FOUND: &str = "No question found for this cell. Cell marked as played.";
const SELECT_PLAYER: &str = "Select a player to record the result.";
const RESET: &str = "Game reset.";

/// The question currently open in the modal
///
/// This is never persisted: a reload closes the modal and the question
/// stays unused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveQuestion {
    /// The question with its category name
    pub question: QuestionView,
    /// Whether the answer text is shown
    pub answer_revealed: bool,
    /// The player the result will be recorded for
    pub selected_player: Option<PlayerId>,
}

impl ActiveQuestion {
    /// Whether the answer can still be revealed
    pub fn can_reveal(&self) -> bool {
        !self.answer_revealed
    }
}

/// Recoverable problems with a user action
///
/// None of these change the game state.
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The board was used before the question bank arrived
    #[error("game data has not loaded yet")]
    DataNotLoaded,
    /// The question was already resolved
    #[error("question has already been played")]
    AlreadyUsed,
    /// There is no open question to act on
    #[error("no question is open")]
    NoActiveQuestion,
    /// The selected answering player is not in the roster
    #[error("no player selected")]
    NoPlayerSelected,
}

/// What happened when a board cell was clicked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// The question is now open in the modal
    Opened,
    /// The cell's question is not in the bank; it was marked as played
    MarkedUnresolvable,
}

/// Repairs a version-checked record into a usable state
fn restore_state(stored: &StoredState) -> GameState {
    let used = match &stored.used {
        Value::Array(ids) => ids
            .iter()
            .filter_map(Value::as_str)
            .unique()
            .map(QuestionId::from)
            .collect(),
        _ => Vec::new(),
    };

    GameState {
        version: VERSION,
        players: roster::normalize_players(&stored.players),
        used,
        current_player_id: stored
            .current_player_id
            .as_str()
            .filter(|id| !id.is_empty())
            .map(PlayerId::from),
    }
}

/// Drives one game session
pub struct GameController<S, R> {
    options: Options,
    persistence: StatePersistence<S>,
    renderer: R,
    state: GameState,
    data: Option<GameData>,
    active_question: Option<ActiveQuestion>,
    status: Status,
}

impl<S: KeyValueStore, R: Renderer> GameController<S, R> {
    /// Starts a session
    ///
    /// Restores the stored snapshot if there is a usable one, otherwise
    /// builds a fresh game with `options.initial_players` players. The
    /// resulting state is persisted and rendered right away; the board
    /// stays empty until [`finish_loading`](Self::finish_loading) is called.
    ///
    /// # Errors
    ///
    /// Returns [`config::Error::Invalid`] if `options` fail validation.
    pub fn new(options: Options, store: S, renderer: R) -> Result<Self, config::Error> {
        options.validate()?;

        let persistence = StatePersistence::new(store, options.storage_key.clone());
        let state = match persistence.load() {
            Some(stored) => {
                tracing::info!("Resuming stored game");
                restore_state(&stored)
            }
            None => {
                tracing::info!("Starting a new game");
                build_initial_state(roster::create_initial_players(options.initial_players))
            }
        }
        .with_normalized_current_player();

        let mut controller = Self {
            options,
            persistence,
            renderer,
            state,
            data: None,
            active_question: None,
            status: Status::info(LOADING),
        };

        controller.persist();
        controller.render();
        controller.renderer.show_status(&controller.status);

        Ok(controller)
    }

    /// The persisted game state
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// The question bank, once loaded
    pub fn data(&self) -> Option<&GameData> {
        self.data.as_ref()
    }

    /// The question open in the modal
    pub fn active_question(&self) -> Option<&ActiveQuestion> {
        self.active_question.as_ref()
    }

    /// The last status line shown
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// The options the session was started with
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The snapshot storage
    pub fn persistence(&self) -> &StatePersistence<S> {
        &self.persistence
    }

    /// The renderer
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// A read-only view for rendering
    pub fn view(&self) -> View<'_> {
        View {
            state: &self.state,
            data: self.data.as_ref(),
            active_question: self.active_question.as_ref(),
        }
    }

    /// Whether a result can be recorded for the open question
    pub fn can_submit(&self) -> bool {
        self.view().can_submit()
    }

    fn persist(&mut self) {
        if let Err(e) = self.persistence.save(&self.state) {
            tracing::warn!("Could not save game state: {e}");
        }
    }

    fn render(&mut self) {
        let view = View {
            state: &self.state,
            data: self.data.as_ref(),
            active_question: self.active_question.as_ref(),
        };
        self.renderer.render(&view);
    }

    fn show_status(&mut self, status: Status) {
        self.renderer.show_status(&status);
        self.status = status;
    }

    fn show_current_player_status(&mut self, note: Option<&str>) {
        let status = Status::current_player(note, self.state.current_player());
        self.show_status(status);
    }

    /// Installs `next` as the current state, then persists and renders it
    fn commit(&mut self, next: GameState, note: Option<&str>) {
        let next = next.with_normalized_current_player();
        if let Err(report) = next.validate() {
            tracing::warn!("Game state violates its invariants: {report}");
        }

        self.state = next;
        if let Some(active) = self.active_question.as_mut() {
            active.selected_player = normalized_current_player_id(
                &self.state.players,
                active.selected_player.as_ref(),
            );
        }

        self.persist();
        self.render();
        self.show_current_player_status(note);
    }

    /// Receives the outcome of the question bank load
    ///
    /// On failure the board stays unplayable and the error is shown once;
    /// roster management keeps working.
    pub fn finish_loading(&mut self, result: Result<GameData, LoadError>) {
        match result {
            Ok(data) => {
                let count = data.categories().len();
                tracing::info!("Question bank {:?} ready", data.title());
                self.data = Some(data);
                self.render();

                let note = format!(
                    "Data loaded: {}.",
                    pluralizer::pluralize("category", count as isize, true)
                );
                self.show_current_player_status(Some(&note));
            }
            Err(e) => {
                tracing::warn!("Question bank failed to load: {e}");
                self.show_status(Status::danger(format!("Load error: {e}")));
            }
        }
    }

    /// Appends a player unless the roster is full
    pub fn add_player(&mut self) {
        let players = roster::add_player(&self.state.players);
        self.commit(self.state.clone().with_players(players), None);
    }

    /// Removes the last player unless only one is left
    pub fn remove_player(&mut self) {
        let players = roster::remove_player(&self.state.players);
        self.commit(self.state.clone().with_players(players), None);
    }

    /// Renames a player; blank text becomes "Unnamed"
    pub fn rename_player(&mut self, id: &PlayerId, name: &str) {
        let players = roster::rename_player(&self.state.players, id, name);
        self.commit(self.state.clone().with_players(players), None);
    }

    /// Handles a click on the board cell bound to `id`
    ///
    /// A question missing from the bank is marked as played so the cell
    /// cannot block the board.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataNotLoaded`] before the bank has arrived and
    /// [`Error::AlreadyUsed`] for a resolved question. Neither changes the
    /// state.
    pub fn open_question(&mut self, id: &QuestionId) -> Result<OpenOutcome, Error> {
        if self.data.is_none() {
            self.show_current_player_status(Some(NOT_LOADED));
            return Err(Error::DataNotLoaded);
        }
        if self.state.is_used(id) {
            return Err(Error::AlreadyUsed);
        }

        let Some(question) = self.data.as_ref().and_then(|data| data.find_question(id)) else {
            tracing::warn!("Question {id} is not in the loaded bank, marking it as played");
            let next = self.state.clone().with_question_used(id.clone());
            self.commit(next, Some(QUESTION_NOT_FOUND));
            return Ok(OpenOutcome::MarkedUnresolvable);
        };

        tracing::debug!("Opening question {id}");
        self.active_question = Some(ActiveQuestion {
            question,
            answer_revealed: false,
            selected_player: normalized_current_player_id(
                &self.state.players,
                self.state.current_player_id.as_ref(),
            ),
        });
        self.render();
        Ok(OpenOutcome::Opened)
    }

    /// Shows the answer of the open question
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveQuestion`] if no question is open.
    pub fn reveal_answer(&mut self) -> Result<(), Error> {
        let active = self
            .active_question
            .as_mut()
            .ok_or(Error::NoActiveQuestion)?;
        active.answer_revealed = true;
        self.render();
        Ok(())
    }

    /// Chooses the player the result will be recorded for
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveQuestion`] if no question is open.
    pub fn select_player(&mut self, id: PlayerId) -> Result<(), Error> {
        let active = self
            .active_question
            .as_mut()
            .ok_or(Error::NoActiveQuestion)?;
        active.selected_player = Some(id);
        self.render();
        Ok(())
    }

    /// Closes the modal without resolving the question
    pub fn dismiss_question(&mut self) {
        if self.active_question.take().is_some() {
            self.render();
        }
    }

    /// Records the result of the open question
    ///
    /// A correct answer adds the question's value to the selected player.
    /// Either way the question is marked as played and the turn passes to
    /// the player after the one who answered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveQuestion`] if no question is open and
    /// [`Error::NoPlayerSelected`] if the selected player does not resolve;
    /// the latter is also reported on the status line.
    pub fn apply_result(&mut self, is_correct: bool) -> Result<(), Error> {
        let active = self
            .active_question
            .as_ref()
            .ok_or(Error::NoActiveQuestion)?;

        let question = active.question.clone();
        let player = active
            .selected_player
            .as_ref()
            .and_then(|id| self.state.player(id))
            .cloned();

        let Some(player) = player else {
            self.show_current_player_status(Some(SELECT_PLAYER));
            return Err(Error::NoPlayerSelected);
        };

        let next = self
            .state
            .clone()
            .with_players(roster::apply_question_result(
                &self.state.players,
                &player.id,
                question.value,
                is_correct,
            ))
            .with_current_player(next_player_id(&self.state.players, &player.id))
            .with_question_used(question.id.clone());

        tracing::info!(
            "Question {} resolved by {}: {}",
            question.id,
            player.id,
            if is_correct { "correct" } else { "wrong" }
        );

        let note = if is_correct {
            format!("{} gets {} points.", player.name, question.value)
        } else {
            format!("{} answered incorrectly: score unchanged.", player.name)
        };

        self.active_question = None;
        self.commit(next, Some(&note));
        Ok(())
    }

    /// Starts over with a fresh roster and an empty board
    ///
    /// Confirmation is the caller's business; this resets unconditionally.
    pub fn reset(&mut self) {
        if let Err(e) = self.persistence.clear() {
            tracing::warn!("Could not clear stored game state: {e}");
        }
        tracing::info!("Game reset");

        self.active_question = None;
        let fresh = build_initial_state(roster::create_initial_players(
            self.options.initial_players,
        ));
        self.commit(fresh, Some(RESET));
    }
}
