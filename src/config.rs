//! Runtime options for a game session
//!
//! Options are plain data that can be embedded in a host application's
//! own configuration file. They are validated with `garde` before a
//! controller is constructed from them.

use garde::Validate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants;

/// Options controlling how a [`GameController`](crate::controller::GameController)
/// starts up and where it keeps its snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Key of the single persisted record
    #[garde(length(min = 1, max = constants::storage::MAX_KEY_LENGTH))]
    pub storage_key: String,
    /// Number of players in a freshly built game (startup without a snapshot, reset)
    #[garde(range(min = constants::roster::MIN_PLAYERS, max = constants::roster::MAX_PLAYERS))]
    pub initial_players: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            storage_key: constants::storage::KEY.to_owned(),
            initial_players: constants::roster::MIN_PLAYERS,
        }
    }
}

/// Errors produced while reading options
#[derive(Error, Debug)]
pub enum Error {
    /// The options document is not valid JSON for [`Options`]
    #[error("options are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The options parsed but violate a limit
    #[error("options are invalid: {0}")]
    Invalid(#[from] garde::Report),
}

impl Options {
    /// Parses and validates options from a JSON document
    ///
    /// Missing fields take their default value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the text does not parse and
    /// [`Error::Invalid`] if a field is out of bounds.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        let options: Self = serde_json::from_str(text)?;
        options.validate()?;
        Ok(options)
    }
}
