//! Configuration constants for the board game
//!
//! This module contains the fixed limits and shapes used throughout the
//! crate: roster bounds, the structure every question bank must follow,
//! and the identity of the persisted snapshot.

/// Roster limits
pub mod roster {
    /// Minimum number of players a roster may hold
    pub const MIN_PLAYERS: usize = 1;
    /// Maximum number of players a roster may hold
    pub const MAX_PLAYERS: usize = 15;
    /// Maximum length of a player name in characters
    pub const MAX_NAME_LENGTH: usize = 32;
    /// Name given to a player renamed to blank text
    pub const UNNAMED: &str = "Unnamed";
}

/// Question bank shape
pub mod board {
    /// The point values every bank must declare, in this exact order
    pub const REQUIRED_VALUES: [u32; 4] = [200, 400, 600, 800];
    /// Number of categories every bank must contain
    pub const CATEGORY_COUNT: usize = 5;
}

/// Persisted snapshot identity
pub mod storage {
    /// Schema version of the persisted snapshot; other versions are discarded
    pub const VERSION: u32 = 1;
    /// Default key under which the snapshot is stored
    pub const KEY: &str = "svoyaGame.state";
    /// Maximum length of a storage key
    pub const MAX_KEY_LENGTH: usize = 64;
}
