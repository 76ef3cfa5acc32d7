use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("It's not player {actual}'s turn (expected seat {expected})")]
    NotYourTurn { expected: usize, actual: String },
    #[error("Invalid card index: {index}, hand size: {len}")]
    InvalidIndex { index: usize, len: usize },
    #[error("Invalid meld")]
    InvalidMeld,
    #[error("Deck is exhausted")]
    DeckExhausted,
    #[error("Discard pile is empty")]
    DiscardEmpty,
    #[error("Insufficient cards: need {needed}, deck has {available}")]
    InsufficientCards { needed: usize, available: usize },
    #[error("Deck contains a duplicate card")]
    DuplicateCard,
    #[error("Need at least 2 players, got {0}")]
    NotEnoughPlayers(usize),
    #[error("Game already ended")]
    GameEnded,
}

impl GameError {
    /// Stable machine-readable kind string, sent back to the acting
    /// connection on rejection.
    pub fn kind(&self) -> &'static str {
        match self {
            GameError::NotYourTurn { .. } => "not_your_turn",
            GameError::InvalidIndex { .. } => "invalid_index",
            GameError::InvalidMeld => "invalid_meld",
            GameError::DeckExhausted => "deck_exhausted",
            GameError::DiscardEmpty => "discard_empty",
            GameError::InsufficientCards { .. } => "insufficient_cards",
            GameError::DuplicateCard => "duplicate_card",
            GameError::NotEnoughPlayers(_) => "not_enough_players",
            GameError::GameEnded => "game_ended",
        }
    }

    /// Soft failures leave the session untouched and are reported at
    /// debug level rather than warn.
    pub fn is_soft(&self) -> bool {
        matches!(self, GameError::DeckExhausted | GameError::DiscardEmpty)
    }
}
