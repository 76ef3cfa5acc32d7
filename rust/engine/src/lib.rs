//! # tonk-engine: Tonk Card Game Core
//!
//! An authoritative engine for multi-player tonk tables: deck and deal
//! mechanics, the per-table turn state machine, meld validation,
//! scoring, and win resolution. The crate is pure and synchronous;
//! transport, persistence, and balance collaborators live in the
//! hosting layer.
//!
//! ## Core Modules
//!
//! - [`cards`] - Card representation (Suit, Rank, Card) and deck construction
//! - [`deck`] - Uniform shuffling with ChaCha20 RNG and fixed-size dealing
//! - [`meld`] - Pure meld validation and hand scoring
//! - [`game`] - The per-table session state machine and win resolution
//! - [`errors`] - Error taxonomy for game operations
//!
//! ## Quick Start
//!
//! ```rust
//! use tonk_engine::deck::Deck;
//! use tonk_engine::game::{GameSession, PlayerAction, SeatInfo};
//! use uuid::Uuid;
//!
//! let roster: Vec<SeatInfo> = (0..2)
//!     .map(|i| SeatInfo {
//!         player_id: Uuid::new_v4(),
//!         name: format!("player-{i}"),
//!         avatar: None,
//!     })
//!     .collect();
//!
//! let mut session = GameSession::start(
//!     Uuid::new_v4(),
//!     &roster,
//!     10,
//!     Deck::new_with_seed(42),
//! )
//! .expect("session starts");
//!
//! let first = session.seats()[0].player_id;
//! session
//!     .apply(first, PlayerAction::DrawFromDeck)
//!     .expect("draw is legal on your turn");
//! ```
//!
//! ## Deterministic Gameplay
//!
//! Deals are reproducible using seeded RNG:
//!
//! ```rust
//! use tonk_engine::deck::Deck;
//!
//! // Same seed produces same shuffle
//! let deck1 = Deck::new_with_seed(42);
//! let deck2 = Deck::new_with_seed(42);
//! // deck1 and deck2 will have identical card order
//! ```

pub mod cards;
pub mod deck;
pub mod errors;
pub mod game;
pub mod meld;
