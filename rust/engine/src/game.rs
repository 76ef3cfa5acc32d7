use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

use crate::cards::Card;
use crate::deck::Deck;
use crate::errors::GameError;
use crate::meld::{hand_value, is_valid_meld};

pub type TableId = Uuid;
pub type PlayerId = Uuid;

/// Hands at or below this value win an outright tonk claim.
pub const TONK_THRESHOLD: u32 = 50;

/// Lifecycle of a table session. `Ended` is terminal and one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Playing,
    Ended,
}

/// Roster entry handed to the engine at deal time. Connection identity
/// stays in the hosting layer; the engine only knows player ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatInfo {
    pub player_id: PlayerId,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// A player's slot in the turn order, fixed at deal time.
#[derive(Debug, Clone)]
pub struct Seat {
    pub player_id: PlayerId,
    pub name: String,
    pub avatar: Option<String>,
    pub hand: Vec<Card>,
    pub is_active_turn: bool,
}

/// A player action during a turn. Validated at the boundary before it
/// reaches the state machine; unknown tags never get this far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlayerAction {
    /// Draw the front card of the stock
    DrawFromDeck,
    /// Draw the top card of the discard pile
    DrawFromDiscard,
    /// Discard one hand card and pass the turn
    Discard { card_index: usize },
    /// Lay down a meld of at least three hand cards
    Drop { card_indices: Vec<usize> },
    /// Claim a low hand to end the round immediately
    TonkClaim,
}

/// Result of a successful action: either play continues or the session
/// reached a terminal condition and the outcome must be committed.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Continue,
    Ended(GameOutcome),
}

/// Terminal summary produced exactly once per session. The hosting
/// layer commits the external effects (winner credit, game record).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameOutcome {
    pub winner_id: PlayerId,
    pub scores: HashMap<PlayerId, u32>,
    pub pot_amount: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Authoritative in-memory state of one table's game: hidden hands,
/// stock, discard pile, turn pointer, and pot.
#[derive(Debug)]
pub struct GameSession {
    table_id: TableId,
    status: GameStatus,
    seats: Vec<Seat>,
    current_turn: usize,
    stock: VecDeque<Card>,
    discard_pile: Vec<Card>,
    pot_amount: u32,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    winner: Option<PlayerId>,
    scores: HashMap<PlayerId, u32>,
}

impl GameSession {
    /// Deals a new session: shuffled deck, one hand per roster entry,
    /// seat 0 active, one stock card seeding the discard pile, and
    /// `seats × stake` in the pot. Stake debits happen in the hosting
    /// layer before this constructor runs.
    pub fn start(
        table_id: TableId,
        roster: &[SeatInfo],
        stake_amount: u32,
        mut deck: Deck,
    ) -> Result<Self, GameError> {
        if roster.len() < 2 {
            return Err(GameError::NotEnoughPlayers(roster.len()));
        }

        deck.shuffle()?;
        let (hands, stock) = deck.deal(roster.len())?;
        let mut stock: VecDeque<Card> = stock.into();

        let seats = roster
            .iter()
            .zip(hands)
            .enumerate()
            .map(|(idx, (info, hand))| Seat {
                player_id: info.player_id,
                name: info.name.clone(),
                avatar: info.avatar.clone(),
                hand,
                is_active_turn: idx == 0,
            })
            .collect::<Vec<_>>();

        let mut discard_pile = Vec::new();
        if let Some(card) = stock.pop_front() {
            discard_pile.push(card);
        }

        Ok(Self {
            table_id,
            status: GameStatus::Playing,
            pot_amount: seats.len() as u32 * stake_amount,
            seats,
            current_turn: 0,
            stock,
            discard_pile,
            start_time: Utc::now(),
            end_time: None,
            winner: None,
            scores: HashMap::new(),
        })
    }

    /// Applies one action for `player_id`. Rejections are side-effect
    /// free; the session is mutated only on `Ok`.
    pub fn apply(
        &mut self,
        player_id: PlayerId,
        action: PlayerAction,
    ) -> Result<TurnOutcome, GameError> {
        if self.status == GameStatus::Ended {
            return Err(GameError::GameEnded);
        }
        if self.seats[self.current_turn].player_id != player_id {
            return Err(GameError::NotYourTurn {
                expected: self.current_turn,
                actual: player_id.to_string(),
            });
        }

        match action {
            PlayerAction::DrawFromDeck => {
                let card = self.stock.pop_front().ok_or(GameError::DeckExhausted)?;
                self.seats[self.current_turn].hand.push(card);
                Ok(TurnOutcome::Continue)
            }
            PlayerAction::DrawFromDiscard => {
                let card = self.discard_pile.pop().ok_or(GameError::DiscardEmpty)?;
                self.seats[self.current_turn].hand.push(card);
                Ok(TurnOutcome::Continue)
            }
            PlayerAction::Discard { card_index } => {
                let hand_len = self.seats[self.current_turn].hand.len();
                if card_index >= hand_len {
                    return Err(GameError::InvalidIndex {
                        index: card_index,
                        len: hand_len,
                    });
                }
                let card = self.seats[self.current_turn].hand.remove(card_index);
                self.discard_pile.push(card);
                self.advance_turn();
                Ok(TurnOutcome::Continue)
            }
            PlayerAction::Drop { card_indices } => self.apply_drop(&card_indices),
            PlayerAction::TonkClaim => {
                let claimant = self.seats[self.current_turn].player_id;
                let claimed = hand_value(&self.seats[self.current_turn].hand);
                let winner = if claimed <= TONK_THRESHOLD {
                    claimant
                } else {
                    // Penalized claim: lowest hand wins, ties broken by
                    // lowest seat index.
                    self.seats
                        .iter()
                        .min_by_key(|seat| hand_value(&seat.hand))
                        .map(|seat| seat.player_id)
                        .unwrap_or(claimant)
                };
                Ok(TurnOutcome::Ended(self.finish(winner)))
            }
        }
    }

    fn apply_drop(&mut self, card_indices: &[usize]) -> Result<TurnOutcome, GameError> {
        if card_indices.len() < 3 {
            return Err(GameError::InvalidMeld);
        }

        // Strictly descending removal order keeps remaining indices
        // valid through the single removal pass.
        let mut indices = card_indices.to_vec();
        indices.sort_unstable_by(|a, b| b.cmp(a));
        if indices.windows(2).any(|w| w[0] == w[1]) {
            return Err(GameError::InvalidMeld);
        }

        let hand_len = self.seats[self.current_turn].hand.len();
        if indices[0] >= hand_len {
            return Err(GameError::InvalidIndex {
                index: indices[0],
                len: hand_len,
            });
        }

        let cards: Vec<Card> = indices
            .iter()
            .map(|&i| self.seats[self.current_turn].hand[i])
            .collect();
        if !is_valid_meld(&cards) {
            return Err(GameError::InvalidMeld);
        }

        for &i in &indices {
            self.seats[self.current_turn].hand.remove(i);
        }

        if self.seats[self.current_turn].hand.is_empty() {
            let winner = self.seats[self.current_turn].player_id;
            return Ok(TurnOutcome::Ended(self.finish(winner)));
        }

        // The seat keeps the turn after a non-emptying drop and still
        // owes a discard to pass it on.
        Ok(TurnOutcome::Continue)
    }

    fn advance_turn(&mut self) {
        self.seats[self.current_turn].is_active_turn = false;
        self.current_turn = (self.current_turn + 1) % self.seats.len();
        self.seats[self.current_turn].is_active_turn = true;
    }

    fn finish(&mut self, winner_id: PlayerId) -> GameOutcome {
        self.scores = self
            .seats
            .iter()
            .map(|seat| (seat.player_id, hand_value(&seat.hand)))
            .collect();
        self.status = GameStatus::Ended;
        self.winner = Some(winner_id);
        let end_time = Utc::now();
        self.end_time = Some(end_time);

        GameOutcome {
            winner_id,
            scores: self.scores.clone(),
            pot_amount: self.pot_amount,
            start_time: self.start_time,
            end_time,
        }
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    pub fn current_turn(&self) -> usize {
        self.current_turn
    }

    pub fn deck_count(&self) -> usize {
        self.stock.len()
    }

    pub fn top_discard(&self) -> Option<Card> {
        self.discard_pile.last().copied()
    }

    pub fn pot_amount(&self) -> u32 {
        self.pot_amount
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    pub fn scores(&self) -> &HashMap<PlayerId, u32> {
        &self.scores
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn hand_of(&self, player_id: PlayerId) -> Option<&[Card]> {
        self.seats
            .iter()
            .find(|seat| seat.player_id == player_id)
            .map(|seat| seat.hand.as_slice())
    }
}
