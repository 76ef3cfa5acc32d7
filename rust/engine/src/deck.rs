use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::collections::HashSet;

use crate::cards::{full_deck, Card};
use crate::errors::GameError;

/// Number of cards dealt to every seat at the start of a game.
pub const HAND_SIZE: usize = 5;

#[derive(Debug)]
pub struct Deck {
    cards: Vec<Card>,
    rng: ChaCha20Rng,
}

impl Deck {
    pub fn new() -> Self {
        Self::new_with_seed(rand::random())
    }

    pub fn new_with_seed(seed: u64) -> Self {
        let rng = ChaCha20Rng::seed_from_u64(seed);
        // Keep initial order until shuffle is called explicitly
        Self {
            cards: full_deck(),
            rng,
        }
    }

    /// Uniform Fisher-Yates permutation of the current cards.
    /// Fails closed on a corrupted deck containing duplicate cards.
    pub fn shuffle(&mut self) -> Result<(), GameError> {
        let unique: HashSet<Card> = self.cards.iter().copied().collect();
        if unique.len() != self.cards.len() {
            return Err(GameError::DuplicateCard);
        }
        self.cards.shuffle(&mut self.rng);
        Ok(())
    }

    /// Deals [`HAND_SIZE`] cards to each of `player_count` seats and
    /// returns the hands plus the undealt stock in original relative
    /// order. Hands are dealt round-robin from the front of the deck.
    pub fn deal(mut self, player_count: usize) -> Result<(Vec<Vec<Card>>, Vec<Card>), GameError> {
        let needed = player_count * HAND_SIZE;
        if needed > self.cards.len() {
            return Err(GameError::InsufficientCards {
                needed,
                available: self.cards.len(),
            });
        }

        let mut hands = vec![Vec::with_capacity(HAND_SIZE); player_count];
        for (i, card) in self.cards.drain(..needed).enumerate() {
            hands[i % player_count].push(card);
        }

        Ok((hands, self.cards))
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    #[cfg(test)]
    pub(crate) fn corrupt_with_duplicate(&mut self) {
        self.cards[1] = self.cards[0];
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}
