//! Pure meld validation and hand scoring. No I/O, no state.

use crate::cards::Card;

/// Decides whether a candidate drop is a legal meld: at least three
/// cards that either all share a rank (a set) or all share a suit with
/// point values forming a contiguous ascending run.
pub fn is_valid_meld(cards: &[Card]) -> bool {
    if cards.len() < 3 {
        return false;
    }

    if cards.iter().all(|c| c.rank == cards[0].rank) {
        return true;
    }

    if !cards.iter().all(|c| c.suit == cards[0].suit) {
        return false;
    }

    let mut values: Vec<u32> = cards.iter().map(|c| c.value()).collect();
    values.sort_unstable();
    values.windows(2).all(|w| w[1] == w[0] + 1)
}

/// Sum of the point values held in a hand.
pub fn hand_value(cards: &[Card]) -> u32 {
    cards.iter().map(|c| c.value()).sum()
}
