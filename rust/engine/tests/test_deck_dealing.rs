use std::collections::HashSet;

use tonk_engine::cards::{full_deck, Card};
use tonk_engine::deck::{Deck, HAND_SIZE};
use tonk_engine::errors::GameError;

#[test]
fn built_deck_has_52_unique_cards() {
    let deck = full_deck();
    assert_eq!(deck.len(), 52);
    let mut set = HashSet::new();
    for (i, c) in deck.iter().enumerate() {
        assert!(set.insert(*c), "card {:?} duplicated at position {}", c, i);
    }
}

#[test]
fn shuffle_preserves_the_card_multiset() {
    let mut deck = Deck::new_with_seed(42);
    let before: HashSet<Card> = deck.cards().iter().copied().collect();
    deck.shuffle().expect("shuffle ok");
    let after: HashSet<Card> = deck.cards().iter().copied().collect();
    assert_eq!(before, after);
}

#[test]
fn shuffle_is_deterministic_with_same_seed() {
    let mut d1 = Deck::new_with_seed(12345);
    let mut d2 = Deck::new_with_seed(12345);
    d1.shuffle().unwrap();
    d2.shuffle().unwrap();
    assert_eq!(d1.cards(), d2.cards(), "same seed must yield identical order");
}

#[test]
fn shuffle_differs_with_different_seed() {
    let mut d1 = Deck::new_with_seed(1);
    let mut d2 = Deck::new_with_seed(2);
    d1.shuffle().unwrap();
    d2.shuffle().unwrap();
    assert_ne!(
        d1.cards(),
        d2.cards(),
        "different seeds should produce different orders (high probability)"
    );
}

#[test]
fn dealt_hands_partition_the_deck() {
    for players in 2..=6 {
        let mut deck = Deck::new_with_seed(players as u64);
        deck.shuffle().unwrap();
        let original: HashSet<Card> = deck.cards().iter().copied().collect();

        let (hands, stock) = deck.deal(players).expect("deal ok");
        assert_eq!(hands.len(), players);
        assert!(hands.iter().all(|h| h.len() == HAND_SIZE));

        let mut seen = HashSet::new();
        for card in hands.iter().flatten().chain(stock.iter()) {
            assert!(seen.insert(*card), "hands and stock must be disjoint");
        }
        assert_eq!(seen, original, "union must equal the original deck");
    }
}

#[test]
fn deal_fails_when_hands_exceed_deck() {
    let deck = Deck::new_with_seed(9);
    match deck.deal(11) {
        Err(GameError::InsufficientCards { needed, available }) => {
            assert_eq!(needed, 55);
            assert_eq!(available, 52);
        }
        other => panic!("expected InsufficientCards, got {:?}", other),
    }
}
