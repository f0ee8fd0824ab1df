use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Suit {
    Club,
    Spade,
    Diamond,
    Heart,
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Club => "♣",
            Self::Spade => "♠",
            Self::Diamond => "♦",
            Self::Heart => "♥",
        };
        write!(f, "{repr}")
    }
}

/// Placeholder for card values.
pub type Value = u8;

/// A card is a tuple of a uInt8 value (deuce=2u8 ... ace=14u8)
/// and a suit.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Card(pub Value, pub Suit);

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let value = match self.0 {
            1 | 14 => "A",
            11 => "J",
            12 => "Q",
            13 => "K",
            v => &v.to_string(),
        };
        let repr = format!("{value}/{}", self.1);
        write!(f, "{repr:>4}")
    }
}

/// Source of cards for a single table's hands. One supply is owned per
/// table; `shuffle` restarts it and `deal` draws without replacement
/// until the next shuffle.
pub trait CardSupply: Send {
    fn shuffle(&mut self);

    fn deal(&mut self, n: usize) -> Vec<Card>;
}

/// The standard 52-card deck. This is instantiated once per table and
/// reshuffled each deal.
#[derive(Debug)]
pub struct StandardDeck {
    cards: [Card; 52],
    deck_idx: usize,
}

impl Default for StandardDeck {
    fn default() -> Self {
        let mut cards: [Card; 52] = [Card(2, Suit::Club); 52];
        for (i, value) in (2u8..=14u8).enumerate() {
            for (j, suit) in [Suit::Club, Suit::Spade, Suit::Diamond, Suit::Heart]
                .into_iter()
                .enumerate()
            {
                cards[4 * i + j] = Card(value, suit);
            }
        }
        Self { cards, deck_idx: 0 }
    }
}

impl CardSupply for StandardDeck {
    fn shuffle(&mut self) {
        self.cards.shuffle(&mut rand::rng());
        self.deck_idx = 0;
    }

    fn deal(&mut self, n: usize) -> Vec<Card> {
        let cards = self.cards[self.deck_idx..self.deck_idx + n].to_vec();
        self.deck_idx += n;
        cards
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_deck_initialization() {
        let deck = StandardDeck::default();
        let unique: HashSet<Card> = deck.cards.iter().copied().collect();
        assert_eq!(unique.len(), 52);
    }

    #[test]
    fn test_deck_shuffle_resets_draw_position() {
        let mut deck = StandardDeck::default();
        let _ = deck.deal(10);
        deck.shuffle();
        assert_eq!(deck.deck_idx, 0);
    }

    #[test]
    fn test_deal_without_replacement() {
        let mut deck = StandardDeck::default();
        deck.shuffle();
        let first = deck.deal(2);
        let second = deck.deal(3);
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 3);
        let mut seen: HashSet<Card> = HashSet::new();
        for card in first.iter().chain(second.iter()) {
            assert!(seen.insert(*card), "card dealt twice: {card}");
        }
    }

    #[test]
    fn test_card_value_range() {
        let deck = StandardDeck::default();
        for card in deck.cards {
            assert!(card.0 >= 2 && card.0 <= 14);
        }
    }
}
