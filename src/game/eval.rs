//! Hand-strength evaluation boundary.
//!
//! The engine never ranks hands itself; it asks a [`HandEvaluator`] and
//! compares the opaque ratings it gets back. Higher rating wins, equal
//! ratings share the pot.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::cards::Card;

/// The result of evaluating a player's hole cards against the board.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct HandRating {
    /// Comparable strength. Any two ratings produced for the same board
    /// are ordered; ties split the pot.
    pub rating: u32,
    /// Display name, e.g. "two pair, kings and fours".
    pub name: String,
    /// The five cards that make up the rated hand, strongest first.
    pub cards: Vec<Card>,
}

impl fmt::Display for HandRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Capability contract for hand evaluation.
pub trait HandEvaluator: Send + Sync {
    /// Rate `hole` against however much of the `board` has been dealt.
    /// `board` may be empty (preflop rating of hole cards alone).
    fn evaluate(&self, hole: &[Card], board: &[Card]) -> HandRating;
}
