use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::cards::Card;
use super::eval::HandRating;

/// Type alias for whole chips. All bets and player stacks are
/// represented as whole chips (there's no point arguing over pennies).
///
/// If the total money on a table ever surpasses ~4.2 billion, then we
/// may have a problem.
pub type Chips = u32;

/// Type alias for seat positions on a table.
pub type SeatIndex = usize;

/// Stable table identifier, assigned by the manager at creation and
/// valid for the process lifetime.
pub type TableId = u64;

/// Stable player identifier. Decoupled from any transport/session
/// identifier; a reconnecting player keeps their id and their seat.
pub type PlayerId = Uuid;

/// The betting-round state machine phases. Linear with skip-on-condition:
/// idle → smallBlind → bigBlind → preflop → flop → turn → river →
/// showdown → idle (or straight into the next smallBlind).
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Idle,
    SmallBlind,
    BigBlind,
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
}

impl Phase {
    /// The four phases in which players act on their own initiative.
    #[must_use]
    pub fn is_betting(self) -> bool {
        matches!(self, Self::Preflop | Self::Flop | Self::Turn | Self::River)
    }

    /// Phases settled before any community card is dealt; these use the
    /// flat preflop rake rule.
    #[must_use]
    pub fn is_preflop_rake(self) -> bool {
        matches!(self, Self::SmallBlind | Self::BigBlind | Self::Preflop)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Idle => "idle",
            Self::SmallBlind => "smallBlind",
            Self::BigBlind => "bigBlind",
            Self::Preflop => "preflop",
            Self::Flop => "flop",
            Self::Turn => "turn",
            Self::River => "river",
            Self::Showdown => "showdown",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Blinds {
    pub small: Chips,
    pub big: Chips,
}

impl fmt::Display for Blinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.small, self.big)
    }
}

/// How a mid-hand joiner enters the next hand.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SeatOption {
    /// Post the big blind immediately next hand, whatever the position.
    PostBlinds,
    /// Wait until action would naturally reach the big blind.
    WaitForBigBlind,
}

/// One occupied seat: the player's identity, their chips on and off the
/// table, and all per-hand state.
#[derive(Debug)]
pub struct Seat {
    pub player_id: PlayerId,
    pub name: String,
    /// Off-table bankroll. Settled back to the persistence gateway at
    /// the end of every hand and on leave.
    pub chips: Chips,
    /// In-play stack.
    pub chips_in_play: Chips,
    /// Current-round wager, not yet folded into the pot.
    pub bet: Chips,
    pub cards: Vec<Card>,
    pub in_hand: bool,
    pub has_cards: bool,
    /// Hole cards shown face-up at showdown.
    pub revealed: bool,
    pub sitting_in: bool,
    pub waiting_to_sit_in: bool,
    pub seat_option: Option<SeatOption>,
    pub sit_out_big_blind: bool,
    pub sit_out_next_hand: bool,
    /// Reserve seconds usable once the normal action timer expires.
    pub time_bank: u32,
    /// Chips bought mid-hand, applied when the hand ends.
    pub pending_deposit: Option<Chips>,
    pub hand: Option<HandRating>,
    /// Last hand's winnings, for display only.
    pub winnings: Chips,
}

impl Seat {
    #[must_use]
    pub fn new(
        player_id: PlayerId,
        name: String,
        bankroll: Chips,
        buy_in: Chips,
        time_bank: u32,
    ) -> Self {
        Self {
            player_id,
            name,
            chips: bankroll - buy_in,
            chips_in_play: buy_in,
            bet: 0,
            cards: Vec::with_capacity(2),
            in_hand: false,
            has_cards: false,
            revealed: false,
            sitting_in: false,
            waiting_to_sit_in: false,
            seat_option: None,
            sit_out_big_blind: false,
            sit_out_next_hand: false,
            time_bank,
            pending_deposit: None,
            hand: None,
            winnings: 0,
        }
    }

    /// Move up to `amount` chips from the stack into the current-round
    /// wager. A short stack goes all-in for whatever remains. Returns
    /// the amount actually wagered.
    pub fn place_bet(&mut self, amount: Chips) -> Chips {
        let amount = amount.min(self.chips_in_play);
        self.chips_in_play -= amount;
        self.bet += amount;
        amount
    }

    /// A seat is all-in while it still holds cards with nothing behind.
    #[must_use]
    pub fn is_all_in(&self) -> bool {
        self.in_hand && self.chips_in_play == 0
    }

    pub fn fold(&mut self) {
        self.in_hand = false;
        self.has_cards = false;
        self.cards.clear();
        self.hand = None;
    }

    pub fn sit_out(&mut self) {
        self.sitting_in = false;
        self.waiting_to_sit_in = false;
        self.fold();
    }

    /// Gets rid of cards and per-hand state; deals the seat in.
    pub fn prepare_for_new_round(&mut self) {
        self.in_hand = true;
        self.has_cards = false;
        self.revealed = false;
        self.cards.clear();
        self.hand = None;
        self.winnings = 0;
    }

    /// Everything this seat holds, for balance settlement and
    /// conservation accounting.
    #[must_use]
    pub fn total_chips(&self) -> Chips {
        self.chips + self.chips_in_play + self.bet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::cards::Suit;

    fn seat() -> Seat {
        Seat::new(Uuid::new_v4(), "alice".to_string(), 1000, 400, 60)
    }

    #[test]
    fn test_buy_in_splits_bankroll() {
        let seat = seat();
        assert_eq!(seat.chips, 600);
        assert_eq!(seat.chips_in_play, 400);
        assert_eq!(seat.total_chips(), 1000);
    }

    #[test]
    fn test_place_bet_moves_chips() {
        let mut seat = seat();
        let moved = seat.place_bet(100);
        assert_eq!(moved, 100);
        assert_eq!(seat.bet, 100);
        assert_eq!(seat.chips_in_play, 300);
        assert_eq!(seat.total_chips(), 1000);
    }

    #[test]
    fn test_short_stack_posts_all_in() {
        let mut seat = seat();
        let moved = seat.place_bet(1000);
        assert_eq!(moved, 400);
        assert_eq!(seat.chips_in_play, 0);
        assert_eq!(seat.bet, 400);
    }

    #[test]
    fn test_all_in_flag_is_implicit() {
        let mut seat = seat();
        seat.in_hand = true;
        assert!(!seat.is_all_in());
        seat.place_bet(400);
        assert!(seat.is_all_in());
        seat.fold();
        assert!(!seat.is_all_in());
    }

    #[test]
    fn test_prepare_for_new_round_clears_hand_state() {
        let mut seat = seat();
        seat.cards = vec![Card(14, Suit::Spade)];
        seat.has_cards = true;
        seat.revealed = true;
        seat.winnings = 50;
        seat.prepare_for_new_round();
        assert!(seat.in_hand);
        assert!(seat.cards.is_empty());
        assert!(!seat.has_cards);
        assert!(!seat.revealed);
        assert_eq!(seat.winnings, 0);
    }

    #[test]
    fn test_phase_classification() {
        assert!(Phase::Preflop.is_betting());
        assert!(Phase::River.is_betting());
        assert!(!Phase::SmallBlind.is_betting());
        assert!(!Phase::Showdown.is_betting());
        assert!(Phase::SmallBlind.is_preflop_rake());
        assert!(Phase::Preflop.is_preflop_rake());
        assert!(!Phase::Flop.is_preflop_rake());
    }
}
