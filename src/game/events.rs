//! Outbound table events and the broadcast boundary.
//!
//! Every state change is reported as a full [`TableSnapshot`] broadcast;
//! per-seat-only data (hole cards, prompts, time-bank updates) goes out
//! through the unicast side of the same sink. Delivery is fire-and-forget
//! and carries no ordering guarantee relative to persistence.

use serde::Serialize;

use super::cards::Card;
use super::entities::{Blinds, Chips, Phase, PlayerId, SeatIndex, TableId};

/// What the active seat is allowed to do, from the table's point of
/// view. Drives client-side button sets.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionPrompt {
    /// No outstanding bet: check or bet.
    Unraised,
    /// Facing a bet: call, raise or fold.
    Raised,
    /// Everyone else is all-in: call or fold only.
    OthersAllIn,
    /// A short all-in locked raising: call or fold only.
    RaiseLocked,
}

/// Public view of one occupied seat.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatSnapshot {
    pub player_id: PlayerId,
    pub name: String,
    pub chips_in_play: Chips,
    pub bet: Chips,
    pub sitting_in: bool,
    pub in_hand: bool,
    pub has_cards: bool,
    pub all_in: bool,
    pub waiting_to_sit_in: bool,
    pub winnings: Chips,
    /// Hole cards, present only once the seat has shown them.
    pub cards: Option<Vec<Card>>,
}

/// Full public state of a table, emitted after every mutation.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSnapshot {
    pub id: TableId,
    pub name: String,
    pub phase: Phase,
    pub game_is_on: bool,
    pub blinds: Blinds,
    pub board: Vec<Card>,
    /// Pot layer amounts, main pot first.
    pub pots: Vec<Chips>,
    pub biggest_bet: Chips,
    pub initial_bet: Chips,
    pub raise_difference: Chips,
    pub dealer_seat: Option<SeatIndex>,
    pub active_seat: Option<SeatIndex>,
    pub heads_up: bool,
    pub seats: Vec<Option<SeatSnapshot>>,
}

/// Everything a subscriber can be told about a table.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum TableEvent {
    Snapshot(TableSnapshot),
    /// Community cards dealt, full board so far.
    Board { cards: Vec<Card> },
    /// Per-seat: the two cards just dealt to this player.
    HoleCards { cards: Vec<Card> },
    /// Per-seat: this player's current hand name.
    HandName { name: String },
    /// Per-seat: the player must act within `seconds`.
    ActionPrompt { prompt: ActionPrompt, seconds: u32 },
    /// Per-seat: remaining time-bank seconds.
    TimeBank { seconds: u32 },
    /// Per-seat: the table acted for a timed-out player.
    AutoAction,
    /// A player acted; `action` is a stable verb for filtering.
    ActionLog {
        seat: SeatIndex,
        action: &'static str,
        message: String,
    },
    Winner {
        seat: SeatIndex,
        amount: Chips,
        hand: Option<String>,
    },
    GameStopped,
}

impl TableEvent {
    /// Stable event name, usable as a routing key by transports.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => "snapshot",
            Self::Board { .. } => "board",
            Self::HoleCards { .. } => "hole-cards",
            Self::HandName { .. } => "hand-name",
            Self::ActionPrompt { .. } => "action-prompt",
            Self::TimeBank { .. } => "time-bank",
            Self::AutoAction => "auto-action",
            Self::ActionLog { .. } => "action-log",
            Self::Winner { .. } => "winner",
            Self::GameStopped => "game-stopped",
        }
    }
}

/// Broadcast boundary consumed by the engine. Implementations fan the
/// event out to whatever transport is attached; failures must be
/// handled there and never surface back into the game.
pub trait EventSink: Send + Sync {
    /// Deliver to every subscriber of the table.
    fn broadcast(&self, table: TableId, event: &TableEvent);

    /// Deliver to a single seated player.
    fn unicast(&self, table: TableId, player: PlayerId, event: &TableEvent);
}

/// Sink that drops everything. Useful for tests and headless tables.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn broadcast(&self, _table: TableId, _event: &TableEvent) {}

    fn unicast(&self, _table: TableId, _player: PlayerId, _event: &TableEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_stable() {
        let event = TableEvent::HoleCards { cards: vec![] };
        assert_eq!(event.name(), "hole-cards");
        assert_eq!(TableEvent::GameStopped.name(), "game-stopped");
    }

    #[test]
    fn test_events_serialize_with_tag() {
        let event = TableEvent::TimeBank { seconds: 30 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "time-bank");
        assert_eq!(json["data"]["seconds"], 30);
    }
}
