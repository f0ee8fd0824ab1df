//! Table actor message types.

use tokio::sync::oneshot;

use crate::game::engine::{TableError, TimerEvent};
use crate::game::entities::{Chips, PlayerId, SeatIndex, SeatOption};
use crate::game::events::TableSnapshot;

/// Messages that can be sent to a [`super::actor::TableActor`]. One
/// variant per inbound player action, plus internal timer delivery.
#[derive(Debug)]
pub enum TableCommand {
    /// Look up the first open seat (the lobby → table transition).
    FindSeat {
        response: oneshot::Sender<Option<SeatIndex>>,
    },

    /// Sit down with a buy-in.
    Join {
        player_id: PlayerId,
        name: String,
        /// The player's off-table bankroll, as vouched by the caller.
        bankroll: Chips,
        buy_in: Chips,
        seat: SeatIndex,
        wait_for_big_blind: bool,
        response: oneshot::Sender<TableResponse>,
    },

    /// Leave the table, settling the balance.
    Leave {
        player_id: PlayerId,
        response: oneshot::Sender<TableResponse>,
    },

    /// A seated-but-out player asks to be dealt back in.
    SitIn {
        player_id: PlayerId,
        response: oneshot::Sender<TableResponse>,
    },

    /// Answer to the blind prompt; `false` sits the player out.
    PostBlind {
        player_id: PlayerId,
        post: bool,
        response: oneshot::Sender<TableResponse>,
    },

    Check {
        player_id: PlayerId,
        response: oneshot::Sender<TableResponse>,
    },

    Fold {
        player_id: PlayerId,
        response: oneshot::Sender<TableResponse>,
    },

    Call {
        player_id: PlayerId,
        response: oneshot::Sender<TableResponse>,
    },

    /// Open the betting; `amount` is the total wager.
    Bet {
        player_id: PlayerId,
        amount: Chips,
        response: oneshot::Sender<TableResponse>,
    },

    /// Raise to `amount` total.
    Raise {
        player_id: PlayerId,
        amount: Chips,
        response: oneshot::Sender<TableResponse>,
    },

    /// Choose how to enter the next hand while waiting.
    UpdateSeatOption {
        player_id: PlayerId,
        option: SeatOption,
        response: oneshot::Sender<TableResponse>,
    },

    SitOutBigBlind {
        player_id: PlayerId,
        value: bool,
        response: oneshot::Sender<TableResponse>,
    },

    SitOutNextHand {
        player_id: PlayerId,
        value: bool,
        response: oneshot::Sender<TableResponse>,
    },

    /// Buy more chips; applied at once between hands, else deferred.
    DepositChips {
        player_id: PlayerId,
        amount: Chips,
        response: oneshot::Sender<TableResponse>,
    },

    /// Current public state of the table.
    GetSnapshot {
        response: oneshot::Sender<TableSnapshot>,
    },

    /// Shut the table down.
    Close {
        response: oneshot::Sender<TableResponse>,
    },

    /// Internal: a scheduled task expired. Stale generations are
    /// dropped by the actor.
    TimerFired {
        generation: u64,
        event: TimerEvent,
    },
}

/// Response from table operations.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TableResponse {
    /// Operation succeeded.
    Success,

    /// Operation succeeded with a caller-facing note.
    SuccessWithMessage(String),

    /// Out-of-turn or phase-illegal action, dropped as a benign race.
    /// Nothing changed.
    Ignored,

    /// A precondition failed; nothing changed.
    Error(TableError),
}

impl TableResponse {
    /// Check if response is success
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::SuccessWithMessage(_))
    }

    /// Get the failure reason, if there is one to surface.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Error(err) => Some(err.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_variants() {
        assert!(TableResponse::Success.is_success());
        assert!(TableResponse::SuccessWithMessage("ok".to_string()).is_success());
        assert!(!TableResponse::Ignored.is_success());
        assert!(!TableResponse::Error(TableError::SeatTaken).is_success());
    }

    #[test]
    fn test_error_message_only_for_errors() {
        assert!(TableResponse::Ignored.error_message().is_none());
        let msg = TableResponse::Error(TableError::InsufficientChips)
            .error_message()
            .unwrap();
        assert!(msg.contains("chips"));
    }
}
