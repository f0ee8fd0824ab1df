//! # Card Table
//!
//! A multi-table poker game engine built around one serialized actor
//! per table.
//!
//! The core of the crate is the per-table engine: a betting-phase state
//! machine, a layered pot ledger with side pots and rake, and a
//! turn-timer/time-bank scheduler. The engine maintains strict
//! chip-conservation and turn-order invariants under races between
//! client actions, server-driven timeouts and mid-hand departures.
//!
//! ## Architecture
//!
//! - [`game`]: synchronous state machine, seat registry, pot ledger,
//!   card and evaluation boundaries. Deferred work is returned as
//!   directives rather than scheduled in place, so the whole state
//!   machine is testable without a runtime.
//! - [`table`]: the tokio side — one actor per table serializing every
//!   mutation, a single cancellable scheduled task driving timeouts and
//!   pacing, and a manager owning all running tables.
//!
//! External capabilities are consumed through traits: hand evaluation
//! ([`game::eval::HandEvaluator`]), the card supply
//! ([`game::cards::CardSupply`]), event broadcast
//! ([`game::events::EventSink`]) and persistence
//! ([`table::gateway::PersistenceGateway`]).
//!
//! ## Example
//!
//! ```
//! use card_table::table::TableConfig;
//!
//! let config = TableConfig::default();
//! assert!(config.validate().is_ok());
//! ```

/// Core game logic and state machine.
pub mod game;
pub use game::{
    Blinds, Chips, Phase, PlayerId, Seat, SeatIndex, SeatOption, TableEngine, TableError, TableId,
    entities,
    events::{EventSink, TableEvent, TableSnapshot},
    pot::{PotLedger, RakeConfig},
};

/// Per-table actors, timers and the multi-table manager.
pub mod table;
pub use table::{
    NullGateway, PersistenceGateway, TableActor, TableConfig, TableHandle, TableManager,
    TableResponse,
};
