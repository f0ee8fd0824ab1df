//! Table module providing multi-table support with an async actor model.
//!
//! This module implements:
//! - TableActor: actor owning a single table's state and timers
//! - TurnClock: the table's one cancellable scheduled task
//! - TableManager: registry spawning and tracking table actors
//! - Message-based communication with tokio channels
//!
//! ## Architecture
//!
//! Each table runs in a separate Tokio task with an mpsc message inbox.
//! Player commands, timer expiries and lifecycle events are handled one
//! at a time, so no two mutations of the same table ever interleave,
//! while separate tables proceed concurrently.
//!
//! ## Example
//!
//! ```ignore
//! use card_table::table::{TableActor, TableConfig};
//! use card_table::table::gateway::NullGateway;
//! use card_table::game::{cards::StandardDeck, events::NullSink};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (actor, handle) = TableActor::new(
//!         1,
//!         TableConfig::default(),
//!         Box::new(StandardDeck::default()),
//!         Box::new(my_evaluator()),
//!         Arc::new(NullSink),
//!         Arc::new(NullGateway),
//!     );
//!     tokio::spawn(actor.run());
//!
//!     // Use the handle to send commands
//!     // handle.join(player_id, name, bankroll, buy_in, seat, false).await;
//! }
//! ```

pub mod actor;
pub mod clock;
pub mod config;
pub mod gateway;
pub mod manager;
pub mod messages;

pub use actor::{TableActor, TableHandle};
pub use clock::TurnClock;
pub use config::{BlindIncrease, TableConfig, TableTiming};
pub use gateway::{GatewayError, NullGateway, PersistenceGateway};
pub use manager::TableManager;
pub use messages::{TableCommand, TableResponse};
