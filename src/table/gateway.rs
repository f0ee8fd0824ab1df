//! Persistence boundary.
//!
//! Balances, win/loss counters and rake totals live in whatever store
//! the host application provides. Calls are fire-and-forget: the actor
//! spawns them and logs failures, and the table keeps playing whether
//! or not the store is reachable.

use async_trait::async_trait;
use thiserror::Error;

use crate::game::entities::{Chips, PlayerId, TableId};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage rejected the write: {0}")]
    Rejected(String),
}

/// Capability contract for the backing store.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn set_balance(&self, player: PlayerId, amount: Chips) -> Result<(), GatewayError>;

    async fn increment_wins(&self, player: PlayerId) -> Result<(), GatewayError>;

    async fn increment_losses(&self, player: PlayerId) -> Result<(), GatewayError>;

    async fn save_rake_total(&self, table: TableId, total: Chips) -> Result<(), GatewayError>;
}

/// Gateway that stores nothing. Useful for tests and ephemeral tables.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullGateway;

#[async_trait]
impl PersistenceGateway for NullGateway {
    async fn set_balance(&self, _player: PlayerId, _amount: Chips) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn increment_wins(&self, _player: PlayerId) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn increment_losses(&self, _player: PlayerId) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn save_rake_total(&self, _table: TableId, _total: Chips) -> Result<(), GatewayError> {
        Ok(())
    }
}
