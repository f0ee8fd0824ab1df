//! Table manager for spawning and tracking multiple table actors.

use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::actor::{TableActor, TableHandle};
use super::config::TableConfig;
use super::gateway::PersistenceGateway;
use crate::game::cards::StandardDeck;
use crate::game::entities::TableId;
use crate::game::eval::HandEvaluator;
use crate::game::events::EventSink;

/// Owns every running table in the process, keyed by stable table id.
/// Tables are created once and live for the process lifetime unless
/// explicitly closed.
pub struct TableManager {
    sink: Arc<dyn EventSink>,
    gateway: Arc<dyn PersistenceGateway>,
    make_evaluator: Box<dyn Fn() -> Box<dyn HandEvaluator> + Send + Sync>,
    tables: Arc<RwLock<HashMap<TableId, TableHandle>>>,
    next_table_id: Arc<RwLock<TableId>>,
}

impl TableManager {
    /// `make_evaluator` builds one evaluator per table, since tables
    /// run on independent tasks.
    pub fn new(
        sink: Arc<dyn EventSink>,
        gateway: Arc<dyn PersistenceGateway>,
        make_evaluator: Box<dyn Fn() -> Box<dyn HandEvaluator> + Send + Sync>,
    ) -> Self {
        Self {
            sink,
            gateway,
            make_evaluator,
            tables: Arc::new(RwLock::new(HashMap::new())),
            next_table_id: Arc::new(RwLock::new(1)),
        }
    }

    /// Validates the config, spawns the table actor and returns its
    /// handle.
    pub async fn create_table(&self, config: TableConfig) -> Result<TableHandle, String> {
        config.validate()?;

        let id = {
            let mut next = self.next_table_id.write().await;
            let id = *next;
            *next += 1;
            id
        };

        let (actor, handle) = TableActor::new(
            id,
            config,
            Box::new(StandardDeck::default()),
            (self.make_evaluator)(),
            Arc::clone(&self.sink),
            Arc::clone(&self.gateway),
        );
        tokio::spawn(actor.run());

        self.tables.write().await.insert(id, handle.clone());
        info!("created table {id}");
        Ok(handle)
    }

    /// Handle for a running table.
    pub async fn get_table(&self, id: TableId) -> Option<TableHandle> {
        self.tables.read().await.get(&id).cloned()
    }

    /// Ids of every running table.
    pub async fn list_tables(&self) -> Vec<TableId> {
        let mut ids: Vec<TableId> = self.tables.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Closes the table and forgets its handle.
    pub async fn close_table(&self, id: TableId) -> Result<(), String> {
        let handle = self
            .tables
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| format!("no such table: {id}"))?;
        handle.close().await?;
        info!("closed table {id}");
        Ok(())
    }
}

impl std::fmt::Debug for TableManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableManager").finish_non_exhaustive()
    }
}
