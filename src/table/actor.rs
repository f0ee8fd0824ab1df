//! Table actor: the single serialized owner of one table's state.
//!
//! Every mutation — player commands, timer expiries, lifecycle — flows
//! through this actor's inbox one message at a time, so no two effects
//! on the same table ever interleave. Tables run independently of one
//! another; there is no cross-table locking. Persistence writes are
//! spawned fire-and-forget and can never stall a hand.

use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;

use super::clock::TurnClock;
use super::config::TableConfig;
use super::gateway::PersistenceGateway;
use super::messages::{TableCommand, TableResponse};
use crate::game::cards::CardSupply;
use crate::game::engine::{ActionError, DepositOutcome, Followup, PersistOp, TableEngine, TableError};
use crate::game::entities::{Chips, PlayerId, SeatIndex, SeatOption, TableId};
use crate::game::eval::HandEvaluator;
use crate::game::events::{EventSink, TableSnapshot};

/// Handle for sending commands to a running table.
#[derive(Clone, Debug)]
pub struct TableHandle {
    sender: mpsc::Sender<TableCommand>,
    table_id: TableId,
}

impl TableHandle {
    #[must_use]
    pub fn new(sender: mpsc::Sender<TableCommand>, table_id: TableId) -> Self {
        Self { sender, table_id }
    }

    /// Get table ID
    #[must_use]
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    /// Send a raw command to the table.
    pub async fn send(&self, command: TableCommand) -> Result<(), String> {
        self.sender
            .send(command)
            .await
            .map_err(|_| "Table is closed".to_string())
    }

    async fn command<F>(&self, build: F) -> Result<TableResponse, String>
    where
        F: FnOnce(oneshot::Sender<TableResponse>) -> TableCommand,
    {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        rx.await.map_err(|_| "Table is closed".to_string())
    }

    /// First open seat, if the table has room.
    pub async fn find_seat(&self) -> Result<Option<SeatIndex>, String> {
        let (tx, rx) = oneshot::channel();
        self.send(TableCommand::FindSeat { response: tx }).await?;
        rx.await.map_err(|_| "Table is closed".to_string())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn join(
        &self,
        player_id: PlayerId,
        name: String,
        bankroll: Chips,
        buy_in: Chips,
        seat: SeatIndex,
        wait_for_big_blind: bool,
    ) -> Result<TableResponse, String> {
        self.command(|response| TableCommand::Join {
            player_id,
            name,
            bankroll,
            buy_in,
            seat,
            wait_for_big_blind,
            response,
        })
        .await
    }

    pub async fn leave(&self, player_id: PlayerId) -> Result<TableResponse, String> {
        self.command(|response| TableCommand::Leave {
            player_id,
            response,
        })
        .await
    }

    pub async fn sit_in(&self, player_id: PlayerId) -> Result<TableResponse, String> {
        self.command(|response| TableCommand::SitIn {
            player_id,
            response,
        })
        .await
    }

    pub async fn post_blind(&self, player_id: PlayerId, post: bool) -> Result<TableResponse, String> {
        self.command(|response| TableCommand::PostBlind {
            player_id,
            post,
            response,
        })
        .await
    }

    pub async fn check(&self, player_id: PlayerId) -> Result<TableResponse, String> {
        self.command(|response| TableCommand::Check {
            player_id,
            response,
        })
        .await
    }

    pub async fn fold(&self, player_id: PlayerId) -> Result<TableResponse, String> {
        self.command(|response| TableCommand::Fold {
            player_id,
            response,
        })
        .await
    }

    pub async fn call(&self, player_id: PlayerId) -> Result<TableResponse, String> {
        self.command(|response| TableCommand::Call {
            player_id,
            response,
        })
        .await
    }

    pub async fn bet(&self, player_id: PlayerId, amount: Chips) -> Result<TableResponse, String> {
        self.command(|response| TableCommand::Bet {
            player_id,
            amount,
            response,
        })
        .await
    }

    pub async fn raise(&self, player_id: PlayerId, amount: Chips) -> Result<TableResponse, String> {
        self.command(|response| TableCommand::Raise {
            player_id,
            amount,
            response,
        })
        .await
    }

    pub async fn update_seat_option(
        &self,
        player_id: PlayerId,
        option: SeatOption,
    ) -> Result<TableResponse, String> {
        self.command(|response| TableCommand::UpdateSeatOption {
            player_id,
            option,
            response,
        })
        .await
    }

    pub async fn sit_out_big_blind(
        &self,
        player_id: PlayerId,
        value: bool,
    ) -> Result<TableResponse, String> {
        self.command(|response| TableCommand::SitOutBigBlind {
            player_id,
            value,
            response,
        })
        .await
    }

    pub async fn sit_out_next_hand(
        &self,
        player_id: PlayerId,
        value: bool,
    ) -> Result<TableResponse, String> {
        self.command(|response| TableCommand::SitOutNextHand {
            player_id,
            value,
            response,
        })
        .await
    }

    pub async fn deposit_chips(
        &self,
        player_id: PlayerId,
        amount: Chips,
    ) -> Result<TableResponse, String> {
        self.command(|response| TableCommand::DepositChips {
            player_id,
            amount,
            response,
        })
        .await
    }

    pub async fn snapshot(&self) -> Result<TableSnapshot, String> {
        let (tx, rx) = oneshot::channel();
        self.send(TableCommand::GetSnapshot { response: tx }).await?;
        rx.await.map_err(|_| "Table is closed".to_string())
    }

    pub async fn close(&self) -> Result<TableResponse, String> {
        self.command(|response| TableCommand::Close { response }).await
    }
}

/// Table actor managing a single table.
pub struct TableActor {
    id: TableId,
    config: TableConfig,
    engine: TableEngine,
    inbox: mpsc::Receiver<TableCommand>,
    clock: TurnClock,
    gateway: Arc<dyn PersistenceGateway>,
    is_closed: bool,
}

impl TableActor {
    /// Builds the actor and the handle used to reach it. The actor does
    /// nothing until [`Self::run`] is spawned.
    pub fn new(
        id: TableId,
        config: TableConfig,
        deck: Box<dyn CardSupply>,
        evaluator: Box<dyn HandEvaluator>,
        sink: Arc<dyn EventSink>,
        gateway: Arc<dyn PersistenceGateway>,
    ) -> (Self, TableHandle) {
        let (sender, inbox) = mpsc::channel(100);
        let clock = TurnClock::new(sender.clone());
        let engine = TableEngine::new(id, config.clone(), deck, evaluator, sink);
        let actor = Self {
            id,
            config,
            engine,
            inbox,
            clock,
            gateway,
            is_closed: false,
        };
        let handle = TableHandle::new(sender, id);
        (actor, handle)
    }

    /// Run the table event loop until the table is closed.
    pub async fn run(mut self) {
        info!("table {} '{}' starting", self.id, self.config.name);

        let mut replenish = interval(self.config.timing.time_bank_replenish_every);
        let mut blind_schedule = self
            .config
            .blind_increase
            .as_ref()
            .map(|schedule| interval(schedule.every));
        // Both intervals fire once immediately; swallow that tick.
        replenish.tick().await;
        if let Some(schedule) = blind_schedule.as_mut() {
            schedule.tick().await;
        }

        loop {
            tokio::select! {
                message = self.inbox.recv() => {
                    match message {
                        Some(command) => {
                            self.handle_command(command);
                            if self.is_closed {
                                break;
                            }
                        }
                        None => break,
                    }
                }

                _ = replenish.tick() => {
                    self.engine.replenish_time_banks();
                }

                _ = async {
                    match blind_schedule.as_mut() {
                        Some(schedule) => {
                            schedule.tick().await;
                        }
                        None => std::future::pending().await,
                    }
                } => {
                    self.engine.increase_blinds();
                }
            }
        }

        self.clock.cancel();
        info!("table {} '{}' closed", self.id, self.config.name);
    }

    fn handle_command(&mut self, command: TableCommand) {
        match command {
            TableCommand::FindSeat { response } => {
                let _ = response.send(self.engine.first_free_seat());
            }

            TableCommand::Join {
                player_id,
                name,
                bankroll,
                buy_in,
                seat,
                wait_for_big_blind,
                response,
            } => {
                let result = self
                    .engine
                    .join(seat, player_id, name, bankroll, buy_in, wait_for_big_blind);
                let _ = response.send(self.settle_lifecycle(result));
            }

            TableCommand::Leave {
                player_id,
                response,
            } => {
                let result = self.engine.leave(player_id);
                let _ = response.send(self.settle_lifecycle(result));
            }

            TableCommand::SitIn {
                player_id,
                response,
            } => {
                let result = self.engine.request_sit_in(player_id);
                let _ = response.send(self.settle_lifecycle(result));
            }

            TableCommand::PostBlind {
                player_id,
                post,
                response,
            } => {
                let result = self.engine.post_blind(player_id, post);
                let _ = response.send(self.settle_action(result));
            }

            TableCommand::Check {
                player_id,
                response,
            } => {
                let result = self.engine.check(player_id);
                let _ = response.send(self.settle_action(result));
            }

            TableCommand::Fold {
                player_id,
                response,
            } => {
                let result = self.engine.fold(player_id);
                let _ = response.send(self.settle_action(result));
            }

            TableCommand::Call {
                player_id,
                response,
            } => {
                let result = self.engine.call(player_id);
                let _ = response.send(self.settle_action(result));
            }

            TableCommand::Bet {
                player_id,
                amount,
                response,
            } => {
                let result = self.engine.bet(player_id, amount);
                let _ = response.send(self.settle_action(result));
            }

            TableCommand::Raise {
                player_id,
                amount,
                response,
            } => {
                let result = self.engine.raise(player_id, amount);
                let _ = response.send(self.settle_action(result));
            }

            TableCommand::UpdateSeatOption {
                player_id,
                option,
                response,
            } => {
                let _ = response.send(Self::settle_flag(
                    self.engine.update_seat_option(player_id, option),
                ));
            }

            TableCommand::SitOutBigBlind {
                player_id,
                value,
                response,
            } => {
                let _ = response.send(Self::settle_flag(
                    self.engine.set_sit_out_big_blind(player_id, value),
                ));
            }

            TableCommand::SitOutNextHand {
                player_id,
                value,
                response,
            } => {
                let _ = response.send(Self::settle_flag(
                    self.engine.set_sit_out_next_hand(player_id, value),
                ));
            }

            TableCommand::DepositChips {
                player_id,
                amount,
                response,
            } => {
                let reply = match self.engine.deposit(player_id, amount) {
                    Ok(DepositOutcome::Applied) => TableResponse::Success,
                    Ok(DepositOutcome::Deferred) => TableResponse::SuccessWithMessage(
                        "chips will be added when the hand ends".to_string(),
                    ),
                    Err(err) => TableResponse::Error(err),
                };
                let _ = response.send(reply);
            }

            TableCommand::GetSnapshot { response } => {
                let _ = response.send(self.engine.snapshot());
            }

            TableCommand::Close { response } => {
                self.is_closed = true;
                self.clock.cancel();
                let _ = response.send(TableResponse::Success);
            }

            TableCommand::TimerFired { generation, event } => {
                if self.clock.is_current(generation) {
                    let followup = self.engine.timer_fired(event);
                    self.apply(followup);
                } else {
                    debug!("table {}: dropped stale timer {event:?}", self.id);
                }
            }
        }

        self.flush_persistence();
    }

    /// Schedules whatever the engine asked for next. Scheduling always
    /// cancels the previous pending task first, so a superseded
    /// countdown can never auto-act on top of an accepted action.
    fn apply(&mut self, followup: Option<Followup>) {
        if let Some(followup) = followup {
            self.clock.schedule(followup.delay, followup.event);
        }
    }

    fn settle_action(
        &mut self,
        result: Result<Option<Followup>, ActionError>,
    ) -> TableResponse {
        match result {
            Ok(followup) => {
                self.apply(followup);
                TableResponse::Success
            }
            Err(ActionError::Ignored) => TableResponse::Ignored,
            Err(ActionError::Rejected(err)) => TableResponse::Error(err),
        }
    }

    fn settle_lifecycle(
        &mut self,
        result: Result<Option<Followup>, TableError>,
    ) -> TableResponse {
        match result {
            Ok(followup) => {
                self.apply(followup);
                TableResponse::Success
            }
            Err(err) => TableResponse::Error(err),
        }
    }

    fn settle_flag(result: Result<(), ActionError>) -> TableResponse {
        match result {
            Ok(()) => TableResponse::Success,
            Err(ActionError::Ignored) => TableResponse::Ignored,
            Err(ActionError::Rejected(err)) => TableResponse::Error(err),
        }
    }

    /// Ship queued storage effects without waiting on them. A failed
    /// write is logged and forgotten; table state never rolls back.
    fn flush_persistence(&mut self) {
        for op in self.engine.drain_persist_ops() {
            let gateway = Arc::clone(&self.gateway);
            let table_id = self.id;
            tokio::spawn(async move {
                let result = match op {
                    PersistOp::SetBalance { player, amount } => {
                        gateway.set_balance(player, amount).await
                    }
                    PersistOp::IncrementWins { player } => gateway.increment_wins(player).await,
                    PersistOp::IncrementLosses { player } => gateway.increment_losses(player).await,
                    PersistOp::SaveRakeTotal { table, total } => {
                        gateway.save_rake_total(table, total).await
                    }
                };
                if let Err(err) = result {
                    error!("table {table_id}: persistence write failed: {err}");
                }
            });
        }
    }
}
