//! Per-table game engine: the betting-phase state machine and all
//! action/timer/lifecycle handlers.
//!
//! The engine is the only writer of a table's state and is fully
//! synchronous. Anything that must happen later (pacing a phase change,
//! timing out the active seat, ticking a time bank) is handed back to
//! the caller as a [`Followup`] directive; the table actor owns the
//! clock that makes those fire. Persistence side effects are queued as
//! [`PersistOp`]s and drained by the actor, so a storage outage can
//! never stall a hand.

use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::cards::{Card, CardSupply};
use super::entities::{Blinds, Chips, Phase, PlayerId, Seat, SeatIndex, SeatOption, TableId};
use super::eval::HandEvaluator;
use super::events::{ActionPrompt, EventSink, SeatSnapshot, TableEvent, TableSnapshot};
use super::pot::PotLedger;
use super::seats::{SeatRegistry, can_act, in_hand};
use crate::table::config::TableConfig;

/// Validation failures reported back to the acting player.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum TableError {
    #[error("that seat is taken")]
    SeatTaken,
    #[error("already seated at this table")]
    AlreadySeated,
    #[error("not seated at this table")]
    NotSeated,
    #[error("buy-in must be between {min} and {max} chips")]
    InvalidBuyIn { min: Chips, max: Chips },
    #[error("not enough chips")]
    InsufficientChips,
    #[error("bet must be at least the big blind ({big_blind}) or your whole stack")]
    BetBelowMinimum { big_blind: Chips },
    #[error("raise must add at least {min_raise} chips or put you all-in")]
    RaiseBelowMinimum { min_raise: Chips },
    #[error("raise must exceed the current bet of {biggest_bet}")]
    RaiseBelowCall { biggest_bet: Chips },
    #[error("deposit must be at least {min} chips and fit under the table maximum of {max}")]
    InvalidDeposit { min: Chips, max: Chips },
}

/// How a player action can fail. Out-of-turn and phase-illegal actions
/// are benign races and are dropped without a reason; precondition
/// failures carry one.
#[derive(Debug, Eq, PartialEq)]
pub enum ActionError {
    Ignored,
    Rejected(TableError),
}

impl From<TableError> for ActionError {
    fn from(value: TableError) -> Self {
        Self::Rejected(value)
    }
}

/// Deferred work the engine asks its owner to schedule. There is at
/// most one pending followup per table at any instant; scheduling a new
/// one replaces the old.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Followup {
    pub delay: Duration,
    pub event: TimerEvent,
}

/// Timer-driven continuation points of the state machine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimerEvent {
    /// Prompt the already-selected active seat and start its countdown.
    PromptActiveSeat,
    /// Move action to the next eligible seat, then prompt it.
    AdvanceAction,
    /// The active seat's countdown expired.
    ActTimeout,
    /// One second of time bank has burned.
    TimeBankTick,
    /// Deal the next street.
    BeginNextPhase,
    /// Run the showdown.
    BeginShowdown,
    /// Settle the hand and start the next one.
    EndRound,
}

/// Fire-and-forget storage effects, drained by the actor after every
/// handled event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PersistOp {
    SetBalance { player: PlayerId, amount: Chips },
    IncrementWins { player: PlayerId },
    IncrementLosses { player: PlayerId },
    SaveRakeTotal { table: TableId, total: Chips },
}

/// Whether a deposit was applied immediately or parked until the hand
/// ends.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DepositOutcome {
    Applied,
    Deferred,
}

type ActionResult = Result<Option<Followup>, ActionError>;

pub struct TableEngine {
    id: TableId,
    config: TableConfig,
    blinds: Blinds,
    seats: SeatRegistry,
    deck: Box<dyn CardSupply>,
    evaluator: Box<dyn HandEvaluator>,
    sink: Arc<dyn EventSink>,
    pot: PotLedger,
    phase: Phase,
    board: Vec<Card>,
    dealer_seat: Option<SeatIndex>,
    active_seat: Option<SeatIndex>,
    last_player_to_act: Option<SeatIndex>,
    biggest_bet: Chips,
    initial_bet: Chips,
    raise_difference: Chips,
    heads_up: bool,
    game_is_on: bool,
    /// A short all-in below one full raise locks further raising for
    /// the rest of the round.
    all_in_below_min_raise: bool,
    in_time_bank: bool,
    players_sitting_in: usize,
    players_in_hand: usize,
    rake_total: Chips,
    persist: Vec<PersistOp>,
}

impl TableEngine {
    #[must_use]
    pub fn new(
        id: TableId,
        config: TableConfig,
        deck: Box<dyn CardSupply>,
        evaluator: Box<dyn HandEvaluator>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let blinds = Blinds {
            small: config.small_blind,
            big: config.big_blind,
        };
        let pot = PotLedger::new(config.rake.clone());
        let seats = SeatRegistry::new(config.seats_count);
        Self {
            id,
            config,
            blinds,
            seats,
            deck,
            evaluator,
            sink,
            pot,
            phase: Phase::Idle,
            board: Vec::with_capacity(5),
            dealer_seat: None,
            active_seat: None,
            last_player_to_act: None,
            biggest_bet: 0,
            initial_bet: 0,
            raise_difference: 0,
            heads_up: false,
            game_is_on: false,
            all_in_below_min_raise: false,
            in_time_bank: false,
            players_sitting_in: 0,
            players_in_hand: 0,
            rake_total: 0,
            persist: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Read access

    #[must_use]
    pub fn table_id(&self) -> TableId {
        self.id
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn game_is_on(&self) -> bool {
        self.game_is_on
    }

    #[must_use]
    pub fn active_seat(&self) -> Option<SeatIndex> {
        self.active_seat
    }

    #[must_use]
    pub fn dealer_seat(&self) -> Option<SeatIndex> {
        self.dealer_seat
    }

    #[must_use]
    pub fn rake_total(&self) -> Chips {
        self.rake_total
    }

    #[must_use]
    pub fn seat(&self, idx: SeatIndex) -> Option<&Seat> {
        self.seats.get(idx)
    }

    #[must_use]
    pub fn seat_of(&self, player: PlayerId) -> Option<SeatIndex> {
        self.seats.position_of(player)
    }

    #[must_use]
    pub fn first_free_seat(&self) -> Option<SeatIndex> {
        self.seats.first_free()
    }

    /// Chips held by seats and pots. Together with the rake total this
    /// is constant across any sequence of in-table actions.
    #[must_use]
    pub fn total_chips(&self) -> Chips {
        let seated: Chips = self.seats.iter_occupied().map(|(_, s)| s.total_chips()).sum();
        seated + self.pot.total()
    }

    /// Storage effects accumulated since the last drain.
    pub fn drain_persist_ops(&mut self) -> Vec<PersistOp> {
        std::mem::take(&mut self.persist)
    }

    #[must_use]
    pub fn snapshot(&self) -> TableSnapshot {
        let seats = (0..self.seats.capacity())
            .map(|idx| {
                self.seats.get(idx).map(|seat| SeatSnapshot {
                    player_id: seat.player_id,
                    name: seat.name.clone(),
                    chips_in_play: seat.chips_in_play,
                    bet: seat.bet,
                    sitting_in: seat.sitting_in,
                    in_hand: seat.in_hand,
                    has_cards: seat.has_cards,
                    all_in: seat.is_all_in(),
                    waiting_to_sit_in: seat.waiting_to_sit_in,
                    winnings: seat.winnings,
                    cards: seat.revealed.then(|| seat.cards.clone()),
                })
            })
            .collect();
        TableSnapshot {
            id: self.id,
            name: self.config.name.clone(),
            phase: self.phase,
            game_is_on: self.game_is_on,
            blinds: self.blinds.clone(),
            board: self.board.clone(),
            pots: self.pot.layer_amounts(),
            biggest_bet: self.biggest_bet,
            initial_bet: self.initial_bet,
            raise_difference: self.raise_difference,
            dealer_seat: self.dealer_seat,
            active_seat: self.active_seat,
            heads_up: self.heads_up,
            seats,
        }
    }

    // ------------------------------------------------------------------
    // Seat lifecycle

    /// Seats a player with their buy-in. Outside a hand they are dealt
    /// in at once (possibly starting the game); mid-hand they wait with
    /// their chosen seat option.
    pub fn join(
        &mut self,
        seat_idx: SeatIndex,
        player_id: PlayerId,
        name: String,
        bankroll: Chips,
        buy_in: Chips,
        wait_for_big_blind: bool,
    ) -> Result<Option<Followup>, TableError> {
        if seat_idx >= self.seats.capacity() || self.seats.get(seat_idx).is_some() {
            return Err(TableError::SeatTaken);
        }
        if self.seats.position_of(player_id).is_some() {
            return Err(TableError::AlreadySeated);
        }
        if buy_in < self.config.min_buy_in || buy_in > self.config.max_buy_in {
            return Err(TableError::InvalidBuyIn {
                min: self.config.min_buy_in,
                max: self.config.max_buy_in,
            });
        }
        if buy_in > bankroll {
            return Err(TableError::InsufficientChips);
        }

        let seat = Seat::new(player_id, name.clone(), bankroll, buy_in, self.config.time_bank_initial);
        self.seats.occupy(seat_idx, seat);
        info!("table {}: {name} sat on seat {seat_idx} with {buy_in} chips", self.id);

        if self.game_is_on {
            if let Some(seat) = self.seats.get_mut(seat_idx) {
                seat.waiting_to_sit_in = true;
                seat.seat_option = Some(if wait_for_big_blind {
                    SeatOption::WaitForBigBlind
                } else {
                    SeatOption::PostBlinds
                });
            }
            self.emit_snapshot();
            Ok(None)
        } else {
            Ok(self.sat_in(seat_idx))
        }
    }

    /// Adds a player who is sitting at the table to the game. Starts a
    /// round once enough players are in and none is running.
    fn sat_in(&mut self, idx: SeatIndex) -> Option<Followup> {
        let Some(seat) = self.seats.get_mut(idx) else {
            return None;
        };
        seat.sitting_in = true;
        seat.waiting_to_sit_in = false;
        seat.seat_option = None;
        let time_bank = seat.time_bank;
        let player = seat.player_id;
        self.players_sitting_in += 1;

        self.emit_snapshot();
        self.sink
            .unicast(self.id, player, &TableEvent::TimeBank { seconds: time_bank });

        if !self.game_is_on && self.players_sitting_in >= self.config.min_players {
            self.initialize_round(false)
        } else {
            None
        }
    }

    /// A seated-but-out player asks to be dealt back in.
    pub fn request_sit_in(&mut self, player: PlayerId) -> Result<Option<Followup>, TableError> {
        let idx = self.seats.position_of(player).ok_or(TableError::NotSeated)?;
        let Some(seat) = self.seats.get_mut(idx) else {
            return Err(TableError::NotSeated);
        };
        if seat.sitting_in {
            return Ok(None);
        }
        if seat.chips_in_play == 0 {
            return Err(TableError::InsufficientChips);
        }
        if self.game_is_on {
            seat.waiting_to_sit_in = true;
            seat.seat_option = Some(SeatOption::WaitForBigBlind);
            seat.sit_out_big_blind = false;
            seat.sit_out_next_hand = false;
            self.emit_snapshot();
            Ok(None)
        } else {
            Ok(self.sat_in(idx))
        }
    }

    /// Removes a player from the table entirely, settling their balance
    /// and keeping the hand moving if they were due to act.
    pub fn leave(&mut self, player: PlayerId) -> Result<Option<Followup>, TableError> {
        let idx = self.seats.position_of(player).ok_or(TableError::NotSeated)?;

        if let Some(seat) = self.seats.get(idx) {
            self.persist.push(PersistOp::SetBalance {
                player,
                amount: seat.chips + seat.chips_in_play,
            });
            info!("table {}: {} left seat {idx}", self.id, seat.name);
        }

        let mut followup = None;
        if self.seats.get(idx).is_some_and(|s| s.sitting_in) {
            followup = self.sat_out(idx, true);
        }
        self.seats.vacate(idx);

        if self.seats.occupied_count() < 2 {
            self.dealer_seat = None;
        }
        self.emit_snapshot();

        if self.game_is_on && self.players_in_hand < 2 {
            followup = self.end_round();
        } else if self.last_player_to_act == Some(idx) && self.active_seat == Some(idx) {
            followup = self.end_phase();
        }
        Ok(followup)
    }

    /// Sits a player out mid-hand: their wager is folded into the pot,
    /// they are struck from every layer, and action moves on. With
    /// `player_left` the caller settles round/phase completion itself.
    fn sat_out(&mut self, idx: SeatIndex, player_left: bool) -> Option<Followup> {
        if self.active_seat == Some(idx) {
            self.note_action_taken();
        }
        if !player_left
            && let Some(seat) = self.seats.get(idx)
        {
            info!("table {}: {} sat out", self.id, seat.name);
        }

        if let Some(seat) = self.seats.get_mut(idx) {
            if seat.bet > 0 {
                self.pot.collect_seat_bet(idx, seat);
            }
        }
        self.pot.remove_contributor(idx);
        self.players_sitting_in = self.players_sitting_in.saturating_sub(1);

        let was_in_hand = self.seats.get(idx).is_some_and(|s| s.in_hand);
        let followup = if was_in_hand {
            if let Some(seat) = self.seats.get_mut(idx) {
                seat.sit_out();
            }
            self.players_in_hand = self.players_in_hand.saturating_sub(1);

            if self.players_in_hand < 2 {
                if player_left { None } else { self.end_round() }
            } else if self.active_seat == Some(idx) && self.last_player_to_act != Some(idx) {
                Some(self.followup(TimerEvent::AdvanceAction))
            } else if self.last_player_to_act == Some(idx) && self.active_seat == Some(idx) {
                if player_left { None } else { self.end_phase() }
            } else if self.last_player_to_act == Some(idx) {
                match self.seats.prev_matching(idx, can_act) {
                    None => self.end_phase(),
                    Some(prev) => {
                        self.last_player_to_act = Some(prev);
                        None
                    }
                }
            } else {
                None
            }
        } else {
            if let Some(seat) = self.seats.get_mut(idx) {
                seat.sit_out();
            }
            None
        };

        self.emit_snapshot();
        followup
    }

    /// Buys more chips. Applied immediately between hands, otherwise
    /// parked until the current hand ends.
    pub fn deposit(&mut self, player: PlayerId, amount: Chips) -> Result<DepositOutcome, TableError> {
        let idx = self.seats.position_of(player).ok_or(TableError::NotSeated)?;
        let max_buy_in = self.config.max_buy_in;
        let min_buy_in = self.config.min_buy_in;
        let Some(seat) = self.seats.get_mut(idx) else {
            return Err(TableError::NotSeated);
        };
        if amount > seat.chips {
            return Err(TableError::InsufficientChips);
        }
        if amount < min_buy_in || amount + seat.chips_in_play + seat.bet > max_buy_in {
            return Err(TableError::InvalidDeposit {
                min: min_buy_in,
                max: max_buy_in,
            });
        }

        if self.game_is_on && seat.in_hand {
            seat.pending_deposit = Some(amount);
            Ok(DepositOutcome::Deferred)
        } else {
            seat.chips -= amount;
            seat.chips_in_play += amount;
            seat.pending_deposit = None;
            self.emit_snapshot();
            Ok(DepositOutcome::Applied)
        }
    }

    /// Picks how a waiting player enters the next hand.
    pub fn update_seat_option(
        &mut self,
        player: PlayerId,
        option: SeatOption,
    ) -> Result<(), ActionError> {
        let idx = self.seats.position_of(player).ok_or(ActionError::Ignored)?;
        let Some(seat) = self.seats.get_mut(idx) else {
            return Err(ActionError::Ignored);
        };
        if !seat.waiting_to_sit_in {
            return Err(ActionError::Ignored);
        }
        seat.seat_option = Some(option);
        Ok(())
    }

    pub fn set_sit_out_big_blind(&mut self, player: PlayerId, value: bool) -> Result<(), ActionError> {
        let idx = self.seats.position_of(player).ok_or(ActionError::Ignored)?;
        if let Some(seat) = self.seats.get_mut(idx) {
            seat.sit_out_big_blind = value;
        }
        Ok(())
    }

    pub fn set_sit_out_next_hand(&mut self, player: PlayerId, value: bool) -> Result<(), ActionError> {
        let idx = self.seats.position_of(player).ok_or(ActionError::Ignored)?;
        if let Some(seat) = self.seats.get_mut(idx) {
            seat.sit_out_next_hand = value;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Player actions

    /// Re-entry path for the blind prompt. Posting is idempotent — the
    /// forced bet was already placed when the phase began.
    pub fn post_blind(&mut self, player: PlayerId, post: bool) -> ActionResult {
        let idx = self.seats.position_of(player).ok_or(ActionError::Ignored)?;
        if self.active_seat != Some(idx)
            || !matches!(self.phase, Phase::SmallBlind | Phase::BigBlind)
        {
            return Err(ActionError::Ignored);
        }
        if post {
            if self.phase == Phase::SmallBlind {
                Ok(self.posted_small_blind())
            } else {
                Ok(self.posted_big_blind())
            }
        } else {
            Ok(self.sat_out(idx, false))
        }
    }

    pub fn check(&mut self, player: PlayerId) -> ActionResult {
        let idx = self.betting_actor(player)?;
        let bet = self.seats.get(idx).map_or(0, |s| s.bet);
        if self.biggest_bet > 0 && bet != self.biggest_bet {
            return Err(ActionError::Ignored);
        }
        Ok(self.checked(idx))
    }

    fn checked(&mut self, idx: SeatIndex) -> Option<Followup> {
        self.note_action_taken();
        self.log_action(idx, "check", "checked".to_string());
        if self.last_player_to_act == Some(idx) {
            self.end_phase()
        } else {
            Some(self.followup(TimerEvent::AdvanceAction))
        }
    }

    pub fn call(&mut self, player: PlayerId) -> ActionResult {
        let idx = self.betting_actor(player)?;
        let bet = self.seats.get(idx).map_or(0, |s| s.bet);
        if self.biggest_bet == 0 || bet >= self.biggest_bet {
            return Err(ActionError::Ignored);
        }
        self.note_action_taken();
        let owed = self.biggest_bet - bet;
        if let Some(seat) = self.seats.get_mut(idx) {
            seat.place_bet(owed);
        }
        self.log_action(idx, "call", "called".to_string());
        if self.last_player_to_act == Some(idx) {
            Ok(self.end_phase())
        } else {
            Ok(Some(self.followup(TimerEvent::AdvanceAction)))
        }
    }

    /// Opens the betting on an unraised street. `amount` is the total
    /// wager, which must reach one big blind or be the player's whole
    /// stack.
    pub fn bet(&mut self, player: PlayerId, amount: Chips) -> ActionResult {
        let idx = self.betting_actor(player)?;
        if self.biggest_bet != 0 {
            return Err(ActionError::Ignored);
        }
        let (bet, stack) = self
            .seats
            .get(idx)
            .map_or((0, 0), |s| (s.bet, s.chips_in_play));
        if amount == 0 || amount > stack {
            return Err(TableError::InsufficientChips.into());
        }
        let added = amount - bet;
        if added < self.blinds.big && added != stack {
            return Err(TableError::BetBelowMinimum {
                big_blind: self.blinds.big,
            }
            .into());
        }

        self.note_action_taken();
        self.raise_difference = added;
        if let Some(seat) = self.seats.get_mut(idx) {
            seat.place_bet(added);
            self.biggest_bet = self.biggest_bet.max(seat.bet);
        }
        self.initial_bet = amount;
        self.log_action(idx, "bet", format!("bet {amount}"));
        Ok(self.reopen_action(idx))
    }

    /// Raises a bet street. `amount` is the new total wager; the raise
    /// increment must reach the table's minimum unless it puts the
    /// player all-in, in which case an undersized all-in locks further
    /// raising for the round.
    pub fn raise(&mut self, player: PlayerId, amount: Chips) -> ActionResult {
        let idx = self.betting_actor(player)?;
        if self.biggest_bet == 0 || self.other_players_are_all_in() || self.all_in_below_min_raise {
            return Err(ActionError::Ignored);
        }
        let (bet, stack) = self
            .seats
            .get(idx)
            .map_or((0, 0), |s| (s.bet, s.chips_in_play));
        if amount <= self.biggest_bet {
            return Err(TableError::RaiseBelowCall {
                biggest_bet: self.biggest_bet,
            }
            .into());
        }
        let added = amount - bet;
        if added > stack {
            return Err(TableError::InsufficientChips.into());
        }
        if added == stack {
            // All-in raise; undersized ones lock the round.
            if amount < self.biggest_bet + self.raise_difference {
                self.all_in_below_min_raise = true;
            }
        } else if added < self.raise_difference {
            return Err(TableError::RaiseBelowMinimum {
                min_raise: self.raise_difference,
            }
            .into());
        }

        self.note_action_taken();
        let old_biggest = self.biggest_bet;
        if let Some(seat) = self.seats.get_mut(idx) {
            seat.place_bet(added);
            self.biggest_bet = self.biggest_bet.max(seat.bet);
        }
        self.raise_difference = self.biggest_bet - old_biggest;
        self.log_action(idx, "raise", format!("raised to {}", self.biggest_bet));
        Ok(self.reopen_action(idx))
    }

    /// After a bet or raise, everyone else gets to act again; the seat
    /// before the aggressor closes the round.
    fn reopen_action(&mut self, idx: SeatIndex) -> Option<Followup> {
        match self.seats.prev_matching(idx, can_act) {
            None => self.end_phase(),
            Some(prev) if prev == idx => self.end_phase(),
            Some(prev) => {
                self.last_player_to_act = Some(prev);
                Some(self.followup(TimerEvent::AdvanceAction))
            }
        }
    }

    pub fn fold(&mut self, player: PlayerId) -> ActionResult {
        let idx = self.betting_actor(player)?;
        let bet = self.seats.get(idx).map_or(0, |s| s.bet);
        // Folding is only accepted while facing an unmatched bet.
        if self.biggest_bet == 0 || bet >= self.biggest_bet {
            return Err(ActionError::Ignored);
        }
        Ok(self.folded(idx))
    }

    fn folded(&mut self, idx: SeatIndex) -> Option<Followup> {
        self.note_action_taken();
        if let Some(seat) = self.seats.get_mut(idx) {
            self.persist.push(PersistOp::IncrementLosses {
                player: seat.player_id,
            });
            seat.fold();
        }
        self.log_action(idx, "fold", "folded".to_string());

        self.players_in_hand = self.players_in_hand.saturating_sub(1);
        if let Some(seat) = self.seats.get_mut(idx) {
            self.pot.collect_seat_bet(idx, seat);
        }
        self.pot.remove_contributor(idx);

        if self.players_in_hand <= 1 {
            // Everyone else is gone; the hand is decided right here.
            self.pot.collect_bets(&mut self.seats);
            let rake = self.pot.take_rake(self.phase);
            self.rake_total += rake;
            info!("table {}: rake taken {rake}, total {}", self.id, self.rake_total);

            if let Some(winner) = self.seats.next_matching(idx, in_hand) {
                let total = self.pot.award_all(&mut self.seats, winner);
                if let Some(seat) = self.seats.get_mut(winner) {
                    seat.winnings = total;
                    self.persist.push(PersistOp::IncrementWins {
                        player: seat.player_id,
                    });
                }
                let name = self.seats.get(winner).map(|s| s.name.clone()).unwrap_or_default();
                info!("table {}: {name} wins the pot ({total})", self.id);
                self.sink.broadcast(
                    self.id,
                    &TableEvent::Winner {
                        seat: winner,
                        amount: total,
                        hand: None,
                    },
                );
            }
            self.emit_snapshot();
            Some(self.followup(TimerEvent::EndRound))
        } else if self.last_player_to_act == Some(idx) {
            self.end_phase()
        } else {
            Some(self.followup(TimerEvent::AdvanceAction))
        }
    }

    /// Identity and phase gate shared by every betting action.
    fn betting_actor(&self, player: PlayerId) -> Result<SeatIndex, ActionError> {
        let idx = self.seats.position_of(player).ok_or(ActionError::Ignored)?;
        if self.active_seat != Some(idx) || !self.phase.is_betting() {
            return Err(ActionError::Ignored);
        }
        Ok(idx)
    }

    // ------------------------------------------------------------------
    // Round lifecycle

    /// Starts a new hand: advances the button, seats blind-posting
    /// late-joiners, recomputes heads-up, and runs the blind phases
    /// straight through into the preflop deal.
    fn initialize_round(&mut self, change_dealer: bool) -> Option<Followup> {
        if self.players_sitting_in < 2 {
            return None;
        }
        self.game_is_on = true;
        self.board.clear();
        self.deck.shuffle();
        self.players_in_hand = 0;
        let mut seeded_bet: Chips = 0;

        // Sit out the broke, deal in the rest.
        for idx in 0..self.seats.capacity() {
            let Some(seat) = self.seats.get_mut(idx) else {
                continue;
            };
            if seat.sitting_in {
                if seat.chips_in_play == 0 {
                    seat.sit_out();
                    self.players_sitting_in -= 1;
                } else {
                    seat.prepare_for_new_round();
                    self.players_in_hand += 1;
                }
            }
        }

        // Late joiners posting blinds up front (or forced to, when the
        // table would otherwise go below two players).
        for idx in 0..self.seats.capacity() {
            let wants_in = self.seats.get(idx).is_some_and(|s| {
                !s.sitting_in
                    && s.waiting_to_sit_in
                    && (s.seat_option == Some(SeatOption::PostBlinds) || self.players_sitting_in < 2)
            });
            if wants_in {
                self.sat_in(idx);
                let big = self.blinds.big;
                if let Some(seat) = self.seats.get_mut(idx) {
                    seat.prepare_for_new_round();
                    seat.place_bet(big);
                }
                self.players_in_hand += 1;
                seeded_bet = big;
            }
        }

        // Dealer button: random on the first hand, next eligible after.
        match self.dealer_seat {
            None => {
                let nth = rand::rng().random_range(0..self.players_sitting_in);
                self.dealer_seat = self
                    .seats
                    .iter_occupied()
                    .filter(|(_, s)| s.sitting_in)
                    .nth(nth)
                    .map(|(i, _)| i);
            }
            Some(dealer) => {
                if change_dealer || !self.seats.get(dealer).is_some_and(|s| s.sitting_in) {
                    self.dealer_seat = self.seats.next_matching(dealer, in_hand);
                }
            }
        }
        let Some(dealer) = self.dealer_seat else {
            self.stop_game();
            return None;
        };

        // A joiner who opted to wait is dealt in exactly when the big
        // blind reaches them.
        let candidate = self
            .seats
            .next_matching(dealer, in_hand)
            .and_then(|i| self.seats.next_matching(i, |_| true));
        if let Some(idx) = candidate {
            let waits = self.seats.get(idx).is_some_and(|s| {
                !s.sitting_in
                    && s.waiting_to_sit_in
                    && s.seat_option == Some(SeatOption::WaitForBigBlind)
            });
            if waits {
                self.sat_in(idx);
                let big = self.blinds.big;
                if let Some(seat) = self.seats.get_mut(idx) {
                    seat.prepare_for_new_round();
                    seat.place_bet(big);
                }
                self.players_in_hand += 1;
                seeded_bet = big;
            }
        }

        self.heads_up = self.players_sitting_in == 2;

        // Honor a standing request to skip the big blind.
        let big_blind_seat = if self.heads_up {
            self.seats.next_matching(dealer, in_hand)
        } else {
            self.seats
                .next_matching(dealer, in_hand)
                .and_then(|i| self.seats.next_matching(i, in_hand))
        };
        if let Some(idx) = big_blind_seat
            && self
                .seats
                .get(idx)
                .is_some_and(|s| s.sitting_in && s.sit_out_big_blind)
        {
            if let Some(seat) = self.seats.get_mut(idx) {
                seat.sit_out();
            }
            self.players_sitting_in -= 1;
            self.players_in_hand = self.players_in_hand.saturating_sub(1);
        }

        self.heads_up = self.players_sitting_in == 2;

        self.biggest_bet = seeded_bet;
        self.initial_bet = seeded_bet;
        self.raise_difference = seeded_bet;
        self.all_in_below_min_raise = false;

        if self.players_sitting_in < 2 {
            self.stop_game();
            None
        } else {
            self.initialize_small_blind()
        }
    }

    fn initialize_small_blind(&mut self) -> Option<Followup> {
        self.phase = Phase::SmallBlind;
        // Heads-up, the dealer posts the small blind.
        self.active_seat = if self.heads_up {
            self.dealer_seat
        } else {
            self.dealer_seat
                .and_then(|d| self.seats.next_matching(d, in_hand))
        };
        self.last_player_to_act = None;
        self.posted_small_blind()
    }

    fn posted_small_blind(&mut self) -> Option<Followup> {
        if let Some(idx) = self.active_seat {
            let small = self.blinds.small;
            let unposted = self.seats.get(idx).is_some_and(|s| s.bet == 0);
            if unposted {
                if let Some(seat) = self.seats.get_mut(idx) {
                    seat.place_bet(small);
                    self.biggest_bet = self.biggest_bet.max(seat.bet);
                }
                self.log_action(idx, "bet", format!("posted the small blind ({small})"));
            }
        }
        self.initialize_big_blind()
    }

    fn initialize_big_blind(&mut self) -> Option<Followup> {
        self.phase = Phase::BigBlind;
        if let Some(active) = self.active_seat {
            self.active_seat = self.seats.next_matching(active, can_act);
        }
        self.posted_big_blind()
    }

    fn posted_big_blind(&mut self) -> Option<Followup> {
        if let Some(idx) = self.active_seat {
            let big = self.blinds.big;
            let unposted = self.seats.get(idx).is_some_and(|s| s.bet == 0);
            if unposted {
                if let Some(seat) = self.seats.get_mut(idx) {
                    seat.place_bet(big);
                    self.biggest_bet = self.biggest_bet.max(seat.bet);
                }
                self.log_action(idx, "bet", format!("posted the big blind ({big})"));
            }
            // The big blind closes preflop action, unless posting put
            // them all-in.
            self.last_player_to_act = if self.seats.get(idx).is_some_and(|s| s.chips_in_play == 0) {
                self.seats.prev_matching(idx, can_act)
            } else {
                Some(idx)
            };
        }
        self.initialize_preflop()
    }

    fn initialize_preflop(&mut self) -> Option<Followup> {
        self.phase = Phase::Preflop;
        let mut current = self.active_seat;
        for _ in 0..self.players_in_hand {
            let Some(idx) = current else { break };
            let cards = self.deck.deal(2);
            if let Some(seat) = self.seats.get_mut(idx) {
                seat.cards = cards.clone();
                seat.has_cards = true;
                self.sink
                    .unicast(self.id, seat.player_id, &TableEvent::HoleCards { cards });
            }
            self.update_hand_rating(idx);
            current = self.seats.next_matching(idx, in_hand);
        }
        self.action_to_next_player()
    }

    /// Deals the next street, folds the round's wagers into the pot and
    /// reopens the action — or runs the board out when nobody can act.
    fn initialize_next_phase(&mut self) -> Option<Followup> {
        let dealt = match self.phase {
            Phase::Preflop => {
                self.phase = Phase::Flop;
                self.deck.deal(3)
            }
            Phase::Flop => {
                self.phase = Phase::Turn;
                self.deck.deal(1)
            }
            Phase::Turn => {
                self.phase = Phase::River;
                self.deck.deal(1)
            }
            _ => return None,
        };
        self.board.extend(dealt);
        self.sink.broadcast(
            self.id,
            &TableEvent::Board {
                cards: self.board.clone(),
            },
        );

        self.pot.collect_bets(&mut self.seats);
        self.biggest_bet = 0;
        self.initial_bet = 0;
        self.raise_difference = 0;
        self.all_in_below_min_raise = false;

        self.active_seat = self
            .dealer_seat
            .and_then(|d| self.seats.next_matching(d, can_act));
        self.last_player_to_act = self
            .active_seat
            .and_then(|a| self.seats.prev_matching(a, can_act));

        for idx in 0..self.seats.capacity() {
            if self.seats.get(idx).is_some_and(|s| s.has_cards) {
                self.update_hand_rating(idx);
            }
        }
        self.emit_snapshot();

        if self.other_players_are_all_in() {
            self.end_phase()
        } else {
            Some(self.followup(TimerEvent::PromptActiveSeat))
        }
    }

    /// Moves action to the next seat that can act and prompts it. With
    /// nobody left able to act, the board runs out instead.
    fn action_to_next_player(&mut self) -> Option<Followup> {
        if let Some(active) = self.active_seat {
            self.active_seat = self.seats.next_matching(active, can_act);
        }
        if self.active_seat.is_none() && self.phase.is_betting() && self.other_players_are_all_in()
        {
            return self.end_phase();
        }
        self.prompt_active_seat()
    }

    fn prompt_active_seat(&mut self) -> Option<Followup> {
        let idx = self.active_seat?;
        let prompt = if self.phase == Phase::Preflop || self.biggest_bet > 0 {
            if self.other_players_are_all_in() {
                ActionPrompt::OthersAllIn
            } else if self.all_in_below_min_raise {
                ActionPrompt::RaiseLocked
            } else {
                ActionPrompt::Raised
            }
        } else {
            ActionPrompt::Unraised
        };
        let budget = if self.phase == Phase::Preflop {
            self.config.timing.preflop_action
        } else {
            self.config.timing.postflop_action
        };
        if let Some(seat) = self.seats.get(idx) {
            self.sink.unicast(
                self.id,
                seat.player_id,
                &TableEvent::ActionPrompt {
                    prompt,
                    seconds: budget.as_secs() as u32,
                },
            );
        }
        self.emit_snapshot();
        Some(Followup {
            delay: budget,
            event: TimerEvent::ActTimeout,
        })
    }

    /// True when at most one seat still in the hand has chips behind;
    /// no further action is solicited and the board runs out.
    #[must_use]
    pub fn other_players_are_all_in(&self) -> bool {
        let committed = self
            .seats
            .iter_occupied()
            .filter(|(_, s)| s.in_hand && s.chips_in_play == 0)
            .count();
        committed >= self.players_in_hand.saturating_sub(1)
    }

    fn end_phase(&mut self) -> Option<Followup> {
        match self.phase {
            Phase::Preflop | Phase::Flop | Phase::Turn => {
                if self.other_players_are_all_in() {
                    self.reveal_live_hands();
                }
                Some(self.followup(TimerEvent::BeginNextPhase))
            }
            Phase::River => Some(self.followup(TimerEvent::BeginShowdown)),
            _ => None,
        }
    }

    /// Face-up run-out once betting can no longer happen.
    fn reveal_live_hands(&mut self) {
        for (_, seat) in self.seats.iter_occupied_mut() {
            if seat.in_hand {
                seat.revealed = true;
            }
        }
        self.emit_snapshot();
    }

    fn showdown(&mut self) -> Option<Followup> {
        self.pot.collect_bets(&mut self.seats);
        self.phase = Phase::Showdown;
        self.active_seat = None;
        self.last_player_to_act = None;

        let dealer = self.dealer_seat?;
        let first_to_act = self.seats.next_matching(dealer, in_hand);

        // Walking from first-to-act, a hand at least as strong as the
        // best seen so far must be shown to claim the pot.
        let mut best_rating = 0;
        let mut current = first_to_act;
        for _ in 0..self.players_in_hand {
            let Some(idx) = current else { break };
            self.update_hand_rating(idx);
            if let Some(seat) = self.seats.get_mut(idx) {
                let rating = seat.hand.as_ref().map_or(0, |h| h.rating);
                if rating >= best_rating {
                    seat.revealed = true;
                    best_rating = rating;
                }
            }
            current = self.seats.next_matching(idx, in_hand);
        }

        let rake = self.pot.take_rake(self.phase);
        self.rake_total += rake;
        info!("table {}: rake taken {rake}, total {}", self.id, self.rake_total);

        let awards = self
            .pot
            .distribute(&mut self.seats, first_to_act.unwrap_or(dealer));

        // One message and one win credit per winner, however many
        // layers they took.
        let mut totals: BTreeMap<SeatIndex, Chips> = BTreeMap::new();
        for award in awards {
            *totals.entry(award.seat).or_default() += award.amount;
        }
        for (idx, amount) in totals {
            let Some(seat) = self.seats.get_mut(idx) else {
                continue;
            };
            seat.winnings = amount;
            self.persist.push(PersistOp::IncrementWins {
                player: seat.player_id,
            });
            let hand = seat.hand.as_ref().map(|h| h.name.clone());
            let name = seat.name.clone();
            info!("table {}: {name} wins the pot ({amount})", self.id);
            self.sink.broadcast(
                self.id,
                &TableEvent::Winner {
                    seat: idx,
                    amount,
                    hand,
                },
            );
        }
        self.emit_snapshot();
        Some(self.followup(TimerEvent::EndRound))
    }

    /// Settles the hand: flushes stray wagers, pays an uncontested pot,
    /// applies parked deposits, sits out the broke and the unwilling,
    /// persists balances and rake, then starts over or stops.
    fn end_round(&mut self) -> Option<Followup> {
        self.pot.collect_bets(&mut self.seats);

        if !self.pot.is_empty() {
            let rake = self.pot.take_rake(self.phase);
            self.rake_total += rake;
            info!("table {}: rake taken {rake}, total {}", self.id, self.rake_total);

            if let Some(winner) = self.seats.next_matching(0, in_hand) {
                let total = self.pot.award_all(&mut self.seats, winner);
                if let Some(seat) = self.seats.get_mut(winner) {
                    seat.winnings = total;
                }
                let name = self.seats.get(winner).map(|s| s.name.clone()).unwrap_or_default();
                info!("table {}: {name} wins the pot ({total})", self.id);
                self.sink.broadcast(
                    self.id,
                    &TableEvent::Winner {
                        seat: winner,
                        amount: total,
                        hand: None,
                    },
                );
            }
        }

        for idx in 0..self.seats.capacity() {
            let Some(seat) = self.seats.get_mut(idx) else {
                continue;
            };
            if let Some(deposit) = seat.pending_deposit.take() {
                seat.chips -= deposit;
                seat.chips_in_play += deposit;
            }
            if seat.sitting_in {
                seat.prepare_for_new_round();
                if seat.chips_in_play == 0 || seat.sit_out_next_hand {
                    seat.sit_out();
                    self.players_sitting_in -= 1;
                }
            }
            self.persist.push(PersistOp::SetBalance {
                player: seat.player_id,
                amount: seat.chips + seat.chips_in_play,
            });
        }
        self.persist.push(PersistOp::SaveRakeTotal {
            table: self.id,
            total: self.rake_total,
        });
        self.emit_snapshot();

        if self.players_sitting_in < 2 {
            self.stop_game();
            None
        } else {
            self.initialize_round(true)
        }
    }

    fn stop_game(&mut self) {
        self.phase = Phase::Idle;
        self.pot.reset();
        self.active_seat = None;
        self.last_player_to_act = None;
        self.board.clear();
        self.biggest_bet = 0;
        self.initial_bet = 0;
        self.raise_difference = 0;
        for (_, seat) in self.seats.iter_occupied_mut() {
            seat.cards.clear();
            seat.has_cards = false;
            seat.revealed = false;
            seat.winnings = 0;
            seat.in_hand = false;
        }
        self.game_is_on = false;
        info!("table {}: game stopped", self.id);
        self.sink.broadcast(self.id, &TableEvent::GameStopped);
        self.emit_snapshot();
    }

    // ------------------------------------------------------------------
    // Timers

    /// Entry point for every expired scheduled task.
    pub fn timer_fired(&mut self, event: TimerEvent) -> Option<Followup> {
        match event {
            TimerEvent::PromptActiveSeat => self.prompt_active_seat(),
            TimerEvent::AdvanceAction => self.action_to_next_player(),
            TimerEvent::ActTimeout => self.act_timeout(),
            TimerEvent::TimeBankTick => self.time_bank_tick(),
            TimerEvent::BeginNextPhase => self.initialize_next_phase(),
            TimerEvent::BeginShowdown => self.showdown(),
            TimerEvent::EndRound => self.end_round(),
        }
    }

    /// The active seat ran out of normal time: burn time bank if any is
    /// left, otherwise act for the player.
    fn act_timeout(&mut self) -> Option<Followup> {
        let idx = self.active_seat?;
        let Some(seat) = self.seats.get(idx) else {
            return None;
        };
        if seat.time_bank > 0 {
            self.in_time_bank = true;
            let seconds = seat.time_bank;
            self.sink
                .unicast(self.id, seat.player_id, &TableEvent::TimeBank { seconds });
            self.emit_snapshot();
            Some(Followup {
                delay: Duration::from_secs(1),
                event: TimerEvent::TimeBankTick,
            })
        } else {
            self.auto_act(idx)
        }
    }

    fn time_bank_tick(&mut self) -> Option<Followup> {
        let idx = self.active_seat?;
        let Some(seat) = self.seats.get_mut(idx) else {
            return None;
        };
        seat.time_bank = seat.time_bank.saturating_sub(1);
        let seconds = seat.time_bank;
        let player = seat.player_id;
        self.sink
            .unicast(self.id, player, &TableEvent::TimeBank { seconds });
        if seconds == 0 {
            self.in_time_bank = false;
            self.auto_act(idx)
        } else {
            Some(Followup {
                delay: Duration::from_secs(1),
                event: TimerEvent::TimeBankTick,
            })
        }
    }

    /// Acts for a timed-out player: preflop with no action taken they
    /// sit out; facing a bet they fold; otherwise they check.
    fn auto_act(&mut self, idx: SeatIndex) -> Option<Followup> {
        if let Some(seat) = self.seats.get(idx) {
            self.sink
                .unicast(self.id, seat.player_id, &TableEvent::AutoAction);
        }
        let bet = self.seats.get(idx).map_or(0, |s| s.bet);
        if self.phase == Phase::Preflop {
            self.sat_out(idx, false)
        } else if self.biggest_bet > 0 && bet < self.biggest_bet {
            self.folded(idx)
        } else {
            self.checked(idx)
        }
    }

    /// Periodic time-bank top-up for every seated player.
    pub fn replenish_time_banks(&mut self) {
        if !self.game_is_on {
            return;
        }
        let amount = self.config.timing.time_bank_replenish_amount;
        let cap = self.config.timing.time_bank_max;
        let mut updates = Vec::new();
        for (_, seat) in self.seats.iter_occupied_mut() {
            seat.time_bank = (seat.time_bank + amount).min(cap);
            updates.push((seat.player_id, seat.time_bank));
        }
        for (player, seconds) in updates {
            self.sink
                .unicast(self.id, player, &TableEvent::TimeBank { seconds });
        }
    }

    /// One step of the configured blind schedule.
    pub fn increase_blinds(&mut self) {
        let Some(increase) = &self.config.blind_increase else {
            return;
        };
        self.blinds.small += increase.small_blind_step;
        self.blinds.big = self.blinds.small * 2;
        info!("table {}: blinds raised to {}", self.id, self.blinds);
        self.emit_snapshot();
    }

    // ------------------------------------------------------------------
    // Internals

    fn followup(&self, event: TimerEvent) -> Followup {
        let delay = match event {
            TimerEvent::PromptActiveSeat | TimerEvent::AdvanceAction => {
                self.config.timing.action_delay
            }
            TimerEvent::BeginNextPhase | TimerEvent::BeginShowdown => self.config.timing.phase_delay,
            TimerEvent::EndRound => self.config.timing.end_round_delay,
            TimerEvent::TimeBankTick => Duration::from_secs(1),
            TimerEvent::ActTimeout => self.config.timing.postflop_action,
        };
        Followup { delay, event }
    }

    fn update_hand_rating(&mut self, idx: SeatIndex) {
        if let Some(seat) = self.seats.get_mut(idx) {
            let rating = self.evaluator.evaluate(&seat.cards, &self.board);
            let name = rating.name.clone();
            seat.hand = Some(rating);
            self.sink
                .unicast(self.id, seat.player_id, &TableEvent::HandName { name });
        }
    }

    /// A real action happened while a time bank was ticking down; stop
    /// the countdown and show the player what they have left.
    fn note_action_taken(&mut self) {
        if !self.in_time_bank {
            return;
        }
        self.in_time_bank = false;
        if let Some(idx) = self.active_seat
            && let Some(seat) = self.seats.get(idx)
        {
            self.sink.unicast(
                self.id,
                seat.player_id,
                &TableEvent::TimeBank {
                    seconds: seat.time_bank,
                },
            );
        }
    }

    fn log_action(&mut self, idx: SeatIndex, action: &'static str, what: String) {
        let name = self.seats.get(idx).map(|s| s.name.clone()).unwrap_or_default();
        let message = format!("{name} {what}");
        info!("table {} [{}]: {message}", self.id, self.phase);
        self.sink.broadcast(
            self.id,
            &TableEvent::ActionLog {
                seat: idx,
                action,
                message,
            },
        );
        self.emit_snapshot();
    }

    fn emit_snapshot(&self) {
        self.sink
            .broadcast(self.id, &TableEvent::Snapshot(self.snapshot()));
    }
}

impl std::fmt::Debug for TableEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableEngine")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("active_seat", &self.active_seat)
            .field("dealer_seat", &self.dealer_seat)
            .field("players_sitting_in", &self.players_sitting_in)
            .field("players_in_hand", &self.players_in_hand)
            .finish_non_exhaustive()
    }
}
