//! Pot ledger: bet aggregation into layered pots, side-pot creation,
//! rake extraction, and winner distribution.
//!
//! The ledger is pure state + algorithms. Chips only ever move between
//! seat wagers, pot layers, winners' stacks and the rake total, so the
//! table-wide conservation invariant can be checked at any instant.

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::entities::{Chips, Phase, Seat, SeatIndex};
use super::seats::SeatRegistry;

/// House-fee parameters. Hands settled before the flop pay a flat
/// amount once the pot reaches a minimum size; later streets pay a
/// percentage capped per hand.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RakeConfig {
    /// Minimum total pot before the preflop flat amount is taken.
    pub min_preflop_pot: Chips,
    /// Flat amount taken from hands settled preflop.
    pub preflop_flat: Chips,
    /// Percentage of the pot taken postflop, e.g. `5.0`.
    pub postflop_percent: f64,
    /// Maximum rake per hand on postflop streets.
    pub postflop_max: Chips,
}

impl Default for RakeConfig {
    fn default() -> Self {
        Self {
            min_preflop_pot: 10,
            preflop_flat: 1,
            postflop_percent: 5.0,
            postflop_max: 6,
        }
    }
}

/// One tier of the pot. Contributors are the seats that put chips into
/// this tier while still holding cards; only they can win it.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PotLayer {
    pub amount: Chips,
    pub contributors: BTreeSet<SeatIndex>,
}

/// A single winner's share of one pot layer.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PotAward {
    pub seat: SeatIndex,
    pub amount: Chips,
}

#[derive(Debug)]
pub struct PotLedger {
    /// Layered pots; index 0 is always the main pot.
    layers: Vec<PotLayer>,
    /// Seats whose all-in has already opened a new layer.
    all_in_seats: BTreeSet<SeatIndex>,
    rake: RakeConfig,
}

impl PotLedger {
    #[must_use]
    pub fn new(rake: RakeConfig) -> Self {
        Self {
            layers: vec![PotLayer::default()],
            all_in_seats: BTreeSet::new(),
            rake,
        }
    }

    /// Total chips across all layers.
    #[must_use]
    pub fn total(&self) -> Chips {
        self.layers.iter().map(|p| p.amount).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers[0].amount == 0
    }

    /// Layer amounts for state snapshots, main pot first.
    #[must_use]
    pub fn layer_amounts(&self) -> Vec<Chips> {
        self.layers.iter().map(|p| p.amount).collect()
    }

    #[must_use]
    pub fn layers(&self) -> &[PotLayer] {
        &self.layers
    }

    /// Back to a single empty main pot. Called at the end of every hand.
    pub fn reset(&mut self) {
        if !self.is_empty() {
            warn!("pot reset with {} chips still in it", self.total());
        }
        self.layers.clear();
        self.layers.push(PotLayer::default());
        self.all_in_seats.clear();
    }

    /// Folds every seat's outstanding wager into the layered pots.
    ///
    /// Works tier by tier: while wagers are unequal, the smallest live
    /// wager is peeled off every bettor into the current layer and a new
    /// layer is opened for the remainder, so each distinct stack depth
    /// gets its own layer with the right contributors. When an all-in
    /// surfaced this round, a fresh layer is opened for future betting.
    pub fn collect_bets(&mut self, seats: &mut SeatRegistry) {
        loop {
            // Smallest outstanding wager among seats still in the hand,
            // and whether all such wagers are equal.
            let mut smallest: Option<Chips> = None;
            let mut all_equal = true;
            for (_, seat) in seats.iter_occupied() {
                if seat.bet > 0 && seat.in_hand {
                    match smallest {
                        None => smallest = Some(seat.bet),
                        Some(s) if seat.bet != s => {
                            all_equal = false;
                            if seat.bet < s {
                                smallest = Some(seat.bet);
                            }
                        }
                        Some(_) => {}
                    }
                }
            }

            let current = self.layers.len() - 1;
            if all_equal {
                // Move every wager in full, dead bets included. Only
                // seats still in the hand become contributors.
                let mut new_all_in = false;
                for (idx, seat) in seats.iter_occupied_mut() {
                    if seat.bet > 0 {
                        self.layers[current].amount += seat.bet;
                        seat.bet = 0;
                        if seat.in_hand {
                            self.layers[current].contributors.insert(idx);
                        }
                    }
                    if seat.is_all_in() && self.all_in_seats.insert(idx) {
                        new_all_in = true;
                    }
                }
                if new_all_in && self.layers[current].amount != 0 {
                    self.layers.push(PotLayer::default());
                }
                return;
            }

            // Unequal: peel the smallest tier off every bettor, open a
            // new layer, and go around again for the remainder.
            let tier = smallest.unwrap_or(0);
            for (idx, seat) in seats.iter_occupied_mut() {
                if seat.bet > 0 {
                    let peeled = seat.bet.min(tier);
                    self.layers[current].amount += peeled;
                    seat.bet -= peeled;
                    if seat.in_hand {
                        self.layers[current].contributors.insert(idx);
                    }
                }
            }
            if self.layers[current].amount > 0 {
                self.layers.push(PotLayer::default());
            }
        }
    }

    /// Folds a single seat's outstanding wager into the current layer.
    /// Used when a seat folds or sits out mid-round. Contributor
    /// membership is an explicit set insert, so seat 0 is recorded like
    /// any other seat.
    pub fn collect_seat_bet(&mut self, idx: SeatIndex, seat: &mut Seat) {
        let current = self.layers.len() - 1;
        self.layers[current].amount += seat.bet;
        seat.bet = 0;
        self.layers[current].contributors.insert(idx);
    }

    /// Strikes a seat from every layer's contributor set. A folded seat
    /// keeps its chips in the pot but can no longer win any of it.
    pub fn remove_contributor(&mut self, idx: SeatIndex) {
        for layer in &mut self.layers {
            layer.contributors.remove(&idx);
        }
    }

    /// Pays out every layer, side pots before the main pot.
    ///
    /// Within a layer the contributors still in the hand with the
    /// highest hand rating split the chips. An uneven split's remainder
    /// goes to the tied winner seated nearest `first_to_act`, scanning
    /// clockwise, so no chip is ever dropped. Resets the ledger.
    pub fn distribute(&mut self, seats: &mut SeatRegistry, first_to_act: SeatIndex) -> Vec<PotAward> {
        let capacity = seats.capacity();
        let mut awards = Vec::new();

        for layer in self.layers.iter().rev() {
            if layer.amount == 0 {
                continue;
            }

            let mut best_rating = 0;
            let mut winners: Vec<SeatIndex> = Vec::new();
            for (idx, seat) in seats.iter_occupied() {
                if seat.in_hand && layer.contributors.contains(&idx) {
                    let rating = seat.hand.as_ref().map_or(0, |h| h.rating);
                    if rating > best_rating {
                        best_rating = rating;
                        winners = vec![idx];
                    } else if rating == best_rating {
                        winners.push(idx);
                    }
                }
            }

            match winners.as_slice() {
                [] => {
                    warn!("pot layer of {} has no eligible winner", layer.amount);
                }
                [sole] => {
                    if let Some(seat) = seats.get_mut(*sole) {
                        seat.chips_in_play += layer.amount;
                    }
                    awards.push(PotAward {
                        seat: *sole,
                        amount: layer.amount,
                    });
                }
                _ => {
                    let count = winners.len() as Chips;
                    let share = layer.amount / count;
                    let remainder = layer.amount - share * count;
                    let lucky = winners
                        .iter()
                        .copied()
                        .min_by_key(|&idx| (idx + capacity - first_to_act) % capacity)
                        .unwrap_or(first_to_act);
                    for &idx in &winners {
                        let winnings = if idx == lucky { share + remainder } else { share };
                        if let Some(seat) = seats.get_mut(idx) {
                            seat.chips_in_play += winnings;
                        }
                        awards.push(PotAward {
                            seat: idx,
                            amount: winnings,
                        });
                    }
                }
            }
        }

        self.reset_silently();
        awards
    }

    /// Awards every layer to a single known winner (everyone else
    /// folded). Returns the total credited. Resets the ledger.
    pub fn award_all(&mut self, seats: &mut SeatRegistry, winner: SeatIndex) -> Chips {
        let total = self.total();
        if let Some(seat) = seats.get_mut(winner) {
            seat.chips_in_play += total;
        }
        self.reset_silently();
        total
    }

    /// Deducts the house fee from the pot and returns it.
    pub fn take_rake(&mut self, phase: Phase) -> Chips {
        if phase.is_preflop_rake() {
            if self.total() >= self.rake.min_preflop_pot {
                let rake = self.rake.preflop_flat.min(self.layers[0].amount);
                self.layers[0].amount -= rake;
                rake
            } else {
                0
            }
        } else {
            self.take_postflop_rake()
        }
    }

    fn take_postflop_rake(&mut self) -> Chips {
        let fraction = self.rake.postflop_percent / 100.0;
        if fraction * f64::from(self.total()) < 0.5 {
            return 0;
        }

        let funded: Vec<usize> = (0..self.layers.len())
            .filter(|&i| self.layers[i].amount > 0)
            .collect();

        if let [single] = funded.as_slice() {
            let mut rake = fraction * f64::from(self.layers[*single].amount);
            if rake > f64::from(self.rake.postflop_max) {
                rake = f64::from(self.rake.postflop_max);
            }
            // Fractional rake below 1.5 rounds down to a single chip,
            // anything above rounds up.
            let rake = if rake <= 1.5 { 1 } else { rake.ceil() as Chips };
            self.layers[*single].amount -= rake.min(self.layers[*single].amount);
            return rake;
        }

        // Multiple layers: accumulate each layer's share (rounded up),
        // truncating the last contribution to land exactly on the cap.
        let mut rake: Chips = 0;
        for idx in funded {
            let mut share = (fraction * f64::from(self.layers[idx].amount)).ceil() as Chips;
            if rake + share >= self.rake.postflop_max {
                share = self.rake.postflop_max - rake;
                self.layers[idx].amount -= share;
                return self.rake.postflop_max;
            }
            rake += share;
            self.layers[idx].amount -= share;
        }
        rake
    }

    fn reset_silently(&mut self) {
        self.layers.clear();
        self.layers.push(PotLayer::default());
        self.all_in_seats.clear();
    }
}
