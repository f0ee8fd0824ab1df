//! Side pot layering tests against the real ledger.
//!
//! These verify that bet aggregation produces one funded layer per
//! distinct stack depth with the right contributors, that chips are
//! conserved through collection and distribution, and that uneven
//! splits never drop a chip.

use card_table::game::entities::{Chips, Seat, SeatIndex};
use card_table::game::eval::HandRating;
use card_table::game::pot::{PotLedger, RakeConfig};
use card_table::game::seats::SeatRegistry;
use proptest::prelude::*;
use std::collections::BTreeSet;
use uuid::Uuid;

fn registry(stacks: &[Chips]) -> SeatRegistry {
    let mut seats = SeatRegistry::new(stacks.len().max(2));
    for (i, &stack) in stacks.iter().enumerate() {
        let mut seat = Seat::new(Uuid::new_v4(), format!("p{i}"), stack, stack, 0);
        seat.sitting_in = true;
        seat.in_hand = true;
        seats.occupy(i, seat);
    }
    seats
}

fn rate(seats: &mut SeatRegistry, idx: SeatIndex, rating: u32) {
    seats.get_mut(idx).unwrap().hand = Some(HandRating {
        rating,
        name: format!("rated {rating}"),
        cards: vec![],
    });
}

/// Stacks [50, 100, 100] all-in preflop must yield a 150 main pot with
/// three contributors and a 100 side pot with two, replayed across two
/// betting rounds the way a real hand equalizes bets.
#[test]
fn test_three_player_all_in_layering() {
    let mut seats = registry(&[50, 100, 100]);
    let mut pot = PotLedger::new(RakeConfig::default());

    // Round one: everyone puts in 50, the short stack is all-in.
    for idx in 0..3 {
        seats.get_mut(idx).unwrap().place_bet(50);
    }
    pot.collect_bets(&mut seats);

    // Round two: the two deep stacks commit the rest.
    for idx in 1..3 {
        seats.get_mut(idx).unwrap().place_bet(50);
    }
    pot.collect_bets(&mut seats);

    let funded: Vec<_> = pot.layers().iter().filter(|l| l.amount > 0).collect();
    assert_eq!(funded.len(), 2);
    assert_eq!(funded[0].amount, 150);
    assert_eq!(funded[0].contributors.len(), 3);
    assert_eq!(funded[1].amount, 100);
    assert_eq!(
        funded[1].contributors.iter().copied().collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert_eq!(pot.total(), 250);
}

/// The same stacks shoved in a single round decompose identically.
#[test]
fn test_three_player_all_in_single_round() {
    let mut seats = registry(&[50, 100, 100]);
    for idx in 0..3 {
        let stack = seats.get(idx).unwrap().chips_in_play;
        seats.get_mut(idx).unwrap().place_bet(stack);
    }
    let mut pot = PotLedger::new(RakeConfig::default());
    pot.collect_bets(&mut seats);

    let amounts: Vec<Chips> = pot
        .layers()
        .iter()
        .map(|l| l.amount)
        .filter(|&a| a > 0)
        .collect();
    assert_eq!(amounts, vec![150, 100]);
}

/// Splitting a 101-chip pot between two tied winners awards 51 to the
/// seat nearest first-to-act and 50 to the other.
#[test]
fn test_odd_chip_goes_to_first_to_act_side() {
    let mut seats = registry(&[200, 200]);
    {
        let seat = seats.get_mut(0).unwrap();
        seat.place_bet(50);
    }
    {
        let seat = seats.get_mut(1).unwrap();
        seat.place_bet(51);
    }
    let mut pot = PotLedger::new(RakeConfig::default());
    for idx in 0..2 {
        let seat = seats.get_mut(idx).unwrap();
        pot.collect_seat_bet(idx, seat);
    }
    rate(&mut seats, 0, 77);
    rate(&mut seats, 1, 77);

    let awards = pot.distribute(&mut seats, 0);
    let amount_for = |i: usize| awards.iter().find(|a| a.seat == i).unwrap().amount;
    assert_eq!(amount_for(0), 51);
    assert_eq!(amount_for(1), 50);
}

proptest! {
    /// Collection never creates or destroys chips, and always flushes
    /// every wager.
    #[test]
    fn prop_collection_conserves_chips(stacks in prop::collection::vec(1u32..=500, 2..=9)) {
        let mut seats = registry(&stacks);
        for idx in 0..stacks.len() {
            let stack = seats.get(idx).unwrap().chips_in_play;
            seats.get_mut(idx).unwrap().place_bet(stack);
        }
        let mut pot = PotLedger::new(RakeConfig::default());
        pot.collect_bets(&mut seats);

        let expected: Chips = stacks.iter().sum();
        prop_assert_eq!(pot.total(), expected);
        for (_, seat) in seats.iter_occupied() {
            prop_assert_eq!(seat.bet, 0);
        }
    }

    /// An all-in pile-up produces exactly one funded layer per distinct
    /// stack size.
    #[test]
    fn prop_one_funded_layer_per_stack_tier(stacks in prop::collection::vec(1u32..=500, 2..=9)) {
        let mut seats = registry(&stacks);
        for idx in 0..stacks.len() {
            let stack = seats.get(idx).unwrap().chips_in_play;
            seats.get_mut(idx).unwrap().place_bet(stack);
        }
        let mut pot = PotLedger::new(RakeConfig::default());
        pot.collect_bets(&mut seats);

        let tiers: BTreeSet<Chips> = stacks.iter().copied().collect();
        let funded = pot.layers().iter().filter(|l| l.amount > 0).count();
        prop_assert_eq!(funded, tiers.len());
    }

    /// Layer k is winnable exactly by the seats deep enough to have
    /// reached its tier.
    #[test]
    fn prop_contributors_match_tier_depth(stacks in prop::collection::vec(1u32..=500, 2..=9)) {
        let mut seats = registry(&stacks);
        for idx in 0..stacks.len() {
            let stack = seats.get(idx).unwrap().chips_in_play;
            seats.get_mut(idx).unwrap().place_bet(stack);
        }
        let mut pot = PotLedger::new(RakeConfig::default());
        pot.collect_bets(&mut seats);

        let tiers: Vec<Chips> = stacks.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let funded: Vec<_> = pot.layers().iter().filter(|l| l.amount > 0).collect();
        for (layer, &tier) in funded.iter().zip(tiers.iter()) {
            let eligible: BTreeSet<usize> = stacks
                .iter()
                .enumerate()
                .filter(|&(_, &s)| s >= tier)
                .map(|(i, _)| i)
                .collect();
            prop_assert_eq!(&layer.contributors, &eligible);
        }
    }

    /// However a pot splits between tied winners, every chip lands on a
    /// winner and the spread between shares is at most the remainder.
    #[test]
    fn prop_split_remainder_never_drops_chips(
        shares in prop::collection::vec(1u32..=400, 2..=9),
        first_to_act in 0usize..9,
    ) {
        let n = shares.len();
        let first_to_act = first_to_act % n;
        let mut seats = registry(&vec![1000; n]);
        for (idx, &share) in shares.iter().enumerate() {
            let seat = seats.get_mut(idx).unwrap();
            seat.place_bet(share);
        }
        let mut pot = PotLedger::new(RakeConfig::default());
        for idx in 0..n {
            let seat = seats.get_mut(idx).unwrap();
            pot.collect_seat_bet(idx, seat);
        }
        for idx in 0..n {
            rate(&mut seats, idx, 1);
        }
        let amount: Chips = shares.iter().sum();

        let awards = pot.distribute(&mut seats, first_to_act);
        let distributed: Chips = awards.iter().map(|a| a.amount).sum();
        prop_assert_eq!(distributed, amount);
        prop_assert_eq!(awards.len(), n);

        let maximum = awards.iter().map(|a| a.amount).max().unwrap();
        let minimum = awards.iter().map(|a| a.amount).min().unwrap();
        prop_assert!(maximum - minimum <= amount % n as Chips + 1);

        let total_after: Chips = seats.iter_occupied().map(|(_, s)| s.total_chips()).sum();
        prop_assert_eq!(total_after, 1000 * n as Chips);
    }

    /// A fold before distribution keeps the folder's chips in the pot
    /// while barring them from winning any layer.
    #[test]
    fn prop_folded_seat_never_wins(
        stacks in prop::collection::vec(10u32..=500, 3..=9),
        folder in 0usize..9,
    ) {
        let n = stacks.len();
        let folder = folder % n;
        let mut seats = registry(&stacks);
        for idx in 0..n {
            let stack = seats.get(idx).unwrap().chips_in_play;
            seats.get_mut(idx).unwrap().place_bet(stack);
        }
        let mut pot = PotLedger::new(RakeConfig::default());
        pot.collect_bets(&mut seats);

        pot.remove_contributor(folder);
        seats.get_mut(folder).unwrap().fold();
        for idx in 0..n {
            // The folder holds the best rating on record, which must
            // not matter.
            rate(&mut seats, idx, if idx == folder { 1000 } else { 10 + idx as u32 });
        }

        let awards = pot.distribute(&mut seats, 0);
        prop_assert!(awards.iter().all(|a| a.seat != folder));
    }
}
