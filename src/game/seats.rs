//! Ordered, fixed-capacity seat collection.
//!
//! Turn order, blind positions and showdown order are all "the next
//! seat clockwise that satisfies some condition", so the registry's
//! core operations are predicate searches with wraparound.

use super::entities::{PlayerId, Seat, SeatIndex};

#[derive(Debug)]
pub struct SeatRegistry {
    seats: Vec<Option<Seat>>,
}

impl SeatRegistry {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let mut seats = Vec::with_capacity(capacity);
        seats.resize_with(capacity, || None);
        Self { seats }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.seats.len()
    }

    #[must_use]
    pub fn get(&self, idx: SeatIndex) -> Option<&Seat> {
        self.seats.get(idx).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, idx: SeatIndex) -> Option<&mut Seat> {
        self.seats.get_mut(idx).and_then(Option::as_mut)
    }

    /// Place a player at `idx`. The seat must be empty.
    pub fn occupy(&mut self, idx: SeatIndex, seat: Seat) {
        debug_assert!(self.seats[idx].is_none());
        self.seats[idx] = Some(seat);
    }

    /// Empty the seat, returning the departing player's state.
    pub fn vacate(&mut self, idx: SeatIndex) -> Option<Seat> {
        self.seats.get_mut(idx).and_then(Option::take)
    }

    pub fn iter_occupied(&self) -> impl Iterator<Item = (SeatIndex, &Seat)> {
        self.seats
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|seat| (i, seat)))
    }

    pub fn iter_occupied_mut(&mut self) -> impl Iterator<Item = (SeatIndex, &mut Seat)> {
        self.seats
            .iter_mut()
            .enumerate()
            .filter_map(|(i, s)| s.as_mut().map(|seat| (i, seat)))
    }

    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.iter_occupied().count()
    }

    #[must_use]
    pub fn first_free(&self) -> Option<SeatIndex> {
        self.seats.iter().position(Option::is_none)
    }

    /// The seat a given player occupies, if any.
    #[must_use]
    pub fn position_of(&self, player_id: PlayerId) -> Option<SeatIndex> {
        self.iter_occupied()
            .find(|(_, s)| s.player_id == player_id)
            .map(|(i, _)| i)
    }

    /// Finds the next seat after `offset` (clockwise, wrapping) whose
    /// occupant satisfies `pred`. `offset` itself is checked last, so a
    /// table where only the offset seat matches returns the offset.
    #[must_use]
    pub fn next_matching<F>(&self, offset: SeatIndex, pred: F) -> Option<SeatIndex>
    where
        F: Fn(&Seat) -> bool,
    {
        let n = self.seats.len();
        (1..=n)
            .map(|step| (offset + step) % n)
            .find(|&i| self.get(i).is_some_and(&pred))
    }

    /// Counterclockwise counterpart of [`Self::next_matching`].
    #[must_use]
    pub fn prev_matching<F>(&self, offset: SeatIndex, pred: F) -> Option<SeatIndex>
    where
        F: Fn(&Seat) -> bool,
    {
        let n = self.seats.len();
        (1..=n)
            .map(|step| (offset + n - step) % n)
            .find(|&i| self.get(i).is_some_and(&pred))
    }
}

/// Seats still contesting the hand.
pub fn in_hand(seat: &Seat) -> bool {
    seat.in_hand
}

/// Seats that can still be asked to act: contesting the hand with chips
/// behind.
pub fn can_act(seat: &Seat) -> bool {
    seat.in_hand && seat.chips_in_play > 0
}

/// Seats dealt into the next hand.
pub fn sitting_in(seat: &Seat) -> bool {
    seat.sitting_in
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn registry(occupied: &[SeatIndex]) -> SeatRegistry {
        let mut reg = SeatRegistry::new(6);
        for &i in occupied {
            let mut seat = Seat::new(Uuid::new_v4(), format!("p{i}"), 500, 500, 60);
            seat.sitting_in = true;
            seat.in_hand = true;
            reg.occupy(i, seat);
        }
        reg
    }

    #[test]
    fn test_next_matching_wraps_around() {
        let reg = registry(&[1, 4]);
        assert_eq!(reg.next_matching(4, in_hand), Some(1));
        assert_eq!(reg.next_matching(1, in_hand), Some(4));
        assert_eq!(reg.next_matching(0, in_hand), Some(1));
    }

    #[test]
    fn test_next_matching_returns_offset_last() {
        let reg = registry(&[2]);
        assert_eq!(reg.next_matching(2, in_hand), Some(2));
    }

    #[test]
    fn test_prev_matching_wraps_around() {
        let reg = registry(&[1, 4]);
        assert_eq!(reg.prev_matching(1, in_hand), Some(4));
        assert_eq!(reg.prev_matching(4, in_hand), Some(1));
        assert_eq!(reg.prev_matching(0, in_hand), Some(4));
    }

    #[test]
    fn test_predicate_filters() {
        let mut reg = registry(&[0, 1, 2]);
        reg.get_mut(1).unwrap().chips_in_play = 0;
        assert_eq!(reg.next_matching(0, can_act), Some(2));
        assert_eq!(reg.prev_matching(0, can_act), Some(2));
        assert_eq!(reg.next_matching(0, in_hand), Some(1));
    }

    #[test]
    fn test_no_match_returns_none() {
        let reg = SeatRegistry::new(4);
        assert_eq!(reg.next_matching(0, in_hand), None);
        assert_eq!(reg.prev_matching(3, in_hand), None);
    }

    #[test]
    fn test_first_free_and_counts() {
        let mut reg = registry(&[0, 2]);
        assert_eq!(reg.first_free(), Some(1));
        assert_eq!(reg.occupied_count(), 2);
        reg.vacate(0);
        assert_eq!(reg.first_free(), Some(0));
        assert_eq!(reg.occupied_count(), 1);
    }

    #[test]
    fn test_position_of() {
        let mut reg = SeatRegistry::new(3);
        let id = Uuid::new_v4();
        reg.occupy(2, Seat::new(id, "bob".to_string(), 100, 100, 0));
        assert_eq!(reg.position_of(id), Some(2));
        assert_eq!(reg.position_of(Uuid::new_v4()), None);
    }
}
