//! Seat inventory for an event.
//!
//! Seats are not stored on their own; they live inside registrations. A seat
//! is occupied while a non-cancelled registration of the event holds it as
//! RESERVED. Everything here is computed fresh from the loaded state.
//!
//! **Double-booking**: a booking re-checks every seat against current
//! occupancy inside the same unit of work that writes it, and the store
//! refuses the write if the registrations changed since they were loaded.

use std::collections::BTreeSet;

use crate::error::TicketingError;
use crate::state::TicketingState;
use crate::types::{EventId, Registration, RegistrationId, SeatId, SeatPosition, SeatStatus, GRID_SIZE};

/// Seats still free for `event_id`: total seats minus every seat held by a
/// non-cancelled registration.
#[must_use]
pub fn available_seats(state: &TicketingState, event_id: &EventId) -> u32 {
    available_seats_excluding(state, event_id, None)
}

/// Like [`available_seats`], ignoring the seats of one registration (the one
/// a booking is about to replace).
#[must_use]
pub fn available_seats_excluding(
    state: &TicketingState,
    event_id: &EventId,
    excluded: Option<&RegistrationId>,
) -> u32 {
    let Some(event) = state.events.get(event_id) else {
        return 0;
    };
    let held: u32 = holding_registrations(state, event_id, excluded)
        .map(Registration::seat_count)
        .fold(0, u32::saturating_add);
    event.total_seats.saturating_sub(held)
}

/// RESERVED seats across the event's non-cancelled registrations
#[must_use]
pub fn occupied_seats(state: &TicketingState, event_id: &EventId) -> BTreeSet<SeatId> {
    occupied_seats_excluding(state, event_id, None)
}

/// Like [`occupied_seats`], ignoring one registration
#[must_use]
pub fn occupied_seats_excluding(
    state: &TicketingState,
    event_id: &EventId,
    excluded: Option<&RegistrationId>,
) -> BTreeSet<SeatId> {
    holding_registrations(state, event_id, excluded)
        .flat_map(|registration| registration.seats.iter())
        .filter(|seat| seat.status == SeatStatus::Reserved)
        .map(|seat| seat.seat_id.clone())
        .collect()
}

fn holding_registrations<'a>(
    state: &'a TicketingState,
    event_id: &'a EventId,
    excluded: Option<&'a RegistrationId>,
) -> impl Iterator<Item = &'a Registration> + 'a {
    state
        .registrations_for_event(event_id)
        .filter(|registration| registration.is_active())
        .filter(move |registration| Some(&registration.id) != excluded)
}

/// Occupancy of the 10×10 seat grid
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeatGrid {
    occupied: BTreeSet<SeatId>,
}

impl SeatGrid {
    /// Build a grid from a set of occupied seats
    #[must_use]
    pub const fn new(occupied: BTreeSet<SeatId>) -> Self {
        Self { occupied }
    }

    /// Check whether the seat at `position` is taken
    #[must_use]
    pub fn is_occupied(&self, position: SeatPosition) -> bool {
        self.occupied.contains(&position.seat_id())
    }

    /// Number of taken seats
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.occupied.len()
    }

    /// Occupancy row by row, `true` meaning taken
    #[must_use]
    pub fn rows(&self) -> Vec<Vec<bool>> {
        (1..=GRID_SIZE)
            .map(|row| {
                (1..=GRID_SIZE)
                    .map(|column| {
                        SeatPosition::new(row, column)
                            .is_ok_and(|position| self.is_occupied(position))
                    })
                    .collect()
            })
            .collect()
    }
}

/// Current seat grid of an event
#[must_use]
pub fn seat_grid(state: &TicketingState, event_id: &EventId) -> SeatGrid {
    SeatGrid::new(occupied_seats(state, event_id))
}

/// A seat selection in progress.
///
/// Picks are checked one at a time against the occupied seats and against
/// earlier picks. A rejected pick leaves the earlier picks in place, so the
/// caller can simply ask for that seat again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeatSelection {
    occupied: BTreeSet<SeatId>,
    picks: Vec<SeatPosition>,
    wanted: u32,
}

impl SeatSelection {
    /// Start selecting `wanted` seats when `occupied` are taken and
    /// `available` remain.
    ///
    /// # Errors
    ///
    /// - [`TicketingError::InvalidInput`] if `wanted` is zero
    /// - [`TicketingError::InsufficientSeats`] if more seats are wanted than remain
    pub fn new(
        occupied: BTreeSet<SeatId>,
        wanted: u32,
        available: u32,
    ) -> Result<Self, TicketingError> {
        if wanted == 0 {
            return Err(TicketingError::InvalidInput(
                "at least one ticket is required".to_string(),
            ));
        }
        if wanted > available {
            return Err(TicketingError::InsufficientSeats {
                requested: wanted,
                available,
            });
        }
        Ok(Self {
            occupied,
            picks: Vec::new(),
            wanted,
        })
    }

    /// Pick the seat at `row`, `column`.
    ///
    /// # Errors
    ///
    /// - [`TicketingError::SeatOutOfRange`] outside the grid
    /// - [`TicketingError::SeatOccupied`] if someone else holds it
    /// - [`TicketingError::SeatAlreadySelected`] if it was picked earlier
    /// - [`TicketingError::InvalidInput`] if the selection is already complete
    pub fn pick(&mut self, row: u8, column: u8) -> Result<SeatId, TicketingError> {
        let position = SeatPosition::new(row, column)?;
        self.pick_position(position)
    }

    /// Pick a validated position; see [`pick`](Self::pick).
    ///
    /// # Errors
    ///
    /// Same as [`pick`](Self::pick), minus the range check.
    pub fn pick_position(&mut self, position: SeatPosition) -> Result<SeatId, TicketingError> {
        if self.is_complete() {
            return Err(TicketingError::InvalidInput(format!(
                "all {} seats have been selected",
                self.wanted
            )));
        }
        let seat_id = position.seat_id();
        if self.occupied.contains(&seat_id) {
            return Err(TicketingError::SeatOccupied(seat_id));
        }
        if self.picks.contains(&position) {
            return Err(TicketingError::SeatAlreadySelected(seat_id));
        }
        self.picks.push(position);
        Ok(seat_id)
    }

    /// Seats picked so far, in order
    #[must_use]
    pub fn picks(&self) -> &[SeatPosition] {
        &self.picks
    }

    /// Seats still to pick
    #[must_use]
    pub fn remaining(&self) -> u32 {
        let picked = u32::try_from(self.picks.len()).unwrap_or(u32::MAX);
        self.wanted.saturating_sub(picked)
    }

    /// Check whether every wanted seat has been picked
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }

    /// Finish the selection
    #[must_use]
    pub fn into_positions(self) -> Vec<SeatPosition> {
        self.picks
    }
}
