//! Registration aggregate.
//!
//! A registration is a customer's claim on seats for one event. It is
//! created PENDING with its seats already RESERVED, so nobody else can pick
//! them while the customer pays.
//!
//! A customer holds at most one PENDING registration per event. Booking the
//! same event again replaces that registration's seats in place and restarts
//! its grace period; paid registrations are never touched by a new booking.

use boxoffice_core::reducer::Reducer;
use chrono::{DateTime, Utc};

use super::inventory::{available_seats_excluding, occupied_seats_excluding, SeatSelection};
use super::status::current_status;
use super::{find_event, owned_registration, TicketingEnvironment};
use crate::error::TicketingError;
use crate::state::TicketingState;
use crate::types::{
    EventId, EventStatus, Registration, RegistrationId, RegistrationStatus, Seat, SeatPosition,
    UserId,
};

/// Actions for the Registration aggregate
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistrationAction {
    /// Claim seats for an event
    Register {
        /// Customer booking
        customer: UserId,
        /// Event to book
        event_id: EventId,
        /// Seats in the order they were picked
        seats: Vec<SeatPosition>,
    },
    /// Withdraw an unpaid registration
    Cancel {
        /// Customer withdrawing
        customer: UserId,
        /// Registration to withdraw
        registration_id: RegistrationId,
    },
}

/// Reducer for the Registration aggregate
#[derive(Clone, Copy, Debug, Default)]
pub struct RegistrationReducer;

impl RegistrationReducer {
    /// Creates a new `RegistrationReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// The customer's PENDING registration for an event, if any
    #[must_use]
    pub fn pending_for<'a>(
        state: &'a TicketingState,
        customer: &UserId,
        event_id: &EventId,
    ) -> Option<&'a Registration> {
        state.registrations.iter().find(|registration| {
            &registration.customer_id == customer
                && &registration.event_id == event_id
                && registration.status == RegistrationStatus::Pending
        })
    }

    /// Open a seat selection for `customer`, seeing the seats of their own
    /// PENDING registration for the event as free.
    ///
    /// # Errors
    ///
    /// Returns an error if the event is missing or not bookable at `now`, or
    /// if `wanted` exceeds the seats left.
    pub fn start_selection(
        state: &TicketingState,
        customer: &UserId,
        event_id: &EventId,
        wanted: u32,
        now: DateTime<Utc>,
    ) -> Result<SeatSelection, TicketingError> {
        Self::validate_bookable(state, event_id, now)?;
        let replaced = Self::pending_for(state, customer, event_id).map(|r| &r.id);
        SeatSelection::new(
            occupied_seats_excluding(state, event_id, replaced),
            wanted,
            available_seats_excluding(state, event_id, replaced),
        )
    }

    fn validate_bookable(
        state: &TicketingState,
        event_id: &EventId,
        now: DateTime<Utc>,
    ) -> Result<(), TicketingError> {
        let event = find_event(state, event_id)?;
        let status = current_status(event, now);
        if status != EventStatus::Scheduled {
            return Err(TicketingError::EventNotAvailable {
                event_id: event_id.clone(),
                status,
            });
        }
        Ok(())
    }

    fn register(
        state: &mut TicketingState,
        customer: UserId,
        event_id: EventId,
        seats: &[SeatPosition],
        now: DateTime<Utc>,
    ) -> Result<Registration, TicketingError> {
        let wanted = u32::try_from(seats.len()).unwrap_or(u32::MAX);
        let mut selection = Self::start_selection(state, &customer, &event_id, wanted, now)?;
        for position in seats {
            selection.pick_position(*position)?;
        }
        let positions = selection.into_positions();

        let replaced = Self::pending_for(state, &customer, &event_id).map(|r| r.id.clone());
        let registration = match replaced.and_then(|id| state.registrations.get_mut(&id)) {
            Some(registration) => {
                registration.seats = positions
                    .into_iter()
                    .map(|position| Seat::reserved(position, registration.id.clone()))
                    .collect();
                registration.registered_at = now;
                tracing::info!(
                    registration_id = %registration.id,
                    event_id = %event_id,
                    seats = registration.seats.len(),
                    "Pending registration rebooked"
                );
                registration.clone()
            }
            None => {
                let id = state.registrations.allocate_id();
                let registration = Registration {
                    seats: positions
                        .into_iter()
                        .map(|position| Seat::reserved(position, id.clone()))
                        .collect(),
                    id,
                    customer_id: customer,
                    event_id,
                    registered_at: now,
                    status: RegistrationStatus::Pending,
                    deleted: false,
                };
                tracing::info!(
                    registration_id = %registration.id,
                    event_id = %registration.event_id,
                    seats = registration.seats.len(),
                    "Registration created"
                );
                state.registrations.insert(registration.clone());
                registration
            }
        };
        Ok(registration)
    }

    fn cancel(
        state: &mut TicketingState,
        customer: &UserId,
        registration_id: &RegistrationId,
    ) -> Result<Registration, TicketingError> {
        let registration = owned_registration(state, customer, registration_id)?;
        if registration.status != RegistrationStatus::Pending {
            return Err(TicketingError::InvalidRegistrationStatus {
                registration_id: registration_id.clone(),
                status: registration.status,
            });
        }

        let registration = state
            .registrations
            .get_mut(registration_id)
            .ok_or_else(|| TicketingError::RegistrationNotFound(registration_id.clone()))?;
        registration.cancel();
        tracing::info!(%registration_id, "Registration withdrawn");
        Ok(registration.clone())
    }
}

impl Reducer for RegistrationReducer {
    type State = TicketingState;
    type Action = RegistrationAction;
    type Environment = TicketingEnvironment;
    type Output = Result<Registration, TicketingError>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Self::Output {
        match action {
            RegistrationAction::Register {
                customer,
                event_id,
                seats,
            } => Self::register(state, customer, event_id, &seats, env.now()),
            RegistrationAction::Cancel {
                customer,
                registration_id,
            } => Self::cancel(state, &customer, &registration_id),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::aggregates::inventory::available_seats;
    use crate::aggregates::test_support::{
        add_event, add_paid_registration, add_registration, bob, customer, env_at,
    };
    use crate::types::SeatStatus;
    use boxoffice_testing::{assertions, helpers::utc, ReducerTest};
    use chrono::Duration;

    fn positions(labels: &[&str]) -> Vec<SeatPosition> {
        labels.iter().map(|label| label.parse().unwrap()).collect()
    }

    fn gala(state: &mut TicketingState, seats: u32) -> EventId {
        add_event(state, utc(2025, 3, 1, 14, 0), utc(2025, 3, 1, 16, 0), seats)
    }

    #[test]
    fn register_reserves_seats() {
        let mut state = TicketingState::new();
        let event_id = gala(&mut state, 10);
        let now = utc(2025, 2, 1, 9, 0);

        ReducerTest::new(RegistrationReducer::new())
            .with_env(env_at(now))
            .given_state(state)
            .when_action(RegistrationAction::Register {
                customer: customer(),
                event_id: event_id.clone(),
                seats: positions(&["R1C1", "R1C2"]),
            })
            .then_state(move |state| {
                assert_eq!(available_seats(state, &event_id), 8);
            })
            .then_output(move |output| {
                let registration = output.as_ref().unwrap();
                assert_eq!(registration.id.as_str(), "REG001");
                assert_eq!(registration.status, RegistrationStatus::Pending);
                assert_eq!(registration.registered_at, now);
                assert!(registration.seats.iter().all(|seat| {
                    seat.status == SeatStatus::Reserved
                        && seat.registration_id.as_ref() == Some(&registration.id)
                }));
            })
            .run();
    }

    #[test]
    fn occupied_seat_is_rejected_without_changes() {
        let mut state = TicketingState::new();
        let event_id = gala(&mut state, 10);
        add_registration(&mut state, &bob(), &event_id, &[(1, 2)], RegistrationStatus::Pending, utc(2025, 2, 1, 8, 0));

        ReducerTest::new(RegistrationReducer::new())
            .with_env(env_at(utc(2025, 2, 1, 9, 0)))
            .given_state(state)
            .when_action(RegistrationAction::Register {
                customer: customer(),
                event_id,
                seats: positions(&["R1C1", "R1C2"]),
            })
            .then_state_unchanged()
            .then_output(|output| {
                assertions::assert_rejected_with(output, |error| {
                    matches!(error, TicketingError::SeatOccupied(seat) if seat.as_str() == "R1C2")
                });
            })
            .run();
    }

    #[test]
    fn duplicate_pick_is_rejected() {
        let mut state = TicketingState::new();
        let event_id = gala(&mut state, 10);

        ReducerTest::new(RegistrationReducer::new())
            .with_env(env_at(utc(2025, 2, 1, 9, 0)))
            .given_state(state)
            .when_action(RegistrationAction::Register {
                customer: customer(),
                event_id,
                seats: positions(&["R3C3", "R3C3"]),
            })
            .then_state_unchanged()
            .then_output(|output| {
                assertions::assert_rejected_with(output, |error| {
                    matches!(error, TicketingError::SeatAlreadySelected(_))
                });
            })
            .run();
    }

    #[test]
    fn more_tickets_than_available_is_rejected() {
        let mut state = TicketingState::new();
        let event_id = gala(&mut state, 2);
        add_paid_registration(&mut state, &bob(), &event_id, &[(1, 1)], utc(2025, 2, 1, 8, 0));

        ReducerTest::new(RegistrationReducer::new())
            .with_env(env_at(utc(2025, 2, 1, 9, 0)))
            .given_state(state)
            .when_action(RegistrationAction::Register {
                customer: customer(),
                event_id,
                seats: positions(&["R2C1", "R2C2"]),
            })
            .then_state_unchanged()
            .then_output(|output| {
                assertions::assert_rejected_with(output, |error| {
                    matches!(error, TicketingError::InsufficientSeats { requested: 2, available: 1 })
                });
            })
            .run();
    }

    #[test]
    fn only_scheduled_events_are_bookable() {
        let mut state = TicketingState::new();
        let event_id = gala(&mut state, 10);

        ReducerTest::new(RegistrationReducer::new())
            .with_env(env_at(utc(2025, 3, 1, 15, 0)))
            .given_state(state)
            .when_action(RegistrationAction::Register {
                customer: customer(),
                event_id,
                seats: positions(&["R1C1"]),
            })
            .then_state_unchanged()
            .then_output(|output| {
                assertions::assert_rejected_with(output, |error| {
                    matches!(error, TicketingError::EventNotAvailable { status: EventStatus::Ongoing, .. })
                });
            })
            .run();
    }

    #[test]
    fn rebooking_replaces_the_pending_registration() {
        let mut state = TicketingState::new();
        let event_id = gala(&mut state, 2);
        let first_at = utc(2025, 2, 1, 9, 0);
        let existing = add_registration(
            &mut state,
            &customer(),
            &event_id,
            &[(1, 1), (1, 2)],
            RegistrationStatus::Pending,
            first_at,
        );
        let now = first_at + Duration::hours(3);

        // Both seats are the customer's own, so the event is not sold out to them
        ReducerTest::new(RegistrationReducer::new())
            .with_env(env_at(now))
            .given_state(state)
            .when_action(RegistrationAction::Register {
                customer: customer(),
                event_id: event_id.clone(),
                seats: positions(&["R1C2", "R2C2"]),
            })
            .then_state(move |state| {
                assert_eq!(state.registrations.len(), 1);
                let registration = state.registrations.get(&existing).unwrap();
                let labels: Vec<&str> = registration.seats.iter().map(|s| s.seat_id.as_str()).collect();
                assert_eq!(labels, ["R1C2", "R2C2"]);
                assert_eq!(registration.registered_at, now);
                assert_eq!(available_seats(state, &event_id), 0);
            })
            .then_output(|output| assertions::assert_accepted(output))
            .run();
    }

    #[test]
    fn paid_registrations_are_not_replaced() {
        let mut state = TicketingState::new();
        let event_id = gala(&mut state, 10);
        add_paid_registration(&mut state, &customer(), &event_id, &[(1, 1)], utc(2025, 2, 1, 8, 0));

        ReducerTest::new(RegistrationReducer::new())
            .with_env(env_at(utc(2025, 2, 1, 9, 0)))
            .given_state(state)
            .when_action(RegistrationAction::Register {
                customer: customer(),
                event_id,
                seats: positions(&["R1C2"]),
            })
            .then_state(|state| assert_eq!(state.registrations.len(), 2))
            .then_output(|output| {
                assert_eq!(output.as_ref().unwrap().id.as_str(), "REG002");
            })
            .run();
    }

    #[test]
    fn cancel_releases_seats() {
        let mut state = TicketingState::new();
        let event_id = gala(&mut state, 10);
        let registration_id = add_registration(
            &mut state,
            &customer(),
            &event_id,
            &[(4, 4)],
            RegistrationStatus::Pending,
            utc(2025, 2, 1, 8, 0),
        );

        ReducerTest::new(RegistrationReducer::new())
            .with_env(env_at(utc(2025, 2, 1, 9, 0)))
            .given_state(state)
            .when_action(RegistrationAction::Cancel {
                customer: customer(),
                registration_id,
            })
            .then_state(move |state| assert_eq!(available_seats(state, &event_id), 10))
            .then_output(|output| {
                let registration = output.as_ref().unwrap();
                assert_eq!(registration.status, RegistrationStatus::Cancelled);
                assert_eq!(registration.seats[0].status, SeatStatus::Available);
            })
            .run();
    }

    #[test]
    fn cannot_cancel_someone_elses_registration() {
        let mut state = TicketingState::new();
        let event_id = gala(&mut state, 10);
        let registration_id = add_registration(
            &mut state,
            &bob(),
            &event_id,
            &[(4, 4)],
            RegistrationStatus::Pending,
            utc(2025, 2, 1, 8, 0),
        );

        ReducerTest::new(RegistrationReducer::new())
            .with_env(env_at(utc(2025, 2, 1, 9, 0)))
            .given_state(state)
            .when_action(RegistrationAction::Cancel {
                customer: customer(),
                registration_id,
            })
            .then_state_unchanged()
            .then_output(|output| {
                assertions::assert_rejected_with(output, |error| {
                    matches!(error, TicketingError::RegistrationNotFound(_))
                });
            })
            .run();
    }
}
