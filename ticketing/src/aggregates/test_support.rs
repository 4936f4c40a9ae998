//! Builders shared by the reducer unit tests.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use boxoffice_store::SequentialId;
use boxoffice_testing::FixedClock;
use chrono::{DateTime, Utc};

use super::TicketingEnvironment;
use crate::config::PolicyConfig;
use crate::payment_gateway::MockPaymentGateway;
use crate::state::TicketingState;
use crate::types::{
    Event, EventId, EventStatus, Money, Payment, PaymentId, PaymentMethod, PaymentStatus,
    Performance, PerformanceId, Registration, RegistrationId, RegistrationStatus, Seat,
    SeatPosition, Song, SongId, UserId,
};

pub const ORGANIZER: &str = "organizer-1";
pub const CUSTOMER: &str = "alice";

/// Ticket price used by [`add_event`]
pub const PRICE: Money = Money::from_cents(2_500);

pub fn organizer() -> UserId {
    UserId::new(ORGANIZER)
}

pub fn customer() -> UserId {
    UserId::new(CUSTOMER)
}

pub fn bob() -> UserId {
    UserId::new("bob")
}

pub fn env_at(now: DateTime<Utc>) -> TicketingEnvironment {
    TicketingEnvironment::new(
        Arc::new(FixedClock::new(now)),
        PolicyConfig::default(),
        MockPaymentGateway::shared(),
    )
}

pub fn declining_env_at(now: DateTime<Utc>, reason: &str) -> TicketingEnvironment {
    TicketingEnvironment::new(
        Arc::new(FixedClock::new(now)),
        PolicyConfig::default(),
        Arc::new(MockPaymentGateway::declining(reason)),
    )
}

pub fn add_event(
    state: &mut TicketingState,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    total_seats: u32,
) -> EventId {
    let id = state.events.allocate_id();
    state.events.insert(Event {
        id: id.clone(),
        name: "Spring Gala".to_string(),
        description: "An evening of music".to_string(),
        date: start.date_naive(),
        start_time: start,
        end_time: end,
        organizer_id: organizer(),
        ticket_price: PRICE,
        total_seats,
        available_seats: total_seats,
        status: EventStatus::Scheduled,
        deleted: false,
    });
    id
}

pub fn add_registration(
    state: &mut TicketingState,
    customer: &UserId,
    event_id: &EventId,
    seats: &[(u8, u8)],
    status: RegistrationStatus,
    registered_at: DateTime<Utc>,
) -> RegistrationId {
    let id = state.registrations.allocate_id();
    let seats = seats
        .iter()
        .map(|&(row, column)| Seat::reserved(SeatPosition::new(row, column).unwrap(), id.clone()))
        .collect();
    state.registrations.insert(Registration {
        id: id.clone(),
        customer_id: customer.clone(),
        event_id: event_id.clone(),
        seats,
        registered_at,
        status,
        deleted: false,
    });
    id
}

/// A paid registration: COMPLETED registration, COMPLETED payment, counter
/// decremented.
pub fn add_paid_registration(
    state: &mut TicketingState,
    customer: &UserId,
    event_id: &EventId,
    seats: &[(u8, u8)],
    paid_at: DateTime<Utc>,
) -> (RegistrationId, PaymentId) {
    let registration_id = add_registration(
        state,
        customer,
        event_id,
        seats,
        RegistrationStatus::Completed,
        paid_at,
    );
    let seat_count = u32::try_from(seats.len()).unwrap();
    let payment_id = state.payments.allocate_id();
    state.payments.insert(Payment {
        id: payment_id.clone(),
        registration_id: registration_id.clone(),
        amount: PRICE.checked_multiply(u64::from(seat_count)).unwrap(),
        paid_at,
        method: PaymentMethod::CardPayment,
        status: PaymentStatus::Completed,
        deleted: false,
    });
    let event = state.events.get_mut(event_id).unwrap();
    event.available_seats = event.available_seats.saturating_sub(seat_count);
    (registration_id, payment_id)
}

pub fn add_performance(
    state: &mut TicketingState,
    event_id: &EventId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    titles: &[&str],
) -> PerformanceId {
    let id = state.performances.allocate_id();
    let songs = titles
        .iter()
        .map(|title| Song {
            id: SongId::from_sequence(state.performances.allocate_counter("songs")),
            title: (*title).to_string(),
        })
        .collect();
    state.performances.insert(Performance {
        id: id.clone(),
        event_id: event_id.clone(),
        performer: "The Testers".to_string(),
        songs,
        start_time: start,
        end_time: end,
        deleted: false,
    });
    id
}
