//! Property tests for the time-driven rules and seat inventory

#![allow(clippy::unwrap_used)] // Tests can unwrap

use std::sync::Arc;

use boxoffice::aggregates::attendance::determine_attendance;
use boxoffice::aggregates::event::EventDraft;
use boxoffice::aggregates::inventory::{available_seats, occupied_seats};
use boxoffice::aggregates::performance::overlaps;
use boxoffice::aggregates::status::derive_status;
use boxoffice::aggregates::{
    CheckoutAction, CheckoutReducer, EventAction, EventReducer, RefundAction, RefundReducer,
    RegistrationAction, RegistrationReducer, StatusAction, StatusReducer, TicketingEnvironment,
};
use boxoffice::payment_gateway::MockPaymentGateway;
use boxoffice::types::{
    AttendanceStatus, EventId, EventStatus, Money, PaymentId, PaymentMethod, SeatPosition, UserId,
};
use boxoffice::{EarlyCheckIn, PolicyConfig, TicketingError, TicketingState};
use boxoffice_core::reducer::Reducer;
use boxoffice_testing::helpers::utc;
use boxoffice_testing::properties::{instant, interval, offset_minutes};
use boxoffice_testing::FixedClock;
use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;

const TOTAL_SEATS: u32 = 12;

fn env_at(now: DateTime<Utc>) -> TicketingEnvironment {
    TicketingEnvironment::new(
        Arc::new(FixedClock::new(now)),
        PolicyConfig::default(),
        MockPaymentGateway::shared(),
    )
}

fn sale_opens() -> DateTime<Utc> {
    utc(2025, 1, 1, 0, 0)
}

/// A state holding one event on 2025-02-01, 19:00-22:00
fn state_with_event() -> (TicketingState, EventId) {
    let mut state = TicketingState::new();
    let event = EventReducer
        .reduce(
            &mut state,
            EventAction::Create {
                organizer: UserId::new("organizer"),
                draft: EventDraft {
                    name: "Night Market Sessions".to_string(),
                    description: "Street food and live sets".to_string(),
                    date: "2025-02-01".to_string(),
                    start_time: "19:00".to_string(),
                    end_time: "22:00".to_string(),
                    ticket_price: Money::from_cents(1_000),
                    total_seats: TOTAL_SEATS,
                },
            },
            &env_at(sale_opens()),
        )
        .unwrap();
    (state, event.id)
}

fn customer(index: usize) -> UserId {
    UserId::new(["alice", "bob", "carol"][index % 3])
}

#[derive(Clone, Debug)]
enum Op {
    Book { customer: usize, seats: Vec<(u8, u8)> },
    Withdraw { customer: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..3usize, prop::collection::vec((1..=4u8, 1..=4u8), 1..5))
            .prop_map(|(customer, seats)| Op::Book { customer, seats }),
        1 => (0..3usize).prop_map(|customer| Op::Withdraw { customer }),
    ]
}

fn apply(state: &mut TicketingState, event_id: &EventId, op: &Op) -> Result<(), TicketingError> {
    let env = env_at(sale_opens());
    match op {
        Op::Book { customer: index, seats } => {
            let seats = seats
                .iter()
                .map(|&(row, column)| SeatPosition::new(row, column).unwrap())
                .collect();
            RegistrationReducer
                .reduce(
                    state,
                    RegistrationAction::Register {
                        customer: customer(*index),
                        event_id: event_id.clone(),
                        seats,
                    },
                    &env,
                )
                .map(|_| ())
        }
        Op::Withdraw { customer: index } => {
            let Some(registration_id) =
                RegistrationReducer::pending_for(state, &customer(*index), event_id)
                    .map(|registration| registration.id.clone())
            else {
                return Ok(());
            };
            RegistrationReducer
                .reduce(
                    state,
                    RegistrationAction::Cancel {
                        customer: customer(*index),
                        registration_id,
                    },
                    &env,
                )
                .map(|_| ())
        }
    }
}

proptest! {
    #[test]
    fn cancelled_is_absorbing(now in instant(), (start, end) in interval(600)) {
        prop_assert_eq!(derive_status(now, start, end, EventStatus::Cancelled), EventStatus::Cancelled);
    }

    #[test]
    fn status_depends_only_on_the_clock(
        now in instant(),
        (start, end) in interval(600),
        prior in prop_oneof![
            Just(EventStatus::Scheduled),
            Just(EventStatus::Ongoing),
            Just(EventStatus::Completed),
        ],
    ) {
        let expected = if now < start {
            EventStatus::Scheduled
        } else if now <= end {
            EventStatus::Ongoing
        } else {
            EventStatus::Completed
        };
        prop_assert_eq!(derive_status(now, start, end, prior), expected);
    }

    #[test]
    fn overlap_is_symmetric((a_start, a_end) in interval(240), (b_start, b_end) in interval(240)) {
        prop_assert_eq!(
            overlaps(a_start, a_end, b_start, b_end),
            overlaps(b_start, b_end, a_start, a_end)
        );
        prop_assert_eq!(
            overlaps(a_start, a_end, b_start, b_end),
            a_start < b_end && b_start < a_end
        );
    }

    #[test]
    fn back_to_back_slots_do_not_overlap((start, middle) in interval(240), length in 1..240i64) {
        let end = middle + Duration::minutes(length);
        prop_assert!(!overlaps(start, middle, middle, end));
        prop_assert!(!overlaps(middle, end, start, middle));
    }

    #[test]
    fn lenient_check_in_is_present_until_the_end(
        (start, end) in interval(600),
        offset in offset_minutes(1_200),
    ) {
        let now = start + Duration::minutes(offset);
        let expected = if now <= end { AttendanceStatus::Present } else { AttendanceStatus::Absent };
        prop_assert_eq!(determine_attendance(now, start, end, EarlyCheckIn::Accept), expected);
    }

    #[test]
    fn seats_are_conserved(ops in prop::collection::vec(op(), 1..20)) {
        let (mut state, event_id) = state_with_event();

        for op in &ops {
            let before = state.clone();
            if apply(&mut state, &event_id, op).is_err() {
                prop_assert_eq!(&before, &state);
            }

            let occupied = occupied_seats(&state, &event_id);
            let held: usize = state
                .registrations_for_event(&event_id)
                .filter(|registration| registration.is_active())
                .map(|registration| registration.seats.len())
                .sum();
            prop_assert_eq!(held, occupied.len());
            prop_assert_eq!(
                available_seats(&state, &event_id) + u32::try_from(occupied.len()).unwrap(),
                TOTAL_SEATS
            );
        }
    }

    #[test]
    fn refunds_close_two_hours_before_the_start(offset in offset_minutes(180)) {
        let (mut state, event_id) = state_with_event();
        let opening = env_at(sale_opens());
        let registration = RegistrationReducer
            .reduce(
                &mut state,
                RegistrationAction::Register {
                    customer: customer(0),
                    event_id,
                    seats: vec![SeatPosition::new(1, 1).unwrap()],
                },
                &opening,
            )
            .unwrap();
        let outcome = CheckoutReducer
            .reduce(
                &mut state,
                CheckoutAction::Checkout {
                    customer: customer(0),
                    registration_id: registration.id,
                    method: PaymentMethod::CardPayment,
                },
                &opening,
            )
            .unwrap();
        let payment_id: PaymentId = outcome.payment().id.clone();

        let deadline = utc(2025, 2, 1, 17, 0);
        let now = deadline + Duration::minutes(offset);
        let result = RefundReducer.reduce(
            &mut state,
            RefundAction::Request {
                customer: customer(0),
                payment_id,
                reason: "Cannot attend any more".to_string(),
            },
            &env_at(now),
        );
        prop_assert_eq!(result.is_ok(), now < deadline);
    }

    #[test]
    fn a_second_status_pass_changes_nothing(offset in offset_minutes(60 * 24 * 40)) {
        let (mut state, event_id) = state_with_event();
        apply(&mut state, &event_id, &Op::Book { customer: 0, seats: vec![(2, 2)] }).unwrap();

        let env = env_at(sale_opens() + Duration::minutes(offset.abs()));
        StatusReducer.reduce(&mut state, StatusAction::Refresh, &env);
        let settled = state.clone();
        let report = StatusReducer.reduce(&mut state, StatusAction::Refresh, &env);

        prop_assert!(report.is_quiet());
        prop_assert_eq!(settled, state);
    }
}
