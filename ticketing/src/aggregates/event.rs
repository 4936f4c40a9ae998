//! Event aggregate.
//!
//! Organizers create events at least a week ahead, may edit them until they
//! start, may cancel them until a week before the event date, and may delete
//! them once nobody holds a booking. Cancelling voids every registration and
//! refunds every settled payment in full.

use boxoffice_core::reducer::Reducer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::inventory::available_seats;
use super::payment::settle_refund;
use super::status::current_status;
use super::{find_event, managed_event, TicketingEnvironment};
use crate::error::TicketingError;
use crate::state::TicketingState;
use crate::time::{parse_date, parse_time_on, start_of_day, TimeWindow};
use crate::types::{
    Event, EventId, EventStatus, Money, Refund, RegistrationId, UserId,
};

/// Reason recorded on refunds issued by a cancellation
pub const CANCELLATION_REASON: &str = "Event cancelled";

/// Largest number of seats an event can sell (the whole 10x10 grid)
pub const MAX_SEATS: u32 = 100;

/// Seats an event gets when the organizer does not say
pub const DEFAULT_SEATS: u32 = MAX_SEATS;

/// What an organizer fills in to create an event.
///
/// Dates and times are taken as typed (`YYYY-MM-DD`, `HH:MM`) and
/// validated when the event is created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    /// Display name
    pub name: String,
    /// Free-text description
    pub description: String,
    /// Event date, `YYYY-MM-DD`
    pub date: String,
    /// Start time on the event date, `HH:MM`
    pub start_time: String,
    /// End time on the event date, `HH:MM`
    pub end_time: String,
    /// Price per seat
    pub ticket_price: Money,
    /// Seats on sale (1-100)
    pub total_seats: u32,
}

/// Actions for the Event aggregate
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventAction {
    /// Create a new event
    Create {
        /// Organizer creating it
        organizer: UserId,
        /// What to create
        draft: EventDraft,
    },
    /// Replace an event's details. The draft is validated as for `Create`.
    Update {
        /// Organizer of the event
        organizer: UserId,
        /// Event
        event_id: EventId,
        /// New details
        draft: EventDraft,
    },
    /// Soft-delete an event with no live registrations
    Delete {
        /// Organizer of the event
        organizer: UserId,
        /// Event
        event_id: EventId,
    },
}

/// Reducer for the Event aggregate
#[derive(Clone, Copy, Debug, Default)]
pub struct EventReducer;

impl EventReducer {
    /// Creates a new `EventReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validate a draft at `now`, producing the event's window
    fn validate_draft(
        draft: &EventDraft,
        now: DateTime<Utc>,
        env: &TicketingEnvironment,
    ) -> Result<TimeWindow, TicketingError> {
        if draft.name.trim().is_empty() {
            return Err(TicketingError::InvalidInput("event name is required".to_string()));
        }
        if draft.description.trim().is_empty() {
            return Err(TicketingError::InvalidInput(
                "event description is required".to_string(),
            ));
        }

        let date = parse_date(&draft.date)?;
        let midnight = start_of_day(date);
        if midnight < now {
            return Err(TicketingError::InvalidInput(format!(
                "event date {date} is in the past"
            )));
        }
        if midnight < now + env.policy.min_lead() {
            return Err(TicketingError::InvalidInput(format!(
                "event date {date} must be at least {} days away",
                env.policy.min_lead_days
            )));
        }

        let window = TimeWindow::new(
            parse_time_on(date, &draft.start_time)?,
            parse_time_on(date, &draft.end_time)?,
        )?;

        if !(1..=MAX_SEATS).contains(&draft.total_seats) {
            return Err(TicketingError::InvalidInput(format!(
                "seats must be between 1 and {MAX_SEATS}"
            )));
        }
        Ok(window)
    }

    fn create(
        state: &mut TicketingState,
        organizer: UserId,
        draft: EventDraft,
        env: &TicketingEnvironment,
    ) -> Result<Event, TicketingError> {
        let window = Self::validate_draft(&draft, env.now(), env)?;
        let event = Event {
            id: state.events.allocate_id(),
            name: draft.name.trim().to_string(),
            description: draft.description.trim().to_string(),
            date: window.start.date_naive(),
            start_time: window.start,
            end_time: window.end,
            organizer_id: organizer,
            ticket_price: draft.ticket_price,
            total_seats: draft.total_seats,
            available_seats: draft.total_seats,
            status: EventStatus::Scheduled,
            deleted: false,
        };
        tracing::info!(
            event_id = %event.id,
            organizer = %event.organizer_id,
            seats = event.total_seats,
            "Event created"
        );
        state.events.insert(event.clone());
        Ok(event)
    }

    /// Check an edit against the event's bookings and lineup
    fn validate_update(
        state: &TicketingState,
        organizer: &UserId,
        event_id: &EventId,
        draft: &EventDraft,
        env: &TicketingEnvironment,
    ) -> Result<TimeWindow, TicketingError> {
        let now = env.now();
        let event = managed_event(state, organizer, event_id)?;
        let status = current_status(event, now);
        if status != EventStatus::Scheduled {
            return Err(TicketingError::EventNotAvailable {
                event_id: event_id.clone(),
                status,
            });
        }

        let window = Self::validate_draft(draft, now, env)?;

        let held = event.total_seats.saturating_sub(available_seats(state, event_id));
        if draft.total_seats < held {
            return Err(TicketingError::InvalidInput(format!(
                "{held} seats are already booked; cannot reduce to {}",
                draft.total_seats
            )));
        }

        let stranded = state
            .performances
            .iter()
            .filter(|performance| &performance.event_id == event_id)
            .any(|performance| {
                performance.start_time < window.start || performance.end_time > window.end
            });
        if stranded {
            return Err(TicketingError::OutsideEventWindow {
                start: window.start,
                end: window.end,
            });
        }
        Ok(window)
    }

    fn update(
        state: &mut TicketingState,
        organizer: &UserId,
        event_id: &EventId,
        draft: EventDraft,
        env: &TicketingEnvironment,
    ) -> Result<Event, TicketingError> {
        let window = Self::validate_update(state, organizer, event_id, &draft, env)?;
        let event = state
            .events
            .get_mut(event_id)
            .ok_or_else(|| TicketingError::EventNotFound(event_id.clone()))?;

        let paid = event.total_seats.saturating_sub(event.available_seats);
        event.name = draft.name.trim().to_string();
        event.description = draft.description.trim().to_string();
        event.date = window.start.date_naive();
        event.start_time = window.start;
        event.end_time = window.end;
        event.ticket_price = draft.ticket_price;
        event.total_seats = draft.total_seats;
        event.available_seats = draft.total_seats.saturating_sub(paid);
        event.status = current_status(event, env.now());

        tracing::info!(
            %event_id,
            starts = %event.start_time,
            seats = event.total_seats,
            "Event updated"
        );
        Ok(event.clone())
    }

    fn delete(
        state: &mut TicketingState,
        organizer: &UserId,
        event_id: &EventId,
    ) -> Result<Event, TicketingError> {
        managed_event(state, organizer, event_id)?;
        let active = state
            .registrations_for_event(event_id)
            .filter(|registration| registration.is_active())
            .count();
        if active > 0 {
            return Err(TicketingError::EventHasRegistrations {
                event_id: event_id.clone(),
                active,
            });
        }

        let event = state
            .events
            .get_mut(event_id)
            .ok_or_else(|| TicketingError::EventNotFound(event_id.clone()))?;
        event.deleted = true;
        tracing::info!(%event_id, "Event deleted");
        Ok(event.clone())
    }
}

impl Reducer for EventReducer {
    type State = TicketingState;
    type Action = EventAction;
    type Environment = TicketingEnvironment;
    type Output = Result<Event, TicketingError>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Self::Output {
        match action {
            EventAction::Create { organizer, draft } => Self::create(state, organizer, draft, env),
            EventAction::Update {
                organizer,
                event_id,
                draft,
            } => Self::update(state, &organizer, &event_id, draft, env),
            EventAction::Delete {
                organizer,
                event_id,
            } => Self::delete(state, &organizer, &event_id),
        }
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// Actions for cancelling an event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CancellationAction {
    /// Call off an event
    Cancel {
        /// Organizer of the event
        organizer: UserId,
        /// Event
        event_id: EventId,
    },
}

/// What a cancellation did
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CancellationReport {
    /// The event, now CANCELLED
    pub event: Event,
    /// Registrations voided (paid or not)
    pub cancelled_registrations: Vec<RegistrationId>,
    /// Full refunds issued for settled payments
    pub refunds: Vec<Refund>,
}

/// Reducer for event cancellation
#[derive(Clone, Copy, Debug, Default)]
pub struct CancellationReducer;

impl CancellationReducer {
    /// Creates a new `CancellationReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Last instant (exclusive) the event can be cancelled
    #[must_use]
    pub fn cancellation_deadline(event: &Event, env: &TicketingEnvironment) -> DateTime<Utc> {
        start_of_day(event.date) - env.policy.min_lead()
    }

    fn validate_cancel(
        state: &TicketingState,
        organizer: &UserId,
        event_id: &EventId,
        env: &TicketingEnvironment,
    ) -> Result<(), TicketingError> {
        let event = managed_event(state, organizer, event_id)?;
        if event.is_cancelled() {
            return Err(TicketingError::EventNotAvailable {
                event_id: event_id.clone(),
                status: event.status,
            });
        }
        let deadline = Self::cancellation_deadline(event, env);
        if env.now() > deadline {
            return Err(TicketingError::CancellationWindowClosed {
                event_id: event_id.clone(),
                deadline,
            });
        }
        Ok(())
    }

    fn cancel(
        state: &mut TicketingState,
        organizer: &UserId,
        event_id: &EventId,
        env: &TicketingEnvironment,
    ) -> Result<CancellationReport, TicketingError> {
        Self::validate_cancel(state, organizer, event_id, env)?;
        let now = env.now();

        let holders: Vec<RegistrationId> = state
            .registrations_for_event(event_id)
            .filter(|registration| registration.is_active())
            .map(|registration| registration.id.clone())
            .collect();

        let mut refunds = Vec::new();
        for registration_id in &holders {
            let settled = state
                .completed_payment(registration_id)
                .map(|payment| (payment.id.clone(), payment.amount));

            if let Some((payment_id, amount)) = settled {
                if let Some(refund) =
                    settle_refund(state, &payment_id, amount, CANCELLATION_REASON, now)
                {
                    refunds.push(refund);
                }
            }
            if let Some(registration) = state.registrations.get_mut(registration_id) {
                registration.cancel();
            }
        }

        let event = state
            .events
            .get_mut(event_id)
            .ok_or_else(|| TicketingError::EventNotFound(event_id.clone()))?;
        event.status = EventStatus::Cancelled;
        event.available_seats = event.total_seats;
        let event = event.clone();

        tracing::info!(
            %event_id,
            registrations = holders.len(),
            refunds = refunds.len(),
            "Event cancelled"
        );
        Ok(CancellationReport {
            event,
            cancelled_registrations: holders,
            refunds,
        })
    }
}

impl Reducer for CancellationReducer {
    type State = TicketingState;
    type Action = CancellationAction;
    type Environment = TicketingEnvironment;
    type Output = Result<CancellationReport, TicketingError>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Self::Output {
        match action {
            CancellationAction::Cancel {
                organizer,
                event_id,
            } => Self::cancel(state, &organizer, &event_id, env),
        }
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Events open for booking at `now`, soonest first
#[must_use]
pub fn list_bookable_events(state: &TicketingState, now: DateTime<Utc>) -> Vec<Event> {
    let mut events: Vec<Event> = state
        .events
        .iter()
        .filter(|event| current_status(event, now) == EventStatus::Scheduled)
        .map(|event| Event {
            status: EventStatus::Scheduled,
            ..event.clone()
        })
        .collect();
    events.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
    events
}

/// An event with its current figures
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventOverview {
    /// The event, with its status derived at query time
    pub event: Event,
    /// Seats not held by any live registration
    pub available_seats: u32,
    /// Live registrations (pending or paid)
    pub active_registrations: usize,
    /// Paid registrations
    pub paid_registrations: usize,
    /// Sum of settled payments
    pub revenue: Money,
    /// Live performances on the lineup
    pub performances: usize,
}

/// Current figures of one event.
///
/// # Errors
///
/// Returns [`TicketingError::EventNotFound`] if the event is missing or
/// deleted.
pub fn event_overview(
    state: &TicketingState,
    event_id: &EventId,
    now: DateTime<Utc>,
) -> Result<EventOverview, TicketingError> {
    let event = find_event(state, event_id)?;
    let active: Vec<&RegistrationId> = state
        .registrations_for_event(event_id)
        .filter(|registration| registration.is_active())
        .map(|registration| &registration.id)
        .collect();
    let settled: Vec<Money> = active
        .iter()
        .filter_map(|registration_id| state.completed_payment(registration_id))
        .map(|payment| payment.amount)
        .collect();

    Ok(EventOverview {
        event: Event {
            status: current_status(event, now),
            ..event.clone()
        },
        available_seats: available_seats(state, event_id),
        active_registrations: active.len(),
        paid_registrations: settled.len(),
        revenue: settled.into_iter().fold(Money::ZERO, |total, amount| total.saturating_add(amount)),
        performances: state
            .performances
            .iter()
            .filter(|performance| &performance.event_id == event_id)
            .count(),
    })
}
