//! Errors reported by the ticketing engine.
//!
//! Every rejection names the rule that blocked it. Rejections happen before
//! any record is changed, so a failed operation leaves the store untouched.

use crate::aggregates::performance::ScheduleCheck;
use crate::types::{
    EventId, EventStatus, PaymentId, PaymentStatus, PerformanceId, RegistrationId,
    RegistrationStatus, SeatId, SongId,
};
use boxoffice_store::StoreError;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur in ticketing operations
#[derive(Error, Debug)]
pub enum TicketingError {
    /// Malformed or missing input (bad date, empty name, short reason, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Row or column outside 1-10
    #[error("Seat row {row}, column {column} is outside the 10x10 grid")]
    SeatOutOfRange {
        /// Requested row
        row: u8,
        /// Requested column
        column: u8,
    },

    /// Event does not exist (or was deleted)
    #[error("Event {0} not found")]
    EventNotFound(EventId),

    /// Registration does not exist, was deleted, or belongs to someone else
    #[error("Registration {0} not found")]
    RegistrationNotFound(RegistrationId),

    /// Payment does not exist, was deleted, or belongs to someone else
    #[error("Payment {0} not found")]
    PaymentNotFound(PaymentId),

    /// Performance does not exist or was deleted
    #[error("Performance {0} not found")]
    PerformanceNotFound(PerformanceId),

    /// Song is not on any live performance of the event
    #[error("Song {0} not found")]
    SongNotFound(SongId),

    /// Only the organizer of an event may manage it
    #[error("Event {0} is managed by another organizer")]
    NotEventOrganizer(EventId),

    /// Event still has live bookings
    #[error("Event {event_id} still has {active} live registrations; cancel it first")]
    EventHasRegistrations {
        /// Event
        event_id: EventId,
        /// Pending or paid registrations
        active: usize,
    },

    /// Action requires a different event status
    #[error("Event {event_id} is {status}")]
    EventNotAvailable {
        /// Event
        event_id: EventId,
        /// Status at the time of the request
        status: EventStatus,
    },

    /// More tickets requested than remain
    #[error("Requested {requested} seats but only {available} are available")]
    InsufficientSeats {
        /// Seats asked for
        requested: u32,
        /// Seats left
        available: u32,
    },

    /// Seat already held by another registration
    #[error("Seat {0} is already occupied")]
    SeatOccupied(SeatId),

    /// Seat picked twice in the same selection
    #[error("Seat {0} was already selected in this booking")]
    SeatAlreadySelected(SeatId),

    /// Registration is in the wrong state for the action
    #[error("Registration {registration_id} is {status:?}")]
    InvalidRegistrationStatus {
        /// Registration
        registration_id: RegistrationId,
        /// Current status
        status: RegistrationStatus,
    },

    /// Payment is in the wrong state for the action
    #[error("Payment {payment_id} is {status:?}")]
    InvalidPaymentStatus {
        /// Payment
        payment_id: PaymentId,
        /// Current status
        status: PaymentStatus,
    },

    /// Registration already has a completed payment
    #[error("Registration {0} is already paid")]
    AlreadyPaid(RegistrationId),

    /// Refunds close shortly before the event starts
    #[error("Refund window closed at {deadline}")]
    RefundWindowClosed {
        /// Last instant a refund could have been requested (exclusive)
        deadline: DateTime<Utc>,
    },

    /// Organizers cannot cancel an event this close to its date
    #[error("Event {event_id} can no longer be cancelled (deadline {deadline})")]
    CancellationWindowClosed {
        /// Event
        event_id: EventId,
        /// Last instant a cancellation could have been made (exclusive)
        deadline: DateTime<Utc>,
    },

    /// Performance slot clashes with another performance
    #[error("Performance slot rejected: {0}")]
    ScheduleConflict(ScheduleCheck),

    /// Performance slot falls outside the event window
    #[error("Performance must run between {start} and {end}")]
    OutsideEventWindow {
        /// Event start
        start: DateTime<Utc>,
        /// Event end
        end: DateTime<Utc>,
    },

    /// Every seat of the registration has already voted
    #[error("Registration {registration_id} has used all {seats} votes")]
    VoteLimitReached {
        /// Registration
        registration_id: RegistrationId,
        /// Seats (and therefore votes) it holds
        seats: u32,
    },

    /// Attendance can no longer be taken
    #[error("Event {0} has ended; attendance can no longer be taken")]
    AttendanceClosed(EventId),

    /// Arithmetic overflow computing an amount
    #[error("Amount overflow")]
    AmountOverflow,

    /// Persistence failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl TicketingError {
    /// Returns `true` for rejections caused by the request itself rather than
    /// by storage.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}
