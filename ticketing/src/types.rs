//! Domain types for the Box Office ticketing engine.
//!
//! This module contains the identifiers, value objects and persisted records
//! of the system. Records are plain data; the rules that keep them consistent
//! with each other live in [`crate::aggregates`].

use boxoffice_store::{Record, SequentialId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TicketingError;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! sequential_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal, $width:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Prefix shared by every identifier of this kind
            pub const PREFIX: &'static str = $prefix;

            /// Wrap an existing identifier string
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the identifier as a string slice
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl SequentialId for $name {
            fn from_sequence(sequence: u64) -> Self {
                Self(format!("{}{:0width$}", $prefix, sequence, width = $width))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

sequential_id!(
    /// Identifier of an event (`EV001`)
    EventId, "EV", 3
);
sequential_id!(
    /// Identifier of a registration (`REG001`)
    RegistrationId, "REG", 3
);
sequential_id!(
    /// Identifier of a payment (`PAY001`)
    PaymentId, "PAY", 3
);
sequential_id!(
    /// Identifier of a refund (`REF001`)
    RefundId, "REF", 3
);
sequential_id!(
    /// Identifier of an attendance record (`ATD001`)
    AttendanceId, "ATD", 3
);
sequential_id!(
    /// Identifier of a performance (`PERF001`)
    PerformanceId, "PERF", 3
);
sequential_id!(
    /// Identifier of a song (`SONG0001`)
    SongId, "SONG", 4
);
sequential_id!(
    /// Identifier of a vote (`VOTE001`)
    VoteId, "VOTE", 3
);

/// Opaque identity of a customer or organizer, supplied by the caller
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a user identity
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the identity as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// Represents money in cents to avoid floating-point arithmetic errors
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from whole units with overflow checking
    #[must_use]
    pub const fn checked_from_dollars(dollars: u64) -> Option<Self> {
        match dollars.checked_mul(100) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Returns the whole-unit part
    #[must_use]
    pub const fn dollars(&self) -> u64 {
        self.0 / 100
    }

    /// Multiplies by a quantity, returning `None` on overflow
    #[must_use]
    pub const fn checked_multiply(&self, quantity: u64) -> Option<Self> {
        match self.0.checked_mul(quantity) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }

    /// Adds two amounts, saturating at the maximum
    #[must_use]
    pub const fn saturating_add(&self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Keeps `percent` of the amount, rounding down to the cent
    ///
    /// # Examples
    ///
    /// ```
    /// use boxoffice::types::Money;
    ///
    /// assert_eq!(Money::from_cents(10_000).percent(80), Money::from_cents(8_000));
    /// assert_eq!(Money::from_cents(1_999).percent(80), Money::from_cents(1_599));
    /// ```
    #[must_use]
    pub fn percent(&self, percent: u8) -> Self {
        let kept = u128::from(self.0) * u128::from(percent) / 100;
        Self(u64::try_from(kept).unwrap_or(u64::MAX))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.dollars(), self.0 % 100)
    }
}

impl FromStr for Money {
    type Err = TicketingError;

    /// Parses `"12"`, `"12.5"` or `"12.50"` (an optional leading `$` is allowed).
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || TicketingError::InvalidInput(format!("invalid amount: {input:?}"));
        let trimmed = input.trim().trim_start_matches('$');
        let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if fraction.len() > 2 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole: u64 = whole.parse().map_err(|_| invalid())?;
        let cents: u64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<u64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };

        Self::checked_from_dollars(whole)
            .and_then(|m| m.0.checked_add(cents))
            .map(Self)
            .ok_or_else(invalid)
    }
}

// ============================================================================
// Statuses
// ============================================================================

/// Lifecycle of an event, derived from the current time unless cancelled
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    /// Not started yet; the only bookable status
    Scheduled,
    /// Between start and end (inclusive)
    Ongoing,
    /// Past its end time
    Completed,
    /// Called off by the organizer; never changes again
    Cancelled,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Scheduled => "SCHEDULED",
            Self::Ongoing => "ONGOING",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        })
    }
}

/// Lifecycle of a registration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStatus {
    /// Seats held, awaiting payment
    Pending,
    /// Paid
    Completed,
    /// Refunded, expired, withdrawn or voided by an event cancellation
    Cancelled,
}

/// Occupancy of a single seat inside a registration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    /// Free to be picked
    Available,
    /// Held by the owning registration
    Reserved,
}

/// How a payment was made
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Bank transfer
    OnlineBanking,
    /// Wallet app
    EWallet,
    /// Debit or credit card
    CardPayment,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OnlineBanking => "Online Banking",
            Self::EWallet => "E-Wallet",
            Self::CardPayment => "Card Payment",
        })
    }
}

/// Lifecycle of a payment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Created, not settled
    Pending,
    /// Settled; eligible for a refund
    Completed,
    /// Declined by the gateway (terminal)
    Failed,
    /// Money returned (terminal)
    Refunded,
}

/// Outcome of an attendance check
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    /// Checked in
    Present,
    /// Did not show up
    Absent,
}

// ============================================================================
// Seats
// ============================================================================

/// Rows and columns both run from 1 to this value.
pub const GRID_SIZE: u8 = 10;

/// A seat label such as `R3C7`
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeatId(String);

impl SeatId {
    /// Label for a validated position
    #[must_use]
    pub fn at(position: SeatPosition) -> Self {
        Self(format!("R{}C{}", position.row, position.column))
    }

    /// Get the label as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated row/column pair on the 10×10 grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeatPosition {
    row: u8,
    column: u8,
}

impl SeatPosition {
    /// Validate a row/column pair
    ///
    /// # Errors
    ///
    /// Returns [`TicketingError::SeatOutOfRange`] unless both are in `1..=10`.
    pub fn new(row: u8, column: u8) -> Result<Self, TicketingError> {
        if (1..=GRID_SIZE).contains(&row) && (1..=GRID_SIZE).contains(&column) {
            Ok(Self { row, column })
        } else {
            Err(TicketingError::SeatOutOfRange { row, column })
        }
    }

    /// Row (1-based)
    #[must_use]
    pub const fn row(&self) -> u8 {
        self.row
    }

    /// Column (1-based)
    #[must_use]
    pub const fn column(&self) -> u8 {
        self.column
    }

    /// The seat label for this position
    #[must_use]
    pub fn seat_id(&self) -> SeatId {
        SeatId::at(*self)
    }
}

impl FromStr for SeatPosition {
    type Err = TicketingError;

    /// Parses `R{row}C{column}`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || TicketingError::InvalidInput(format!("invalid seat label: {input:?}"));
        let rest = input.strip_prefix('R').ok_or_else(invalid)?;
        let (row, column) = rest.split_once('C').ok_or_else(invalid)?;
        let row = row.parse().map_err(|_| invalid())?;
        let column = column.parse().map_err(|_| invalid())?;
        Self::new(row, column)
    }
}

/// A seat held inside a registration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    /// Label, `R{row}C{column}`
    pub seat_id: SeatId,
    /// Row (1-10)
    pub row: u8,
    /// Column (1-10)
    pub column: u8,
    /// Registration holding the seat, cleared on release
    pub registration_id: Option<RegistrationId>,
    /// Occupancy
    pub status: SeatStatus,
}

impl Seat {
    /// A seat reserved for `registration_id`
    #[must_use]
    pub fn reserved(position: SeatPosition, registration_id: RegistrationId) -> Self {
        Self {
            seat_id: position.seat_id(),
            row: position.row(),
            column: position.column(),
            registration_id: Some(registration_id),
            status: SeatStatus::Reserved,
        }
    }

    /// Return the seat to the pool
    pub fn release(&mut self) {
        self.status = SeatStatus::Available;
        self.registration_id = None;
    }
}

// ============================================================================
// Records
// ============================================================================

/// A scheduled ticketed occasion
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event ID
    pub id: EventId,
    /// Display name
    pub name: String,
    /// Free-text description
    pub description: String,
    /// Calendar day of the event
    pub date: NaiveDate,
    /// Doors open
    pub start_time: DateTime<Utc>,
    /// Event ends
    pub end_time: DateTime<Utc>,
    /// Organizer who created the event
    pub organizer_id: UserId,
    /// Price per seat
    pub ticket_price: Money,
    /// Seats on sale (at most 100)
    pub total_seats: u32,
    /// Seats not yet paid for
    pub available_seats: u32,
    /// Last derived status
    pub status: EventStatus,
    /// Soft-delete flag
    #[serde(default)]
    pub deleted: bool,
}

impl Event {
    /// Check whether the event is cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.status == EventStatus::Cancelled
    }
}

impl Record for Event {
    type Id = EventId;
    const COLLECTION: &'static str = "events";

    fn id(&self) -> &EventId {
        &self.id
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }
}

/// A customer's claim on seats for one event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Registration ID
    pub id: RegistrationId,
    /// Customer holding the seats
    pub customer_id: UserId,
    /// Event the seats belong to
    pub event_id: EventId,
    /// Seats in the order they were picked
    pub seats: Vec<Seat>,
    /// When the seats were claimed
    pub registered_at: DateTime<Utc>,
    /// Current status
    pub status: RegistrationStatus,
    /// Soft-delete flag
    #[serde(default)]
    pub deleted: bool,
}

impl Registration {
    /// Number of seats held
    #[must_use]
    pub fn seat_count(&self) -> u32 {
        u32::try_from(self.seats.len()).unwrap_or(u32::MAX)
    }

    /// Check whether the registration still holds its seats
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status != RegistrationStatus::Cancelled
    }

    /// Cancel and release every seat
    pub fn cancel(&mut self) {
        self.status = RegistrationStatus::Cancelled;
        for seat in &mut self.seats {
            seat.release();
        }
    }
}

impl Record for Registration {
    type Id = RegistrationId;
    const COLLECTION: &'static str = "registrations";

    fn id(&self) -> &RegistrationId {
        &self.id
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }
}

/// Money received for a registration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment ID
    pub id: PaymentId,
    /// Registration paid for
    pub registration_id: RegistrationId,
    /// `ticket_price × seats` at payment time
    pub amount: Money,
    /// When the payment was attempted
    pub paid_at: DateTime<Utc>,
    /// How the customer paid
    pub method: PaymentMethod,
    /// Current status
    pub status: PaymentStatus,
    /// Soft-delete flag
    #[serde(default)]
    pub deleted: bool,
}

impl Record for Payment {
    type Id = PaymentId;
    const COLLECTION: &'static str = "payments";

    fn id(&self) -> &PaymentId {
        &self.id
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }
}

/// Money returned for a payment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    /// Refund ID
    pub id: RefundId,
    /// Payment being refunded
    pub payment_id: PaymentId,
    /// Amount returned
    pub amount: Money,
    /// When the refund was issued
    pub refunded_at: DateTime<Utc>,
    /// Why
    pub reason: String,
    /// Soft-delete flag
    #[serde(default)]
    pub deleted: bool,
}

impl Record for Refund {
    type Id = RefundId;
    const COLLECTION: &'static str = "refunds";

    fn id(&self) -> &RefundId {
        &self.id
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }
}

/// Whether a registration's holder showed up
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendance {
    /// Attendance ID
    pub id: AttendanceId,
    /// Registration checked
    pub registration_id: RegistrationId,
    /// Present or absent
    pub status: AttendanceStatus,
    /// When it was recorded
    pub recorded_at: DateTime<Utc>,
    /// Soft-delete flag
    #[serde(default)]
    pub deleted: bool,
}

impl Record for Attendance {
    type Id = AttendanceId;
    const COLLECTION: &'static str = "attendances";

    fn id(&self) -> &AttendanceId {
        &self.id
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }
}

/// A song on a performance's set list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    /// Song ID
    pub id: SongId,
    /// Title
    pub title: String,
}

/// An artist slot within an event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Performance {
    /// Performance ID
    pub id: PerformanceId,
    /// Event hosting the performance
    pub event_id: EventId,
    /// Performer name (2-50 characters)
    pub performer: String,
    /// Set list in order
    pub songs: Vec<Song>,
    /// Slot start (inclusive)
    pub start_time: DateTime<Utc>,
    /// Slot end (exclusive)
    pub end_time: DateTime<Utc>,
    /// Soft-delete flag
    #[serde(default)]
    pub deleted: bool,
}

impl Performance {
    /// Find a song on the set list
    #[must_use]
    pub fn song(&self, song_id: &SongId) -> Option<&Song> {
        self.songs.iter().find(|song| &song.id == song_id)
    }
}

impl Record for Performance {
    type Id = PerformanceId;
    const COLLECTION: &'static str = "performances";

    fn id(&self) -> &PerformanceId {
        &self.id
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }
}

/// One seat's vote for a song
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// Vote ID
    pub id: VoteId,
    /// Song voted for
    pub song_id: SongId,
    /// Registration whose seat the vote uses
    pub registration_id: RegistrationId,
    /// Always 1 for votes cast by customers
    pub weight: u32,
    /// When the vote was cast
    pub cast_at: DateTime<Utc>,
    /// Soft-delete flag
    #[serde(default)]
    pub deleted: bool,
}

impl Record for Vote {
    type Id = VoteId;
    const COLLECTION: &'static str = "votes";

    fn id(&self) -> &VoteId {
        &self.id
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }
}
