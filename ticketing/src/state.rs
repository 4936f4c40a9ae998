//! The state a reducer works on: every collection, loaded together.
//!
//! A unit of work loads a [`TicketingState`], lets one or more reducers change
//! it, and commits the collections that actually changed in a single batch.
//! The batch carries each collection's loaded revision, so a concurrent
//! writer turns into a [`StoreError::ConcurrencyConflict`] instead of a lost
//! update.

use boxoffice_store::{Collection, PendingWrite, RecordStore, StoreError};

use crate::types::{
    Attendance, Event, EventId, Payment, PaymentStatus, Performance, Refund, Registration,
    RegistrationId, Vote,
};

/// Every record collection of the box office
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TicketingState {
    /// Events
    pub events: Collection<Event>,
    /// Registrations (with their seats)
    pub registrations: Collection<Registration>,
    /// Payments
    pub payments: Collection<Payment>,
    /// Refunds
    pub refunds: Collection<Refund>,
    /// Attendance records
    pub attendances: Collection<Attendance>,
    /// Performances (with their songs)
    pub performances: Collection<Performance>,
    /// Song votes
    pub votes: Collection<Vote>,
}

impl TicketingState {
    /// Create an empty state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every collection from a store
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn load<S: RecordStore + ?Sized>(store: &S) -> Result<Self, StoreError> {
        Ok(Self {
            events: Collection::load(store)?,
            registrations: Collection::load(store)?,
            payments: Collection::load(store)?,
            refunds: Collection::load(store)?,
            attendances: Collection::load(store)?,
            performances: Collection::load(store)?,
            votes: Collection::load(store)?,
        })
    }

    /// Writes for every collection that differs from what was loaded
    ///
    /// # Errors
    ///
    /// Returns an error if a record fails to serialize.
    pub fn pending_writes(&self) -> Result<Vec<PendingWrite>, StoreError> {
        let writes = [
            self.events.pending_write()?,
            self.registrations.pending_write()?,
            self.payments.pending_write()?,
            self.refunds.pending_write()?,
            self.attendances.pending_write()?,
            self.performances.pending_write()?,
            self.votes.pending_write()?,
        ];
        Ok(writes.into_iter().flatten().collect())
    }

    /// Commit changed collections; returns how many were written
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConcurrencyConflict`] if another writer got there
    /// first, or any I/O error from the store.
    pub fn commit<S: RecordStore + ?Sized>(&self, store: &S) -> Result<usize, StoreError> {
        let writes = self.pending_writes()?;
        let count = writes.len();
        if count > 0 {
            let names: Vec<&str> = writes.iter().map(|w| w.collection).collect();
            store.commit(writes)?;
            tracing::debug!(collections = ?names, "Unit of work committed");
        }
        Ok(count)
    }

    // ========== Cross-collection lookups ==========

    /// Live registrations of an event, cancelled ones included
    pub fn registrations_for_event<'a>(
        &'a self,
        event_id: &'a EventId,
    ) -> impl Iterator<Item = &'a Registration> + 'a {
        self.registrations
            .iter()
            .filter(move |registration| &registration.event_id == event_id)
    }

    /// The completed (settled, not refunded) payment of a registration
    #[must_use]
    pub fn completed_payment(&self, registration_id: &RegistrationId) -> Option<&Payment> {
        self.payments.iter().find(|payment| {
            &payment.registration_id == registration_id
                && payment.status == PaymentStatus::Completed
        })
    }

    /// The attendance record of a registration
    #[must_use]
    pub fn attendance_for(&self, registration_id: &RegistrationId) -> Option<&Attendance> {
        self.attendances
            .iter()
            .find(|attendance| &attendance.registration_id == registration_id)
    }

    /// Live votes cast with a registration's seats
    #[must_use]
    pub fn votes_cast(&self, registration_id: &RegistrationId) -> u32 {
        let count = self
            .votes
            .iter()
            .filter(|vote| &vote.registration_id == registration_id)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}
