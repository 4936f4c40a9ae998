//! Box office service - runs reducers as units of work against a record store.
//!
//! Every command follows the same cycle:
//! 1. Take the service lock (commands are serialized in-process)
//! 2. Load every collection from the store
//! 3. Run the status pass so the state matches the clock
//! 4. Run the command's reducer
//! 5. Commit the changed collections, checked against their loaded revisions
//!
//! A rejected command commits nothing; its status pass is simply redone by the
//! next unit of work. Queries run steps 1-3 and never write.

use std::sync::{Mutex, PoisonError};

use boxoffice_core::reducer::Reducer;
use boxoffice_store::RecordStore;
use chrono::{DateTime, Utc};

use crate::aggregates::event::{
    self, CancellationAction, CancellationReducer, CancellationReport, EventAction, EventDraft,
    EventOverview, EventReducer,
};
use crate::aggregates::inventory::{self, SeatGrid, SeatSelection};
use crate::aggregates::payment::{
    self, CheckoutAction, CheckoutOutcome, CheckoutReducer, RefundAction, RefundReducer,
};
use crate::aggregates::performance::{
    self, LineupAction, LineupReducer, PerformanceAction, PerformanceReducer,
};
use crate::aggregates::registration::{RegistrationAction, RegistrationReducer};
use crate::aggregates::status::{RefreshReport, StatusAction, StatusReducer};
use crate::aggregates::voting::{self, SongTally, VotingAction, VotingReducer};
use crate::aggregates::{AttendanceAction, AttendanceReducer, TicketingEnvironment};
use crate::error::TicketingError;
use crate::metrics;
use crate::state::TicketingState;
use crate::types::{
    Attendance, Event, EventId, Payment, PaymentId, PaymentMethod, Performance, PerformanceId,
    Refund, Registration, RegistrationId, SeatId, SeatPosition, SongId, UserId, Vote,
};

/// The box office over one record store
pub struct TicketingService<S: RecordStore> {
    store: S,
    env: TicketingEnvironment,
    lock: Mutex<()>,
}

impl<S: RecordStore> TicketingService<S> {
    /// Creates a service over `store`
    #[must_use]
    pub const fn new(store: S, env: TicketingEnvironment) -> Self {
        Self {
            store,
            env,
            lock: Mutex::new(()),
        }
    }

    /// The record store
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The reducers' environment
    #[must_use]
    pub const fn env(&self) -> &TicketingEnvironment {
        &self.env
    }

    /// Current time according to the service clock
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.env.now()
    }

    /// Run one command as a unit of work.
    ///
    /// # Errors
    ///
    /// Returns the reducer's rejection, or a [`TicketingError::Store`] if
    /// loading or committing fails (including revision conflicts with
    /// another writer).
    pub fn execute<R, T>(&self, reducer: &R, action: R::Action) -> Result<T, TicketingError>
    where
        R: Reducer<
                State = TicketingState,
                Environment = TicketingEnvironment,
                Output = Result<T, TicketingError>,
            >,
    {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut state = TicketingState::load(&self.store)?;
        let report = StatusReducer.reduce(&mut state, StatusAction::Refresh, &self.env);

        let output = reducer.reduce(&mut state, action, &self.env)?;
        let written = state.commit(&self.store)?;
        record_refresh(&report);
        tracing::debug!(collections = written, "Command committed");
        Ok(output)
    }

    /// Load the state as it stands at the service clock, without writing.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn snapshot(&self) -> Result<TicketingState, TicketingError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut state = TicketingState::load(&self.store)?;
        StatusReducer.reduce(&mut state, StatusAction::Refresh, &self.env);
        Ok(state)
    }

    /// Persist the status pass on its own: event transitions, absences and
    /// expired registrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub fn refresh(&self) -> Result<RefreshReport, TicketingError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut state = TicketingState::load(&self.store)?;
        let report = StatusReducer.reduce(&mut state, StatusAction::Refresh, &self.env);
        state.commit(&self.store)?;
        record_refresh(&report);
        if !report.is_quiet() {
            tracing::info!(
                transitioned = report.transitioned.len(),
                absences = report.absences_recorded,
                expired = report.expired.len(),
                "Status refreshed"
            );
        }
        Ok(report)
    }

    // ========== Events ==========

    /// Create an event.
    ///
    /// # Errors
    ///
    /// Returns [`TicketingError::InvalidInput`] for an invalid draft.
    pub fn create_event(&self, organizer: UserId, draft: EventDraft) -> Result<Event, TicketingError> {
        self.execute(&EventReducer, EventAction::Create { organizer, draft })
    }

    /// Replace an event's details with `draft`.
    ///
    /// # Errors
    ///
    /// Returns an error unless `organizer` manages the event, it has not
    /// started, and the draft is valid for its bookings and lineup.
    pub fn update_event(
        &self,
        organizer: UserId,
        event_id: EventId,
        draft: EventDraft,
    ) -> Result<Event, TicketingError> {
        self.execute(
            &EventReducer,
            EventAction::Update {
                organizer,
                event_id,
                draft,
            },
        )
    }

    /// Soft-delete an event.
    ///
    /// # Errors
    ///
    /// Returns an error unless `organizer` manages the event and no live
    /// registration holds seats for it.
    pub fn delete_event(&self, organizer: UserId, event_id: EventId) -> Result<Event, TicketingError> {
        self.execute(&EventReducer, EventAction::Delete { organizer, event_id })
    }

    /// Cancel an event, voiding its registrations and refunding in full.
    ///
    /// # Errors
    ///
    /// Returns an error unless `organizer` manages the event and it is still
    /// far enough away.
    pub fn cancel_event(
        &self,
        organizer: UserId,
        event_id: EventId,
    ) -> Result<CancellationReport, TicketingError> {
        let report = self.execute(
            &CancellationReducer,
            CancellationAction::Cancel { organizer, event_id },
        )?;
        metrics::record_registration_cancelled(report.cancelled_registrations.len());
        for refund in &report.refunds {
            metrics::record_refund(refund.amount);
        }
        Ok(report)
    }

    // ========== Bookings ==========

    /// Book seats, replacing the customer's unpaid booking for the event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event is not bookable or a seat is taken.
    pub fn register(
        &self,
        customer: UserId,
        event_id: EventId,
        seats: Vec<SeatPosition>,
    ) -> Result<Registration, TicketingError> {
        let registration = self.execute(
            &RegistrationReducer,
            RegistrationAction::Register {
                customer,
                event_id,
                seats,
            },
        )?;
        metrics::record_registration_booked(registration.seat_count());
        Ok(registration)
    }

    /// Withdraw an unpaid registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the registration is not the customer's or not
    /// PENDING.
    pub fn cancel_registration(
        &self,
        customer: UserId,
        registration_id: RegistrationId,
    ) -> Result<Registration, TicketingError> {
        let registration = self.execute(
            &RegistrationReducer,
            RegistrationAction::Cancel {
                customer,
                registration_id,
            },
        )?;
        metrics::record_registration_cancelled(1);
        Ok(registration)
    }

    /// Pay for a registration.
    ///
    /// A declined charge is not an error: it is recorded as a FAILED payment
    /// and returned as [`CheckoutOutcome::Declined`].
    ///
    /// # Errors
    ///
    /// Returns an error if the registration cannot be paid for.
    pub fn checkout(
        &self,
        customer: UserId,
        registration_id: RegistrationId,
        method: PaymentMethod,
    ) -> Result<CheckoutOutcome, TicketingError> {
        let outcome = self.execute(
            &CheckoutReducer,
            CheckoutAction::Checkout {
                customer,
                registration_id,
                method,
            },
        )?;
        match &outcome {
            CheckoutOutcome::Completed(payment) => metrics::record_payment_completed(payment.amount),
            CheckoutOutcome::Declined { reason, .. } => metrics::record_payment_failed(reason),
        }
        Ok(outcome)
    }

    /// Refund a payment, less the processing fee.
    ///
    /// # Errors
    ///
    /// Returns an error if the payment is not refundable at the service clock.
    pub fn request_refund(
        &self,
        customer: UserId,
        payment_id: PaymentId,
        reason: String,
    ) -> Result<Refund, TicketingError> {
        let refund = self.execute(
            &RefundReducer,
            RefundAction::Request {
                customer,
                payment_id,
                reason,
            },
        )?;
        metrics::record_refund(refund.amount);
        Ok(refund)
    }

    /// Check in a paid registration.
    ///
    /// # Errors
    ///
    /// Returns an error outside the attendance window.
    pub fn mark_attendance(
        &self,
        customer: UserId,
        registration_id: RegistrationId,
    ) -> Result<Attendance, TicketingError> {
        self.execute(
            &AttendanceReducer,
            AttendanceAction::Mark {
                customer,
                registration_id,
            },
        )
    }

    // ========== Lineup ==========

    /// Apply a lineup change to one performance.
    ///
    /// # Errors
    ///
    /// Returns an error if the change is invalid or clashes with the lineup.
    pub fn perform(&self, action: PerformanceAction) -> Result<Performance, TicketingError> {
        self.execute(&PerformanceReducer, action)
    }

    /// Delete every performance of an event, returning how many went.
    ///
    /// # Errors
    ///
    /// Returns an error unless `organizer` manages an editable event.
    pub fn clear_lineup(&self, organizer: UserId, event_id: EventId) -> Result<usize, TicketingError> {
        self.execute(&LineupReducer, LineupAction::Clear { organizer, event_id })
    }

    // ========== Voting ==========

    /// Spend one seat's vote on a song.
    ///
    /// # Errors
    ///
    /// Returns an error outside the event or when every seat has voted.
    pub fn cast_vote(
        &self,
        customer: UserId,
        registration_id: RegistrationId,
        song_id: SongId,
    ) -> Result<Vote, TicketingError> {
        let vote = self.execute(
            &VotingReducer,
            VotingAction::Cast {
                customer,
                registration_id,
                song_id,
            },
        )?;
        metrics::record_vote();
        Ok(vote)
    }

    // ========== Queries ==========

    /// Events open for booking.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn list_bookable_events(&self) -> Result<Vec<Event>, TicketingError> {
        let state = self.snapshot()?;
        Ok(event::list_bookable_events(&state, self.now()))
    }

    /// Current figures of an event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event does not exist.
    pub fn event_overview(&self, event_id: &EventId) -> Result<EventOverview, TicketingError> {
        let state = self.snapshot()?;
        event::event_overview(&state, event_id, self.now())
    }

    /// Seats of an event not held by any live registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn available_seats(&self, event_id: &EventId) -> Result<u32, TicketingError> {
        let state = self.snapshot()?;
        Ok(inventory::available_seats(&state, event_id))
    }

    /// Seats of an event held by live registrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn occupied_seats(
        &self,
        event_id: &EventId,
    ) -> Result<std::collections::BTreeSet<SeatId>, TicketingError> {
        let state = self.snapshot()?;
        Ok(inventory::occupied_seats(&state, event_id))
    }

    /// Occupancy map of an event.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn seat_grid(&self, event_id: &EventId) -> Result<SeatGrid, TicketingError> {
        let state = self.snapshot()?;
        Ok(inventory::seat_grid(&state, event_id))
    }

    /// Start picking `wanted` seats for `customer`.
    ///
    /// # Errors
    ///
    /// Returns an error if the event is not bookable or too few seats remain.
    pub fn start_selection(
        &self,
        customer: &UserId,
        event_id: &EventId,
        wanted: u32,
    ) -> Result<SeatSelection, TicketingError> {
        let state = self.snapshot()?;
        RegistrationReducer::start_selection(&state, customer, event_id, wanted, self.now())
    }

    /// Payments of `customer` still inside their refund window.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn refundable_payments(&self, customer: &UserId) -> Result<Vec<Payment>, TicketingError> {
        let state = self.snapshot()?;
        Ok(payment::refundable_payments(
            &state,
            customer,
            self.now(),
            &self.env.policy,
        ))
    }

    /// An event's lineup in running order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn performances_for_event(
        &self,
        event_id: &EventId,
    ) -> Result<Vec<Performance>, TicketingError> {
        let state = self.snapshot()?;
        Ok(performance::performances_for_event(&state, event_id))
    }

    /// A performance by id.
    ///
    /// # Errors
    ///
    /// Returns [`TicketingError::PerformanceNotFound`] if it does not exist.
    pub fn performance(&self, performance_id: &PerformanceId) -> Result<Performance, TicketingError> {
        let state = self.snapshot()?;
        state
            .performances
            .get(performance_id)
            .cloned()
            .ok_or_else(|| TicketingError::PerformanceNotFound(performance_id.clone()))
    }

    /// Votes a registration may still cast.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn remaining_votes(&self, registration_id: &RegistrationId) -> Result<u32, TicketingError> {
        let state = self.snapshot()?;
        Ok(voting::remaining_votes(&state, registration_id))
    }

    /// Song vote results of an event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event does not exist.
    pub fn vote_results(&self, event_id: &EventId) -> Result<Vec<SongTally>, TicketingError> {
        let state = self.snapshot()?;
        voting::vote_results(&state, event_id)
    }
}

impl<S: RecordStore + std::fmt::Debug> std::fmt::Debug for TicketingService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketingService")
            .field("store", &self.store)
            .field("env", &self.env)
            .finish_non_exhaustive()
    }
}

fn record_refresh(report: &RefreshReport) {
    for (_, status) in &report.transitioned {
        metrics::record_event_transition(*status);
    }
    metrics::record_registrations_expired(report.expired.len());
}
