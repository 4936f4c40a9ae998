//! Status derivation.
//!
//! An event's status is a function of the clock: stored values are only the
//! last known answer. The [`StatusReducer`] brings every stored status up to
//! date and applies the consequences of time passing:
//!
//! 1. events move SCHEDULED → ONGOING → COMPLETED (CANCELLED never moves);
//! 2. every registration of a COMPLETED event with no attendance record gets
//!    an ABSENT record, whatever became of the booking;
//! 3. PENDING registrations older than the grace period are cancelled and
//!    their seats released.
//!
//! Running the pass twice at the same instant changes nothing the second time.

use boxoffice_core::reducer::Reducer;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use super::TicketingEnvironment;
use crate::state::TicketingState;
use crate::types::{
    Attendance, AttendanceStatus, Event, EventId, EventStatus, RegistrationId, RegistrationStatus,
};

/// Derive an event's status at `now`.
///
/// CANCELLED is absorbing; otherwise the event is SCHEDULED before `start`,
/// ONGOING in the closed window `[start, end]` and COMPLETED after `end`.
///
/// # Examples
///
/// ```
/// use boxoffice::aggregates::status::derive_status;
/// use boxoffice::types::EventStatus;
/// use chrono::{Duration, Utc};
///
/// let start = Utc::now();
/// let end = start + Duration::hours(2);
/// assert_eq!(derive_status(start, start, end, EventStatus::Scheduled), EventStatus::Ongoing);
/// assert_eq!(derive_status(end, start, end, EventStatus::Cancelled), EventStatus::Cancelled);
/// ```
#[must_use]
pub fn derive_status(
    now: DateTime<Utc>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    prior: EventStatus,
) -> EventStatus {
    if prior == EventStatus::Cancelled {
        EventStatus::Cancelled
    } else if now < start {
        EventStatus::Scheduled
    } else if now <= end {
        EventStatus::Ongoing
    } else {
        EventStatus::Completed
    }
}

/// The status `event` has at `now`, whatever is stored
#[must_use]
pub fn current_status(event: &Event, now: DateTime<Utc>) -> EventStatus {
    derive_status(now, event.start_time, event.end_time, event.status)
}

/// Actions for the status pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusAction {
    /// Bring every status up to date with the clock
    Refresh,
}

/// What a refresh changed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Events whose stored status moved, with their new status
    pub transitioned: Vec<(EventId, EventStatus)>,
    /// ABSENT attendance records created
    pub absences_recorded: usize,
    /// PENDING registrations cancelled for not being paid in time
    pub expired: Vec<RegistrationId>,
}

impl RefreshReport {
    /// Check whether the pass changed nothing
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.transitioned.is_empty() && self.absences_recorded == 0 && self.expired.is_empty()
    }
}

/// Reducer for the status pass
#[derive(Clone, Copy, Debug, Default)]
pub struct StatusReducer;

impl StatusReducer {
    /// Creates a new `StatusReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn transition_events(state: &mut TicketingState, now: DateTime<Utc>) -> Vec<(EventId, EventStatus)> {
        let mut transitioned = Vec::new();
        for event in state.events.iter_mut() {
            let derived = current_status(event, now);
            if derived != event.status {
                tracing::info!(
                    event_id = %event.id,
                    from = %event.status,
                    to = %derived,
                    "Event status transitioned"
                );
                event.status = derived;
                transitioned.push((event.id.clone(), derived));
            }
        }
        transitioned
    }

    fn record_absences(state: &mut TicketingState, now: DateTime<Utc>) -> usize {
        let completed: BTreeSet<&EventId> = state
            .events
            .iter()
            .filter(|event| event.status == EventStatus::Completed)
            .map(|event| &event.id)
            .collect();

        let missing: Vec<RegistrationId> = state
            .registrations
            .iter()
            .filter(|registration| {
                completed.contains(&registration.event_id)
                    && state.attendance_for(&registration.id).is_none()
            })
            .map(|registration| registration.id.clone())
            .collect();

        for registration_id in &missing {
            let id = state.attendances.allocate_id();
            tracing::debug!(attendance_id = %id, %registration_id, "Recording absence");
            state.attendances.insert(Attendance {
                id,
                registration_id: registration_id.clone(),
                status: AttendanceStatus::Absent,
                recorded_at: now,
                deleted: false,
            });
        }
        missing.len()
    }

    fn expire_pending(
        state: &mut TicketingState,
        now: DateTime<Utc>,
        env: &TicketingEnvironment,
    ) -> Vec<RegistrationId> {
        let grace = env.policy.grace_period();
        let mut expired = Vec::new();
        for registration in state.registrations.iter_mut() {
            if registration.status == RegistrationStatus::Pending
                && now - registration.registered_at > grace
            {
                tracing::info!(
                    registration_id = %registration.id,
                    event_id = %registration.event_id,
                    seats = registration.seats.len(),
                    "Unpaid registration expired"
                );
                registration.cancel();
                expired.push(registration.id.clone());
            }
        }
        expired
    }
}

impl Reducer for StatusReducer {
    type State = TicketingState;
    type Action = StatusAction;
    type Environment = TicketingEnvironment;
    type Output = RefreshReport;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Self::Output {
        match action {
            StatusAction::Refresh => {
                let now = env.now();
                let transitioned = Self::transition_events(state, now);
                let absences_recorded = Self::record_absences(state, now);
                let expired = Self::expire_pending(state, now, env);
                RefreshReport {
                    transitioned,
                    absences_recorded,
                    expired,
                }
            }
        }
    }
}
