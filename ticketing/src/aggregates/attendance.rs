//! Attendance aggregate.
//!
//! A paid registration is checked in against the event window. Each
//! registration has at most one attendance record; checking in again
//! updates it. No-shows are recorded ABSENT by the status pass once the
//! event is over.

use boxoffice_core::reducer::Reducer;
use chrono::{DateTime, Utc};

use super::{find_event, owned_registration, TicketingEnvironment};
use crate::config::EarlyCheckIn;
use crate::error::TicketingError;
use crate::state::TicketingState;
use crate::types::{Attendance, AttendanceStatus, EventStatus, RegistrationId, RegistrationStatus, UserId};

/// Decide attendance for a check-in at `now` against `[start, end]`.
///
/// Inside the closed window the holder is PRESENT and after it ABSENT.
/// Before the window the `early` policy decides.
///
/// # Examples
///
/// ```
/// use boxoffice::aggregates::attendance::determine_attendance;
/// use boxoffice::config::EarlyCheckIn;
/// use boxoffice::types::AttendanceStatus;
/// use chrono::{Duration, Utc};
///
/// let start = Utc::now();
/// let end = start + Duration::hours(2);
/// let early = start - Duration::minutes(1);
/// assert_eq!(determine_attendance(early, start, end, EarlyCheckIn::Accept), AttendanceStatus::Present);
/// assert_eq!(determine_attendance(early, start, end, EarlyCheckIn::Reject), AttendanceStatus::Absent);
/// ```
#[must_use]
pub fn determine_attendance(
    now: DateTime<Utc>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    early: EarlyCheckIn,
) -> AttendanceStatus {
    if now > end {
        AttendanceStatus::Absent
    } else if now >= start {
        AttendanceStatus::Present
    } else {
        match early {
            EarlyCheckIn::Accept => AttendanceStatus::Present,
            EarlyCheckIn::Reject => AttendanceStatus::Absent,
        }
    }
}

/// Actions for the Attendance aggregate
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttendanceAction {
    /// Check in the holder of a paid registration
    Mark {
        /// Customer checking in
        customer: UserId,
        /// Their registration
        registration_id: RegistrationId,
    },
}

/// Reducer for the Attendance aggregate
#[derive(Clone, Copy, Debug, Default)]
pub struct AttendanceReducer;

impl AttendanceReducer {
    /// Creates a new `AttendanceReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn validate_mark(
        state: &TicketingState,
        customer: &UserId,
        registration_id: &RegistrationId,
        env: &TicketingEnvironment,
    ) -> Result<(), TicketingError> {
        let registration = owned_registration(state, customer, registration_id)?;
        if registration.status != RegistrationStatus::Completed {
            return Err(TicketingError::InvalidRegistrationStatus {
                registration_id: registration_id.clone(),
                status: registration.status,
            });
        }

        let event = find_event(state, &registration.event_id)?;
        if event.is_cancelled() {
            return Err(TicketingError::EventNotAvailable {
                event_id: event.id.clone(),
                status: event.status,
            });
        }

        let now = env.now();
        match determine_attendance(now, event.start_time, event.end_time, env.policy.early_check_in) {
            AttendanceStatus::Present => Ok(()),
            AttendanceStatus::Absent if now > event.end_time => {
                Err(TicketingError::AttendanceClosed(event.id.clone()))
            }
            AttendanceStatus::Absent => Err(TicketingError::EventNotAvailable {
                event_id: event.id.clone(),
                status: EventStatus::Scheduled,
            }),
        }
    }
}

impl Reducer for AttendanceReducer {
    type State = TicketingState;
    type Action = AttendanceAction;
    type Environment = TicketingEnvironment;
    type Output = Result<Attendance, TicketingError>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Self::Output {
        match action {
            AttendanceAction::Mark {
                customer,
                registration_id,
            } => {
                Self::validate_mark(state, &customer, &registration_id, env)?;
                let now = env.now();

                let existing = state.attendance_for(&registration_id).map(|a| a.id.clone());
                let attendance = match existing.and_then(|id| state.attendances.get_mut(&id)) {
                    Some(attendance) => {
                        attendance.status = AttendanceStatus::Present;
                        attendance.recorded_at = now;
                        attendance.clone()
                    }
                    None => {
                        let attendance = Attendance {
                            id: state.attendances.allocate_id(),
                            registration_id: registration_id.clone(),
                            status: AttendanceStatus::Present,
                            recorded_at: now,
                            deleted: false,
                        };
                        state.attendances.insert(attendance.clone());
                        attendance
                    }
                };
                tracing::info!(
                    attendance_id = %attendance.id,
                    %registration_id,
                    "Attendance marked present"
                );
                Ok(attendance)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::aggregates::test_support::{
        add_event, add_paid_registration, add_registration, customer, env_at,
    };
    use crate::types::EventId;
    use boxoffice_testing::{assertions, helpers::utc, ReducerTest};

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (utc(2025, 3, 1, 14, 0), utc(2025, 3, 1, 16, 0))
    }

    fn gala(state: &mut TicketingState) -> EventId {
        let (start, end) = window();
        add_event(state, start, end, 10)
    }

    #[test]
    fn attendance_around_the_window() {
        let (start, end) = window();
        let accept = |now| determine_attendance(now, start, end, EarlyCheckIn::Accept);

        assert_eq!(accept(utc(2025, 3, 1, 13, 59)), AttendanceStatus::Present);
        assert_eq!(accept(utc(2025, 3, 1, 15, 0)), AttendanceStatus::Present);
        assert_eq!(accept(end), AttendanceStatus::Present);
        assert_eq!(accept(utc(2025, 3, 1, 16, 1)), AttendanceStatus::Absent);
        assert_eq!(
            determine_attendance(utc(2025, 3, 1, 13, 59), start, end, EarlyCheckIn::Reject),
            AttendanceStatus::Absent
        );
    }

    #[test]
    fn check_in_is_an_upsert() {
        let mut state = TicketingState::new();
        let event_id = gala(&mut state);
        let (registration_id, _) =
            add_paid_registration(&mut state, &customer(), &event_id, &[(1, 1)], utc(2025, 2, 1, 9, 0));
        let mark = AttendanceAction::Mark {
            customer: customer(),
            registration_id: registration_id.clone(),
        };

        let first = AttendanceReducer
            .reduce(&mut state, mark.clone(), &env_at(utc(2025, 3, 1, 14, 5)))
            .unwrap();
        let second = AttendanceReducer
            .reduce(&mut state, mark, &env_at(utc(2025, 3, 1, 15, 0)))
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(state.attendances.len(), 1);
        assert_eq!(second.recorded_at, utc(2025, 3, 1, 15, 0));
    }

    #[test]
    fn recorded_absence_can_be_overturned_inside_the_window() {
        let mut state = TicketingState::new();
        let event_id = gala(&mut state);
        let (registration_id, _) =
            add_paid_registration(&mut state, &customer(), &event_id, &[(1, 1)], utc(2025, 2, 1, 9, 0));
        let id = state.attendances.allocate_id();
        state.attendances.insert(Attendance {
            id,
            registration_id: registration_id.clone(),
            status: AttendanceStatus::Absent,
            recorded_at: utc(2025, 3, 1, 13, 0),
            deleted: false,
        });

        ReducerTest::new(AttendanceReducer::new())
            .with_env(env_at(utc(2025, 3, 1, 14, 30)))
            .given_state(state)
            .when_action(AttendanceAction::Mark {
                customer: customer(),
                registration_id,
            })
            .then_state(|state| assert_eq!(state.attendances.len(), 1))
            .then_output(|output| {
                assert_eq!(output.as_ref().unwrap().status, AttendanceStatus::Present);
            })
            .run();
    }

    #[test]
    fn late_check_in_is_refused_and_not_recorded() {
        let mut state = TicketingState::new();
        let event_id = gala(&mut state);
        let (registration_id, _) =
            add_paid_registration(&mut state, &customer(), &event_id, &[(1, 1)], utc(2025, 2, 1, 9, 0));

        ReducerTest::new(AttendanceReducer::new())
            .with_env(env_at(utc(2025, 3, 1, 16, 1)))
            .given_state(state)
            .when_action(AttendanceAction::Mark {
                customer: customer(),
                registration_id,
            })
            .then_state_unchanged()
            .then_output(|output| {
                assertions::assert_rejected_with(output, |error| {
                    matches!(error, TicketingError::AttendanceClosed(_))
                });
            })
            .run();
    }

    #[test]
    fn unpaid_registration_cannot_check_in() {
        let mut state = TicketingState::new();
        let event_id = gala(&mut state);
        let registration_id = add_registration(
            &mut state,
            &customer(),
            &event_id,
            &[(1, 1)],
            RegistrationStatus::Pending,
            utc(2025, 3, 1, 13, 0),
        );

        ReducerTest::new(AttendanceReducer::new())
            .with_env(env_at(utc(2025, 3, 1, 14, 30)))
            .given_state(state)
            .when_action(AttendanceAction::Mark {
                customer: customer(),
                registration_id,
            })
            .then_state_unchanged()
            .then_output(|output| {
                assertions::assert_rejected_with(output, |error| {
                    matches!(error, TicketingError::InvalidRegistrationStatus { .. })
                });
            })
            .run();
    }
}
