//! Aggregate reducers for the box office.
//!
//! Each reducer handles one family of commands over the whole
//! [`TicketingState`](crate::state::TicketingState):
//! - Status: time-driven event transitions, absences and expiries
//! - Inventory: seat occupancy and selection (queries only)
//! - Registration: booking and withdrawing seats
//! - Payment: checkout and customer refunds
//! - Event: creation, cancellation and deletion of events
//! - Performance: the lineup of an event and its set lists
//! - Attendance: check-in
//! - Voting: per-seat song votes and tallies

use std::sync::Arc;

use boxoffice_core::environment::Clock;
use chrono::{DateTime, Utc};

use crate::config::PolicyConfig;
use crate::error::TicketingError;
use crate::payment_gateway::PaymentGateway;
use crate::state::TicketingState;
use crate::types::{Event, EventId, Registration, RegistrationId, UserId};

pub mod attendance;
pub mod event;
pub mod inventory;
pub mod payment;
pub mod performance;
pub mod registration;
pub mod status;
pub mod voting;

#[cfg(test)]
pub(crate) mod test_support;

pub use attendance::{AttendanceAction, AttendanceReducer};
pub use event::{CancellationAction, CancellationReducer, EventAction, EventReducer};
pub use payment::{CheckoutAction, CheckoutReducer, RefundAction, RefundReducer};
pub use performance::{LineupAction, LineupReducer, PerformanceAction, PerformanceReducer};
pub use registration::{RegistrationAction, RegistrationReducer};
pub use status::{StatusAction, StatusReducer};
pub use voting::{VotingAction, VotingReducer};

/// Dependencies shared by every ticketing reducer
#[derive(Clone)]
pub struct TicketingEnvironment {
    /// Source of "now"
    pub clock: Arc<dyn Clock>,
    /// Business rules
    pub policy: PolicyConfig,
    /// Payment processor
    pub gateway: Arc<dyn PaymentGateway>,
}

impl TicketingEnvironment {
    /// Creates a new `TicketingEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        policy: PolicyConfig,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            clock,
            policy,
            gateway,
        }
    }

    /// Current time according to the environment's clock
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

impl std::fmt::Debug for TicketingEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketingEnvironment")
            .field("now", &self.clock.now())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Lookups shared by the reducers
// ============================================================================

/// A live event
pub(crate) fn find_event<'a>(
    state: &'a TicketingState,
    event_id: &EventId,
) -> Result<&'a Event, TicketingError> {
    state
        .events
        .get(event_id)
        .ok_or_else(|| TicketingError::EventNotFound(event_id.clone()))
}

/// A live event managed by `organizer`
pub(crate) fn managed_event<'a>(
    state: &'a TicketingState,
    organizer: &UserId,
    event_id: &EventId,
) -> Result<&'a Event, TicketingError> {
    let event = find_event(state, event_id)?;
    if &event.organizer_id != organizer {
        return Err(TicketingError::NotEventOrganizer(event_id.clone()));
    }
    Ok(event)
}

/// A live registration held by `customer`.
///
/// Someone else's registration is reported as missing.
pub(crate) fn owned_registration<'a>(
    state: &'a TicketingState,
    customer: &UserId,
    registration_id: &RegistrationId,
) -> Result<&'a Registration, TicketingError> {
    state
        .registrations
        .get(registration_id)
        .filter(|registration| &registration.customer_id == customer)
        .ok_or_else(|| TicketingError::RegistrationNotFound(registration_id.clone()))
}
