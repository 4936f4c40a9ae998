//! Payment aggregate.
//!
//! State machines:
//!
//! ```text
//! Payment:       PENDING → COMPLETED | FAILED,  COMPLETED → REFUNDED
//! Registration:  PENDING → COMPLETED | CANCELLED
//! ```
//!
//! A checkout asks the [`PaymentGateway`](crate::payment_gateway::PaymentGateway)
//! to charge `ticket price × seats`. An approved charge settles the
//! registration and takes its seats off the event's available counter. A
//! declined charge is still recorded, as a FAILED payment, and the
//! registration stays PENDING so the customer can try again.
//!
//! A refund is only possible from COMPLETED, so a payment can never be
//! refunded twice.

use boxoffice_core::reducer::Reducer;
use chrono::{DateTime, Utc};

use super::{find_event, owned_registration, TicketingEnvironment};
use crate::config::PolicyConfig;
use crate::error::TicketingError;
use crate::state::TicketingState;
use crate::types::{
    Money, Payment, PaymentId, PaymentMethod, PaymentStatus, Refund, RegistrationId,
    RegistrationStatus, SeatStatus, UserId,
};

// ============================================================================
// Checkout
// ============================================================================

/// Actions for checkout
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckoutAction {
    /// Pay for a PENDING registration
    Checkout {
        /// Customer paying
        customer: UserId,
        /// Registration being paid for
        registration_id: RegistrationId,
        /// How the customer pays
        method: PaymentMethod,
    },
}

/// How a checkout ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Charge approved; registration is COMPLETED
    Completed(Payment),
    /// Charge declined; a FAILED payment was recorded
    Declined {
        /// The failed payment
        payment: Payment,
        /// Gateway's explanation
        reason: String,
    },
}

impl CheckoutOutcome {
    /// The payment recorded by the checkout
    #[must_use]
    pub const fn payment(&self) -> &Payment {
        match self {
            Self::Completed(payment) | Self::Declined { payment, .. } => payment,
        }
    }

    /// Check whether the charge went through
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Reducer for checkout
#[derive(Clone, Copy, Debug, Default)]
pub struct CheckoutReducer;

impl CheckoutReducer {
    /// Creates a new `CheckoutReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Check the registration can be paid and price it
    fn validate_checkout(
        state: &TicketingState,
        customer: &UserId,
        registration_id: &RegistrationId,
    ) -> Result<Money, TicketingError> {
        let registration = owned_registration(state, customer, registration_id)?;
        if state.completed_payment(registration_id).is_some() {
            return Err(TicketingError::AlreadyPaid(registration_id.clone()));
        }
        if registration.status != RegistrationStatus::Pending {
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

        event
            .ticket_price
            .checked_multiply(u64::from(registration.seat_count()))
            .ok_or(TicketingError::AmountOverflow)
    }

    fn checkout(
        state: &mut TicketingState,
        customer: &UserId,
        registration_id: &RegistrationId,
        method: PaymentMethod,
        env: &TicketingEnvironment,
    ) -> Result<CheckoutOutcome, TicketingError> {
        let amount = Self::validate_checkout(state, customer, registration_id)?;
        let now = env.now();
        let payment_id = state.payments.allocate_id();

        let mut payment = Payment {
            id: payment_id.clone(),
            registration_id: registration_id.clone(),
            amount,
            paid_at: now,
            method,
            status: PaymentStatus::Pending,
            deleted: false,
        };

        match env.gateway.charge(&payment_id, amount, method) {
            Ok(transaction) => {
                payment.status = PaymentStatus::Completed;
                state.payments.insert(payment.clone());
                Self::settle_registration(state, registration_id);
                tracing::info!(
                    %payment_id,
                    %registration_id,
                    amount = amount.cents(),
                    transaction_id = %transaction.transaction_id,
                    "Payment completed"
                );
                Ok(CheckoutOutcome::Completed(payment))
            }
            Err(error) => {
                payment.status = PaymentStatus::Failed;
                state.payments.insert(payment.clone());
                tracing::warn!(%payment_id, %registration_id, %error, "Payment declined");
                Ok(CheckoutOutcome::Declined {
                    payment,
                    reason: error.to_string(),
                })
            }
        }
    }

    /// Mark the registration paid, make sure its seats are held, and take
    /// them off the event's counter.
    fn settle_registration(state: &mut TicketingState, registration_id: &RegistrationId) {
        let Some(registration) = state.registrations.get_mut(registration_id) else {
            return;
        };
        registration.status = RegistrationStatus::Completed;
        for seat in &mut registration.seats {
            seat.status = SeatStatus::Reserved;
            seat.registration_id = Some(registration_id.clone());
        }
        let seats = registration.seat_count();
        let event_id = registration.event_id.clone();

        if let Some(event) = state.events.get_mut(&event_id) {
            event.available_seats = event.available_seats.saturating_sub(seats);
        }
    }
}

impl Reducer for CheckoutReducer {
    type State = TicketingState;
    type Action = CheckoutAction;
    type Environment = TicketingEnvironment;
    type Output = Result<CheckoutOutcome, TicketingError>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Self::Output {
        match action {
            CheckoutAction::Checkout {
                customer,
                registration_id,
                method,
            } => Self::checkout(state, &customer, &registration_id, method, env),
        }
    }
}

// ============================================================================
// Refunds
// ============================================================================

/// Actions for customer refunds
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefundAction {
    /// Ask for money back on a completed payment
    Request {
        /// Customer asking
        customer: UserId,
        /// Payment to refund
        payment_id: PaymentId,
        /// Why (at least the configured number of characters)
        reason: String,
    },
}

/// Reducer for customer refunds
#[derive(Clone, Copy, Debug, Default)]
pub struct RefundReducer;

impl RefundReducer {
    /// Creates a new `RefundReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Last instant (exclusive) a payment for an event starting at `start`
    /// can be refunded
    #[must_use]
    pub fn refund_deadline(start: DateTime<Utc>, policy: &PolicyConfig) -> DateTime<Utc> {
        start - policy.refund_cutoff()
    }

    /// The payment, if `customer` owns it, and the refund it would earn
    fn validate_refund(
        state: &TicketingState,
        customer: &UserId,
        payment_id: &PaymentId,
        reason: &str,
        env: &TicketingEnvironment,
    ) -> Result<Money, TicketingError> {
        let payment = state
            .payments
            .get(payment_id)
            .ok_or_else(|| TicketingError::PaymentNotFound(payment_id.clone()))?;
        let registration = owned_registration(state, customer, &payment.registration_id)
            .map_err(|_| TicketingError::PaymentNotFound(payment_id.clone()))?;

        if payment.status != PaymentStatus::Completed {
            return Err(TicketingError::InvalidPaymentStatus {
                payment_id: payment_id.clone(),
                status: payment.status,
            });
        }

        let event = find_event(state, &registration.event_id)?;
        let deadline = Self::refund_deadline(event.start_time, &env.policy);
        if env.now() >= deadline {
            return Err(TicketingError::RefundWindowClosed { deadline });
        }

        let minimum = env.policy.min_refund_reason;
        if reason.trim().chars().count() < minimum {
            return Err(TicketingError::InvalidInput(format!(
                "refund reason must be at least {minimum} characters"
            )));
        }

        Ok(payment.amount.percent(env.policy.refund_percent()))
    }
}

impl Reducer for RefundReducer {
    type State = TicketingState;
    type Action = RefundAction;
    type Environment = TicketingEnvironment;
    type Output = Result<Refund, TicketingError>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Self::Output {
        match action {
            RefundAction::Request {
                customer,
                payment_id,
                reason,
            } => {
                let amount = Self::validate_refund(state, &customer, &payment_id, &reason, env)?;
                let refund = settle_refund(state, &payment_id, amount, reason.trim(), env.now())
                    .ok_or_else(|| TicketingError::PaymentNotFound(payment_id.clone()))?;
                tracing::info!(
                    refund_id = %refund.id,
                    %payment_id,
                    amount = refund.amount.cents(),
                    "Refund issued"
                );
                Ok(refund)
            }
        }
    }
}

/// Refund a COMPLETED payment.
///
/// Flips the payment to REFUNDED, cancels its registration (releasing the
/// seats), gives the seats back to the event's counter and records the
/// refund. Returns `None`, changing nothing, if the payment is not
/// COMPLETED.
pub(crate) fn settle_refund(
    state: &mut TicketingState,
    payment_id: &PaymentId,
    amount: Money,
    reason: &str,
    now: DateTime<Utc>,
) -> Option<Refund> {
    let payment = state
        .payments
        .get_mut(payment_id)
        .filter(|payment| payment.status == PaymentStatus::Completed)?;
    payment.status = PaymentStatus::Refunded;
    let registration_id = payment.registration_id.clone();

    if let Some(registration) = state.registrations.get_mut(&registration_id) {
        let seats = registration.seat_count();
        registration.cancel();
        let event_id = registration.event_id.clone();
        if let Some(event) = state.events.get_mut(&event_id) {
            event.available_seats = event.available_seats.saturating_add(seats).min(event.total_seats);
        }
    }

    let refund = Refund {
        id: state.refunds.allocate_id(),
        payment_id: payment_id.clone(),
        amount,
        refunded_at: now,
        reason: reason.to_string(),
        deleted: false,
    };
    state.refunds.insert(refund.clone());
    Some(refund)
}

/// COMPLETED payments of `customer` that can still be refunded at `now`
#[must_use]
pub fn refundable_payments(
    state: &TicketingState,
    customer: &UserId,
    now: DateTime<Utc>,
    policy: &PolicyConfig,
) -> Vec<Payment> {
    state
        .payments
        .iter()
        .filter(|payment| payment.status == PaymentStatus::Completed)
        .filter(|payment| {
            state
                .registrations
                .get(&payment.registration_id)
                .filter(|registration| &registration.customer_id == customer)
                .and_then(|registration| state.events.get(&registration.event_id))
                .is_some_and(|event| now < RefundReducer::refund_deadline(event.start_time, policy))
        })
        .cloned()
        .collect()
}
