//! Business metrics for the box office.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `boxoffice_registrations_total{status}` - Registrations by outcome (booked, cancelled, expired)
//! - `boxoffice_payments_total{status}` - Payments by outcome (completed, failed)
//! - `boxoffice_revenue_cents_total` - Settled payment amounts in cents
//! - `boxoffice_refunds_total` - Refunds issued
//! - `boxoffice_refund_cents_total` - Refunded amounts in cents
//! - `boxoffice_votes_total` - Song votes cast
//! - `boxoffice_events_transitioned_total{status}` - Event status changes by new status
//!
//! Recording is a no-op until the binary installs a recorder.

use metrics::describe_counter;

use crate::types::{EventStatus, Money};

/// Register descriptions for every business metric.
///
/// Call once at startup, before anything is recorded.
pub fn register_business_metrics() {
    describe_counter!(
        "boxoffice_registrations_total",
        "Total number of registrations by status (booked, cancelled, expired)"
    );

    describe_counter!(
        "boxoffice_payments_total",
        "Total number of payments by status (completed, failed)"
    );
    describe_counter!(
        "boxoffice_revenue_cents_total",
        "Total settled payment amounts in cents"
    );

    describe_counter!("boxoffice_refunds_total", "Total number of refunds issued");
    describe_counter!(
        "boxoffice_refund_cents_total",
        "Total refunded amounts in cents"
    );

    describe_counter!("boxoffice_votes_total", "Total number of song votes cast");

    describe_counter!(
        "boxoffice_events_transitioned_total",
        "Total event status transitions by new status"
    );

    tracing::info!("Business metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record a booking (new registration or rebooked seats).
pub fn record_registration_booked(seats: u32) {
    metrics::counter!("boxoffice_registrations_total", "status" => "booked").increment(1);
    tracing::debug!(seats, "Recorded registration_booked metric");
}

/// Record a registration withdrawn by its customer or voided with its event.
pub fn record_registration_cancelled(count: usize) {
    metrics::counter!("boxoffice_registrations_total", "status" => "cancelled")
        .increment(count as u64);
    tracing::debug!(count, "Recorded registration_cancelled metric");
}

/// Record unpaid registrations released after the grace period.
pub fn record_registrations_expired(count: usize) {
    metrics::counter!("boxoffice_registrations_total", "status" => "expired")
        .increment(count as u64);
    tracing::debug!(count, "Recorded registrations_expired metric");
}

/// Record a settled payment.
pub fn record_payment_completed(amount: Money) {
    metrics::counter!("boxoffice_payments_total", "status" => "completed").increment(1);
    metrics::counter!("boxoffice_revenue_cents_total").increment(amount.cents());
    tracing::debug!(amount_cents = amount.cents(), "Recorded payment_completed metric");
}

/// Record a payment the gateway declined.
pub fn record_payment_failed(reason: &str) {
    tracing::debug!(reason, "Recorded payment_failed metric");
    metrics::counter!("boxoffice_payments_total", "status" => "failed").increment(1);
}

/// Record a refund, whether requested or issued by a cancellation.
pub fn record_refund(amount: Money) {
    metrics::counter!("boxoffice_refunds_total").increment(1);
    metrics::counter!("boxoffice_refund_cents_total").increment(amount.cents());
    tracing::debug!(amount_cents = amount.cents(), "Recorded refund metric");
}

/// Record a song vote.
pub fn record_vote() {
    metrics::counter!("boxoffice_votes_total").increment(1);
    tracing::debug!("Recorded vote metric");
}

/// Record an event moving to `status`.
pub fn record_event_transition(status: EventStatus) {
    let label = match status {
        EventStatus::Scheduled => "scheduled",
        EventStatus::Ongoing => "ongoing",
        EventStatus::Completed => "completed",
        EventStatus::Cancelled => "cancelled",
    };
    metrics::counter!("boxoffice_events_transitioned_total", "status" => label).increment(1);
    tracing::debug!(%status, "Recorded event_transition metric");
}

#[cfg(test)]
mod tests {
    use super::*;

    // Without an installed recorder every call is a no-op; these only prove
    // the macros accept our labels.
    #[test]
    fn recording_without_a_recorder_is_harmless() {
        register_business_metrics();
        record_registration_booked(2);
        record_registration_cancelled(1);
        record_registrations_expired(0);
        record_payment_completed(Money::from_cents(5_000));
        record_payment_failed("card declined");
        record_refund(Money::from_cents(4_000));
        record_vote();
        record_event_transition(EventStatus::Ongoing);
    }
}
