//! Box office demo.
//!
//! Walks one event through its whole life against the configured data
//! directory, moving a simulated clock instead of waiting:
//! booking, payment, an abandoned booking, check-in, song votes and the
//! closing status pass.

use std::sync::Arc;

use anyhow::Context;
use boxoffice::aggregates::event::EventDraft;
use boxoffice::aggregates::performance::PerformanceAction;
use boxoffice::aggregates::TicketingEnvironment;
use boxoffice::payment_gateway::MockPaymentGateway;
use boxoffice::time::{format_instant, parse_time_on};
use boxoffice::types::{Money, PaymentMethod, SeatPosition, UserId};
use boxoffice::{metrics, Config, TicketingService};
use boxoffice_core::environment::{Clock, SimulatedClock};
use boxoffice_store::JsonFileStore;
use chrono::{Duration, Utc};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(data_dir = %config.data_dir.display(), "Starting box office");
    metrics::register_business_metrics();

    let clock = Arc::new(SimulatedClock::new(config.start_time.unwrap_or_else(Utc::now)));
    let store = JsonFileStore::open(&config.data_dir).context("opening data directory")?;
    let env = TicketingEnvironment::new(
        clock.clone(),
        config.policy.clone(),
        MockPaymentGateway::shared(),
    );
    let service = TicketingService::new(store, env);
    service.refresh().context("initial status pass")?;

    let organizer = UserId::new("organizer");
    let alice = UserId::new("alice");
    let bob = UserId::new("bob");

    // Ten days out, 19:00-22:00
    let date = (clock.now() + Duration::days(10)).date_naive();
    let event = service
        .create_event(
            organizer.clone(),
            EventDraft {
                name: "Harbour Lights".to_string(),
                description: "An evening of acoustic sets by the water".to_string(),
                date: date.format("%Y-%m-%d").to_string(),
                start_time: "19:00".to_string(),
                end_time: "22:00".to_string(),
                ticket_price: Money::from_cents(3_500),
                total_seats: 40,
            },
        )
        .context("creating event")?;
    info!(event_id = %event.id, starts = %format_instant(event.start_time), "Event on sale");

    let performance = service.perform(PerformanceAction::Add {
        organizer: organizer.clone(),
        event_id: event.id.clone(),
        performer: "The Lanterns".to_string(),
        start: parse_time_on(date, "19:00")?,
        end: parse_time_on(date, "20:00")?,
        songs: vec![
            "Low Tide".to_string(),
            "Paper Boats".to_string(),
            "Lighthouse".to_string(),
        ],
    })?;

    // Alice picks two seats and pays; Bob books one and never pays
    let mut selection = service.start_selection(&alice, &event.id, 2)?;
    selection.pick(3, 4)?;
    selection.pick(3, 5)?;
    let booking = service.register(alice.clone(), event.id.clone(), selection.into_positions())?;
    let outcome = service.checkout(alice.clone(), booking.id.clone(), PaymentMethod::CardPayment)?;
    info!(payment_id = %outcome.payment().id, amount = %outcome.payment().amount, "Alice paid");

    let abandoned = service.register(bob, event.id.clone(), vec![SeatPosition::new(1, 1)?])?;
    info!(
        available = service.available_seats(&event.id)?,
        "Seats left after bookings"
    );

    clock.advance(Duration::hours(25));
    let report = service.refresh()?;
    info!(
        expired = ?report.expired,
        bob_released = report.expired.contains(&abandoned.id),
        available = service.available_seats(&event.id)?,
        "Unpaid booking released after the grace period"
    );

    // Half an hour into the event
    clock.set(event.start_time + Duration::minutes(30));
    service.refresh()?;
    service.mark_attendance(alice.clone(), booking.id.clone())?;
    for song in performance.songs.iter().rev().take(2) {
        service.cast_vote(alice.clone(), booking.id.clone(), song.id.clone())?;
    }
    for tally in service.vote_results(&event.id)? {
        info!(
            rank = tally.rank,
            title = %tally.title,
            votes = tally.total_votes,
            share = format!("{:.1}%", tally.percentage),
            "Vote tally"
        );
    }

    clock.set(event.end_time + Duration::minutes(1));
    let report = service.refresh()?;
    let overview = service.event_overview(&event.id)?;
    info!(
        status = %overview.event.status,
        transitioned = report.transitioned.len(),
        revenue = %overview.revenue,
        paid = overview.paid_registrations,
        "Event closed"
    );

    Ok(())
}
