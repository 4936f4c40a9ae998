//! Fixtures shared by the box office integration tests

#![allow(dead_code)] // Each test binary uses a different subset
#![allow(clippy::unwrap_used)]

use std::path::Path;
use std::sync::Arc;

use boxoffice::aggregates::event::EventDraft;
use boxoffice::aggregates::TicketingEnvironment;
use boxoffice::payment_gateway::MockPaymentGateway;
use boxoffice::types::{Event, Money, SeatPosition, UserId};
use boxoffice::{PolicyConfig, TicketingService};
use boxoffice_core::environment::{Clock, SimulatedClock};
use boxoffice_store::JsonFileStore;
use boxoffice_testing::helpers::{init_test_tracing, utc};
use chrono::{DateTime, NaiveDate, Utc};

/// Where every scenario starts: 2025-01-01 09:00
pub fn opening_time() -> DateTime<Utc> {
    utc(2025, 1, 1, 9, 0)
}

pub fn organizer() -> UserId {
    UserId::new("organizer")
}

pub fn alice() -> UserId {
    UserId::new("alice")
}

pub fn bob() -> UserId {
    UserId::new("bob")
}

/// A box office over `dir` whose clock the test moves
pub struct Harness {
    pub clock: Arc<SimulatedClock>,
    pub service: TicketingService<JsonFileStore>,
}

impl Harness {
    pub fn open(dir: &Path) -> Self {
        init_test_tracing();
        let clock = Arc::new(SimulatedClock::new(opening_time()));
        let env = TicketingEnvironment::new(
            clock.clone(),
            PolicyConfig::default(),
            MockPaymentGateway::shared(),
        );
        let service = TicketingService::new(JsonFileStore::open(dir).unwrap(), env);
        Self { clock, service }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Create an event on `date`, 19:00-22:00, at $25 a seat
    pub fn create_event(&self, date: NaiveDate, total_seats: u32) -> Event {
        self.service
            .create_event(organizer(), draft(date, total_seats))
            .unwrap()
    }
}

pub fn draft(date: NaiveDate, total_seats: u32) -> EventDraft {
    EventDraft {
        name: "Harbour Lights".to_string(),
        description: "Acoustic sets by the water".to_string(),
        date: date.format("%Y-%m-%d").to_string(),
        start_time: "19:00".to_string(),
        end_time: "22:00".to_string(),
        ticket_price: Money::from_cents(2_500),
        total_seats,
    }
}

pub fn seats(positions: &[(u8, u8)]) -> Vec<SeatPosition> {
    positions
        .iter()
        .map(|&(row, column)| SeatPosition::new(row, column).unwrap())
        .collect()
}

/// Contents of every collection file in `dir`, by file name
pub fn read_collections(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files: Vec<(String, Vec<u8>)> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .map(|path| {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            (name, std::fs::read(&path).unwrap())
        })
        .collect();
    files.sort();
    files
}
