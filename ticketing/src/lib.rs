//! Box Office - a ticketed event lifecycle engine
//!
//! Organizers create events and their performance lineups; customers pick
//! seats on a 10x10 grid, pay, ask for refunds, check in and vote for songs
//! while the event runs. Everything is persisted as one JSON document per
//! record collection.
//!
//! # Architecture
//!
//! ```text
//!   command ──► TicketingService ──► lock ─► load ─► status pass ─► reducer ─► commit
//!                      │                                                         │
//!                      ▼                                                         ▼
//!                  queries (load + status pass, no write)            RecordStore (JSON files,
//!                                                                    revision-checked)
//! ```
//!
//! - [`aggregates`]: one reducer per command family over [`TicketingState`]
//! - [`service`]: units of work against a [`boxoffice_store::RecordStore`]
//! - [`types`]: records, identifiers, money and seats
//!
//! # Key Features
//!
//! ## 1. Time is an input
//!
//! Event status is derived from the clock on every unit of work
//! (SCHEDULED → ONGOING → COMPLETED, CANCELLED is absorbing). The clock is an
//! environment dependency, so a simulated clock drives the whole lifecycle:
//!
//! ```text
//! now < start          SCHEDULED   booking open
//! start <= now <= end  ONGOING     check-in and voting open
//! now > end            COMPLETED   no-shows recorded ABSENT
//! ```
//!
//! ## 2. Seats are held from booking
//!
//! A booking holds its seats until it is paid, withdrawn, or left unpaid past
//! the grace period. Two bookings can never hold the same seat.
//!
//! ## 3. Rejections never write
//!
//! Reducers validate before they mutate, and a rejected command commits
//! nothing.
//!
//! # Usage
//!
//! See the [`aggregates`] module for reducer implementations and tests, and
//! the `boxoffice` binary for a scripted walk through an event's lifecycle.

#![forbid(unsafe_code)]

pub mod aggregates;
pub mod config;
pub mod error;
pub mod metrics;
pub mod payment_gateway;
pub mod service;
pub mod state;
pub mod time;
pub mod types;

pub use config::{Config, EarlyCheckIn, PolicyConfig};
pub use error::TicketingError;
pub use service::TicketingService;
pub use state::TicketingState;
