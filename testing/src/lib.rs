//! # Box Office Testing
//!
//! Testing utilities and helpers for the Box Office engine.
//!
//! This crate provides:
//! - Mock implementations of environment traits (`FixedClock`)
//! - An in-memory record store with the JSON store's revision semantics
//! - A Given-When-Then harness for reducers
//! - Property-based testing strategies for instants and intervals
//!
//! ## Example
//!
//! ```ignore
//! use boxoffice_testing::{test_clock, InMemoryRecordStore};
//!
//! #[test]
//! fn booking_flow() {
//!     let store = InMemoryRecordStore::new();
//!     let env = TicketingEnvironment::new(
//!         Arc::new(test_clock()),
//!         PolicyConfig::default(),
//!         MockPaymentGateway::shared(),
//!     );
//!     let service = TicketingService::new(store.clone(), env);
//!
//!     let event = service.create_event(organizer, draft).unwrap();
//!     assert_eq!(event.status, EventStatus::Scheduled);
//!     assert_eq!(store.commit_count(), 1);
//! }
//! ```

use chrono::{DateTime, Utc};
use boxoffice_core::environment::Clock;

pub mod store_mocks;

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use boxoffice_testing::mocks::FixedClock;
    /// use boxoffice_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Test helpers and utilities.
pub mod helpers {
    use chrono::{DateTime, TimeZone, Utc};

    /// Build a UTC instant from calendar parts.
    ///
    /// # Panics
    ///
    /// Panics if the parts do not name a valid instant.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
            .single()
            .expect("test instant should be valid")
    }

    /// Route `tracing` output through the test harness, honoring `RUST_LOG`.
    ///
    /// Safe to call from every test; only the first call installs a subscriber.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;

    /// Minutes in the window the strategies draw from (one year).
    const SPAN_MINUTES: i64 = 365 * 24 * 60;

    fn origin() -> DateTime<Utc> {
        Utc.timestamp_opt(1_735_689_600, 0) // 2025-01-01T00:00:00Z
            .single()
            .unwrap_or_default()
    }

    /// Whole-minute instants within 2025.
    pub fn instant() -> impl Strategy<Value = DateTime<Utc>> {
        (0..SPAN_MINUTES).prop_map(|minutes| origin() + Duration::minutes(minutes))
    }

    /// Non-empty `[start, end)` intervals of up to `max_minutes`.
    pub fn interval(max_minutes: i64) -> impl Strategy<Value = (DateTime<Utc>, DateTime<Utc>)> {
        (instant(), 1..=max_minutes.max(1))
            .prop_map(|(start, length)| (start, start + Duration::minutes(length)))
    }

    /// Signed offsets, in minutes, for moving a clock around an instant.
    pub fn offset_minutes(max: i64) -> impl Strategy<Value = i64> {
        -max..=max
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
pub use reducer_test::{ReducerTest, assertions};
pub use store_mocks::InMemoryRecordStore;
