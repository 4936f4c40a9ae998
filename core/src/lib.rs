//! # Box Office Core
//!
//! Core traits and types for the Box Office ticketing engine.
//!
//! The engine follows a "functional core, imperative shell" layout:
//!
//! - **State**: every record collection loaded for one unit of work
//! - **Action**: a command issued by a customer, organizer or the clock
//! - **Reducer**: pure function `(State, Action, Environment) → Output`
//! - **Environment**: injected dependencies (the clock above all)
//!
//! The imperative shell (see the `boxoffice` crate) loads state from the
//! record store, runs a reducer and commits whatever changed.
//!
//! ## Example
//!
//! ```ignore
//! use boxoffice_core::reducer::Reducer;
//!
//! impl Reducer for RefundReducer {
//!     type State = TicketingState;
//!     type Action = RefundAction;
//!     type Environment = TicketingEnvironment;
//!     type Output = Result<Refund, TicketingError>;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut TicketingState,
//!         action: RefundAction,
//!         env: &TicketingEnvironment,
//!     ) -> Self::Output {
//!         // Validate against state, then mutate it
//!         todo!()
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod revision;

pub use revision::Revision;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → Output`.
/// They contain all business rules and are deterministic given the clock
/// in their environment.
pub mod reducer {
    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    /// - `Output`: What the caller learns about the outcome, usually a
    ///   `Result` whose error names the invariant that blocked the action
    ///
    /// # Contract
    ///
    /// A reducer that rejects an action must leave `state` untouched. The shell
    /// relies on this to skip the commit of a rejected unit of work.
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// The outcome reported back to the caller
        type Output;

        /// Reduce an action into state changes
        ///
        /// 1. Validates the action against the current state
        /// 2. Updates state in place
        /// 3. Reports the outcome
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Self::Output;
    }
}

/// Environment module - Dependency injection traits
///
/// Time is never read from an ambient source inside the engine. Every
/// reducer asks its environment's [`Clock`](environment::Clock), which in the
/// application is a user-settable [`SimulatedClock`](environment::SimulatedClock).
pub mod environment {
    use chrono::{DateTime, Duration, Utc};
    use std::sync::{PoisonError, RwLock};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use boxoffice_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let _now = clock.now();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Application time that only moves when told to.
    ///
    /// Operators jump the box office forward to watch events open, run and
    /// close without waiting for the wall clock.
    ///
    /// # Examples
    ///
    /// ```
    /// use boxoffice_core::environment::{Clock, SimulatedClock};
    /// use chrono::{Duration, TimeZone, Utc};
    ///
    /// let start = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
    /// let clock = SimulatedClock::new(start);
    /// clock.advance(Duration::hours(25));
    /// assert_eq!(clock.now(), start + Duration::hours(25));
    /// ```
    #[derive(Debug)]
    pub struct SimulatedClock {
        time: RwLock<DateTime<Utc>>,
    }

    impl SimulatedClock {
        /// Create a simulated clock frozen at `time`
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: RwLock::new(time),
            }
        }

        /// Jump to an absolute time (forwards or backwards)
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.write().unwrap_or_else(PoisonError::into_inner) = time;
        }

        /// Move the clock forward by `by`
        pub fn advance(&self, by: Duration) {
            let mut guard = self.time.write().unwrap_or_else(PoisonError::into_inner);
            *guard += by;
        }
    }

    impl Clock for SimulatedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap_or_else(PoisonError::into_inner)
        }
    }
}
