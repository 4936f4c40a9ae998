//! Collection revisions for optimistic concurrency control.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Write counter of a persisted record collection.
///
/// A collection starts at revision 0 and moves forward by one on every commit
/// that changes it:
///
/// - A unit of work remembers the revision each collection was loaded at
/// - The commit names that revision as the expected one
/// - If another writer committed in between, the commit is refused
///
/// # Examples
///
/// ```
/// use boxoffice_core::Revision;
///
/// let r0 = Revision::INITIAL;
/// let r1 = r0.next();
/// assert_eq!(r1, Revision::new(1));
/// assert_eq!(r1.value(), 1);
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(u64);

impl Revision {
    /// The revision of a collection that has never been written.
    pub const INITIAL: Self = Self(0);

    /// Create a `Revision` with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the revision number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Get the next revision (current + 1).
    ///
    /// Saturates at `u64::MAX`, which no collection file will ever reach.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Check if the collection has never been written.
    #[must_use]
    pub const fn is_initial(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

impl From<u64> for Revision {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Revision> for u64 {
    fn from(revision: Revision) -> Self {
        revision.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_revision() {
        assert_eq!(Revision::INITIAL, Revision::new(0));
        assert_eq!(Revision::default(), Revision::INITIAL);
        assert!(Revision::INITIAL.is_initial());
    }

    #[test]
    fn next_revision() {
        let r1 = Revision::INITIAL.next();
        let r2 = r1.next();

        assert_eq!(r1, Revision::new(1));
        assert_eq!(r2, Revision::new(2));
        assert!(!r2.is_initial());
    }

    #[test]
    fn next_saturates() {
        assert_eq!(Revision::new(u64::MAX).next(), Revision::new(u64::MAX));
    }

    #[test]
    fn ordering() {
        assert!(Revision::new(1) < Revision::new(2));
        assert!(Revision::new(7) > Revision::INITIAL);
    }

    #[test]
    fn from_u64() {
        let revision = Revision::from(42_u64);
        assert_eq!(revision.value(), 42);

        let num: u64 = revision.into();
        assert_eq!(num, 42);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn serializes_as_plain_number() {
        let json = serde_json::to_string(&Revision::new(5)).unwrap();
        assert_eq!(json, "5");
        let back: Revision = serde_json::from_str("5").unwrap();
        assert_eq!(back, Revision::new(5));
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", Revision::new(42)), "r42");
    }
}
