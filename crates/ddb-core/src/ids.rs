//! Identifier newtypes shared by every layer of the aggregator.
//!
//! Three id spaces exist: per-session local ids as reported by each GDB/MI
//! backend, and the aggregator's own global ids that stay stable across
//! sessions. [`crate::DdbError::UnknownId`] is returned rather than any id
//! being silently minted when a translation misses.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one attached GDB/MI debugger session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sid(pub u64);

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A thread id local to one session, as reported by that session's GDB/MI
/// backend. Not comparable across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocalTid(pub u64);

impl fmt::Display for LocalTid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A thread-group (inferior) id local to one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocalTgid(pub u64);

impl fmt::Display for LocalTgid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Global thread id, stable across the lifetime of the aggregator and
/// comparable across sessions. Bijective with `(Sid, LocalTid)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Gtid(pub u64);

impl fmt::Display for Gtid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Global thread-group (inferior) id. Bijective with `(Sid, LocalTgid)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Giid(pub u64);

impl fmt::Display for Giid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A GDB/MI command token, e.g. the `42` in `42-break-insert main`.
///
/// Represented as a string since tokens are carried verbatim through the
/// wire protocol and a user-supplied token may not be purely numeric.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Token(pub String);

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Token {
    fn from(value: u64) -> Self {
        Token(value.to_string())
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Token(value.to_owned())
    }
}

/// Monotonic, thread-safe allocator shared by all id/token generators.
///
/// Mirrors `TSCounter`/`CmdTokenGenerator` in the original: a single atomic
/// counter, started at zero, incremented with `Ordering::SeqCst` since
/// allocation order must be globally observable (two sessions racing to
/// mint a token must never collide).
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Creates a counter starting at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Atomically increments and returns the new value.
    pub fn increment(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns the next command token.
    pub fn next_token(&self) -> Token {
        Token::from(self.increment())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_is_monotonic() {
        let c = Counter::new();
        assert_eq!(c.increment(), 1);
        assert_eq!(c.increment(), 2);
        assert_eq!(c.increment(), 3);
    }

    #[test]
    fn token_from_u64_round_trips_display() {
        let t = Token::from(7u64);
        assert_eq!(t.to_string(), "7");
    }

    #[test]
    fn ids_compare_by_value() {
        assert!(Sid(1) < Sid(2));
        assert_eq!(Gtid(3), Gtid(3));
    }
}
