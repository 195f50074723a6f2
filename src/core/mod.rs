//! Core verdict lattice for purity analysis.
//!
//! Every member a host asks about resolves to one of four purity verdicts,
//! totally ordered from most to least pure:
//!
//! - `Pure`: no observable effect anywhere
//! - `PureExceptReadLocally`: may read mutable state of its own instance
//! - `PureExceptLocally`: may read or write mutable state of its own instance
//! - `Impure`: affects or depends on state outside the call's local universe
//!
//! A member's final verdict is the join (max) of all its constituent effect
//! contributions; `join` is associative, commutative, and idempotent.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Purity verdict for a member, ordered from most to least pure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// No observable effect anywhere.
    Pure,
    /// May read mutable state, but only state of the member's own instance.
    PureExceptReadLocally,
    /// May read or write mutable state of the member's own instance.
    PureExceptLocally,
    /// Affects or depends on static state, caller-supplied objects, events, or I/O.
    Impure,
}

impl Verdict {
    /// Least upper bound of two verdicts.
    pub fn join(self, other: Verdict) -> Verdict {
        self.max(other)
    }

    /// Lattice ordering: `a.leq(b)` means `a` is at least as pure as `b`.
    pub fn leq(self, other: Verdict) -> bool {
        self <= other
    }

    /// Whether this verdict satisfies a declared pure contract.
    pub fn is_pure(self) -> bool {
        self == Verdict::Pure
    }

    /// Convert to a human-readable string.
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Pure => "Pure",
            Verdict::PureExceptReadLocally => "Pure Except Read Locally",
            Verdict::PureExceptLocally => "Pure Except Locally",
            Verdict::Impure => "Impure",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fold an iterator of verdicts into their join, starting from `Pure`.
pub fn join_all<I: IntoIterator<Item = Verdict>>(verdicts: I) -> Verdict {
    verdicts
        .into_iter()
        .fold(Verdict::Pure, |acc, v| acc.join(v))
}
