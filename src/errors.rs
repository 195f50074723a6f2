//! Error types for purity resolution.
//!
//! Resolution is conservative by default: conditions that prevent binding a
//! call to a concrete implementation never abort the run. They surface as an
//! `Impure` contribution carrying the matching [`ResolveError`] so the
//! diagnostic chain can explain why the member could not be proven pure.
//! Only programming-contract violations (snapshot misuse) panic.

use crate::model::symbol::SymbolId;
use thiserror::Error;

/// A condition that blocks precise resolution of a call or access.
///
/// These are not hard failures; the effect visitor folds them into the
/// member's verdict as `Impure` with a distinct reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The referenced member could not be bound (missing metadata, ambiguous
    /// overload, or a symbol absent from the snapshot).
    #[error("unresolvable symbol: {0}")]
    UnresolvableSymbol(SymbolId),

    /// A body contained a construct the analysis does not model.
    #[error("unsupported construct: {construct}")]
    UnsupportedConstruct { construct: String },

    /// The callee has no visible body and no directive to trust.
    #[error("opaque member without directive: {0}")]
    OpaqueMember(SymbolId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_with_context() {
        let err = ResolveError::UnsupportedConstruct {
            construct: "pointer-arithmetic".to_string(),
        };
        assert_eq!(err.to_string(), "unsupported construct: pointer-arithmetic");
    }
}
