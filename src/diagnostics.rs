//! Diagnostics for violated purity contracts.
//!
//! A diagnostic is emitted for a `MarkedPure` member whose computed verdict
//! is anything but `Pure`. The attached reason chain walks the call path down
//! to the operation that broke the contract, so the report names the root
//! cause rather than just the annotated member.

use serde::{Deserialize, Serialize};
use std::fmt;

use parking_lot::Mutex;

use crate::analysis::effects::ReasonChain;
use crate::core::Verdict;
use crate::model::symbol::{SourceLocation, SymbolId};

/// One violated purity contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The `MarkedPure` member that failed its obligation.
    pub symbol: SymbolId,
    pub location: Option<SourceLocation>,
    /// The computed verdict (never `Pure`).
    pub verdict: Verdict,
    /// Why, down to the offending operation.
    pub reason: Option<ReasonChain>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{}:{}: ", location.file, location.line)?;
        }
        write!(
            f,
            "member {} is marked pure but resolved {}",
            self.symbol, self.verdict
        )?;
        if let Some(reason) = &self.reason {
            write!(f, " ({reason})")?;
        }
        Ok(())
    }
}

/// Where diagnostics go. Implementations must tolerate reports from multiple
/// worker threads.
pub trait DiagnosticSink: Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Accumulates diagnostics in memory; drain with [`CollectSink::into_inner`].
#[derive(Default)]
pub struct CollectSink {
    collected: Mutex<Vec<Diagnostic>>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> Vec<Diagnostic> {
        self.collected.into_inner()
    }
}

impl DiagnosticSink for CollectSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.collected.lock().push(diagnostic);
    }
}

/// Logs every diagnostic at warn level; useful when the host has no
/// reporting surface of its own.
#[derive(Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, diagnostic: Diagnostic) {
        log::warn!("{diagnostic}");
    }
}
