//! Batch checking of declared purity contracts.
//!
//! Resolves every `MarkedPure` member in a snapshot and reports a diagnostic
//! for each one whose computed verdict is not `Pure`. Members are resolved in
//! parallel; the shared memo cache means overlapping call graphs are only
//! walked once. Diagnostics are reported in symbol order regardless of which
//! worker finished first.

use log::{debug, info};
use rayon::prelude::*;

use crate::analysis::effects::Resolution;
use crate::analysis::memo::PurityResolver;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::model::snapshot::Snapshot;
use crate::model::symbol::SymbolId;

/// Checks `MarkedPure` obligations over one snapshot.
pub struct PurityChecker<'a> {
    resolver: PurityResolver<'a>,
}

impl<'a> PurityChecker<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        Self {
            resolver: PurityResolver::new(snapshot),
        }
    }

    /// The underlying resolver, for hosts that also want raw verdicts.
    pub fn resolver(&self) -> &PurityResolver<'a> {
        &self.resolver
    }

    /// Resolve one member and build its diagnostic if the contract fails.
    /// `None` for members that resolved `Pure` or are not in the snapshot.
    pub fn check_member(&self, symbol: &SymbolId) -> Option<Diagnostic> {
        let member = self.resolver.snapshot().member(symbol)?;
        let resolution = self.resolver.resolve(symbol);
        if resolution.verdict.is_pure() {
            return None;
        }
        Some(Diagnostic {
            symbol: symbol.clone(),
            location: member.location.clone(),
            verdict: resolution.verdict,
            reason: resolution.worst,
        })
    }

    /// Check every `MarkedPure` member, reporting failures to `sink`.
    /// Returns the number of diagnostics reported.
    pub fn check_all(&self, sink: &dyn DiagnosticSink) -> usize {
        let mut marked: Vec<&SymbolId> = self
            .resolver
            .snapshot()
            .marked_pure_members()
            .map(|m| &m.id)
            .collect();
        marked.sort();
        info!("checking {} marked-pure member(s)", marked.len());

        let mut diagnostics: Vec<Diagnostic> = marked
            .par_iter()
            .filter_map(|symbol| self.check_member(symbol))
            .collect();
        diagnostics.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        debug!(
            "{} of {} marked-pure member(s) violated their contract",
            diagnostics.len(),
            marked.len()
        );
        let count = diagnostics.len();
        for diagnostic in diagnostics {
            sink.report(diagnostic);
        }
        count
    }

    /// Raw resolution of any member, marked or not.
    pub fn resolve(&self, symbol: &SymbolId) -> Resolution {
        self.resolver.resolve(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Verdict;
    use crate::diagnostics::CollectSink;
    use crate::model::snapshot::{MemberDef, TypeDef};
    use crate::model::syntax::{Expr, Place, Stmt};

    fn snapshot() -> Snapshot {
        Snapshot::builder()
            .ty(TypeDef::new("Math"))
            .member(
                MemberDef::method("Math", "Add")
                    .static_()
                    .marked_pure()
                    .body(vec![Stmt::Return(Some(Expr::Constant))]),
            )
            .member(MemberDef::field("Math", "calls").static_())
            .member(
                MemberDef::method("Math", "Count")
                    .static_()
                    .marked_pure()
                    .body(vec![Stmt::Increment {
                        target: Place::Static(SymbolId::new("Math", "calls")),
                    }]),
            )
            .member(
                MemberDef::method("Math", "Untracked")
                    .static_()
                    .body(vec![Stmt::Increment {
                        target: Place::Static(SymbolId::new("Math", "calls")),
                    }]),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn only_violating_marked_members_are_reported() {
        let snap = snapshot();
        let checker = PurityChecker::new(&snap);
        let sink = CollectSink::new();
        let count = checker.check_all(&sink);
        let diagnostics = sink.into_inner();
        assert_eq!(count, 1);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].symbol, SymbolId::new("Math", "Count"));
        assert_eq!(diagnostics[0].verdict, Verdict::Impure);
    }

    #[test]
    fn unmarked_members_never_produce_diagnostics() {
        let snap = snapshot();
        let checker = PurityChecker::new(&snap);
        let sink = CollectSink::new();
        checker.check_all(&sink);
        assert!(sink
            .into_inner()
            .iter()
            .all(|d| d.symbol != SymbolId::new("Math", "Untracked")));
    }

    #[test]
    fn check_member_is_none_for_pure_members() {
        let snap = snapshot();
        let checker = PurityChecker::new(&snap);
        assert!(checker.check_member(&SymbolId::new("Math", "Add")).is_none());
        assert!(checker
            .check_member(&SymbolId::new("Math", "Count"))
            .is_some());
    }
}
