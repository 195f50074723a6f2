//! Provenance tracking for values inside one member body.
//!
//! Classifies each value-producing expression as `Local` (freshly allocated
//! within the member, never escaped) or `External` (reachable from a
//! parameter, a static location, or an unresolvable source), carrying the
//! most specific concrete type known for local values.
//!
//! Tracking is flow-insensitive and per-variable: the last assignment wins,
//! and a variable assigned from differing provenances is conservatively
//! poisoned to `External` for all later uses. No merge across branches is
//! attempted.

use std::collections::HashMap;

use crate::model::snapshot::Snapshot;
use crate::model::symbol::{Directive, MemberKind, MemberSymbol, TypeId};
use crate::model::syntax::Expr;

/// Where a value came from, relative to the member being analyzed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// Freshly allocated in this member; effects through it cannot escape.
    Local { concrete: Option<TypeId> },
    /// Reachable from a parameter, `this`, a static, or an unknown source.
    External,
}

impl Provenance {
    pub fn local(concrete: Option<TypeId>) -> Self {
        Provenance::Local { concrete }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Provenance::Local { .. })
    }

    /// The best known concrete type, for local values that carry one.
    pub fn concrete_type(&self) -> Option<&TypeId> {
        match self {
            Provenance::Local { concrete } => concrete.as_ref(),
            Provenance::External => None,
        }
    }
}

#[derive(Debug, Clone)]
struct VarState {
    provenance: Provenance,
    /// Set once a variable has seen assignments of differing provenance, or
    /// its value has been stored into an externally reachable location.
    poisoned: bool,
}

/// Per-member provenance state.
pub struct ProvenanceTracker<'a> {
    snapshot: &'a Snapshot,
    vars: HashMap<String, VarState>,
    this_provenance: Provenance,
}

impl<'a> ProvenanceTracker<'a> {
    /// In constructors the instance under construction has not escaped yet,
    /// so `this` is local with the containing type known exactly. Everywhere
    /// else `this` arrived from the caller.
    pub fn for_member(snapshot: &'a Snapshot, member: &MemberSymbol) -> Self {
        let this_provenance = if member.kind == MemberKind::Constructor {
            Provenance::local(Some(member.containing_type.clone()))
        } else {
            Provenance::External
        };
        Self {
            snapshot,
            vars: HashMap::new(),
            this_provenance,
        }
    }

    /// Record `let name = value` / reassignment of a local variable.
    pub fn assign(&mut self, name: &str, value: &Expr) {
        let incoming = self.provenance_of(value);
        match self.vars.get_mut(name) {
            Some(state) => {
                if state.poisoned {
                    return;
                }
                if state.provenance.is_local() != incoming.is_local() {
                    state.provenance = Provenance::External;
                    state.poisoned = true;
                } else {
                    state.provenance = incoming;
                }
            }
            None => {
                self.vars.insert(
                    name.to_string(),
                    VarState {
                        provenance: incoming,
                        poisoned: false,
                    },
                );
            }
        }
    }

    /// The variable's value was stored into an externally reachable location;
    /// downstream uses see it as escaped.
    pub fn mark_escaped(&mut self, name: &str) {
        let state = self.vars.entry(name.to_string()).or_insert(VarState {
            provenance: Provenance::External,
            poisoned: true,
        });
        state.provenance = Provenance::External;
        state.poisoned = true;
    }

    pub fn this_provenance(&self) -> &Provenance {
        &self.this_provenance
    }

    /// Classify an expression.
    pub fn provenance_of(&self, expr: &Expr) -> Provenance {
        match expr {
            Expr::Constant => Provenance::local(None),
            Expr::Local(name) => self
                .vars
                .get(name)
                .map(|s| s.provenance.clone())
                .unwrap_or(Provenance::External),
            Expr::Param(_) | Expr::StaticRead(_) => Provenance::External,
            Expr::This => self.this_provenance.clone(),
            // Reading out of any location is reading a value that may have
            // been put there from outside; only fresh allocations are local.
            Expr::FieldRead { .. } | Expr::Index { .. } => Provenance::External,
            Expr::New { ty, args, .. } => {
                if args.iter().all(|a| self.provenance_of(a).is_local()) {
                    Provenance::local(Some(ty.clone()))
                } else {
                    Provenance::External
                }
            }
            Expr::SequenceLit { elems } => {
                if elems.iter().all(|e| self.provenance_of(e).is_local()) {
                    Provenance::local(None)
                } else {
                    Provenance::External
                }
            }
            Expr::Cast { expr, .. } => self.provenance_of(expr),
            Expr::Call(call) => {
                let callee = match self.snapshot.member(&call.target) {
                    Some(m) => m,
                    None => return Provenance::External,
                };
                if callee.directive != Directive::ReturnsFreshObject {
                    return Provenance::External;
                }
                let receiver_local = call
                    .receiver
                    .as_deref()
                    .is_none_or(|r| self.provenance_of(r).is_local());
                let args_local = call.args.iter().all(|a| self.provenance_of(a).is_local());
                if receiver_local && args_local {
                    Provenance::local(callee.return_type.clone())
                } else {
                    Provenance::External
                }
            }
            // A fresh delegate object; captured state is the visitor's concern.
            Expr::Lambda { .. } => Provenance::local(None),
            Expr::Format { .. } => Provenance::External,
            Expr::Unsupported { .. } => Provenance::External,
        }
    }
}
