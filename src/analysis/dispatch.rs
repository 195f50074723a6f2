//! Virtual dispatch resolution.
//!
//! Calls through virtual, abstract, or interface-declared members cannot be
//! bound by symbol reference alone. This resolver computes, for one call
//! expression, either the single implementation the runtime is guaranteed to
//! hit (receiver's concrete type known, sealed type, or sealed override) or
//! the conservative set of every implementation reachable from the declared
//! static type. The caller joins verdicts over that set, which is what makes
//! an upcast of a less-pure override surface in the enclosing member's
//! verdict.

use im::{HashMap, Vector};

use crate::model::snapshot::Snapshot;
use crate::model::symbol::{Dispatch, SymbolId, TypeId};

/// Outcome of resolving one call expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResolution {
    /// The single implementation the call provably lands on, when known.
    pub concrete: Option<SymbolId>,
    /// Statically reachable implementations, used when `concrete` is absent.
    pub targets: Vector<SymbolId>,
}

impl CallResolution {
    fn exact(id: SymbolId) -> Self {
        Self {
            concrete: Some(id),
            targets: Vector::new(),
        }
    }

    fn over(targets: Vector<SymbolId>) -> Self {
        Self {
            concrete: None,
            targets,
        }
    }

    /// Whether nothing at all could be bound.
    pub fn is_empty(&self) -> bool {
        self.concrete.is_none() && self.targets.is_empty()
    }
}

/// Resolves call targets against one snapshot.
///
/// Keeps a declared-member -> reachable-overrides index so repeated calls
/// through the same declaration do not re-walk the hierarchy.
pub struct DispatchResolver<'a> {
    snapshot: &'a Snapshot,
    reachable_cache: parking_lot::Mutex<HashMap<(SymbolId, TypeId), Vector<SymbolId>>>,
}

impl<'a> DispatchResolver<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        Self {
            snapshot,
            reachable_cache: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a call through `declared` given what is known about the
    /// receiver: its tracked concrete type (from provenance) and its static
    /// type (from the host's semantic model).
    pub fn resolve_call(
        &self,
        declared: &SymbolId,
        receiver_concrete: Option<&TypeId>,
        receiver_static: Option<&TypeId>,
    ) -> CallResolution {
        let Some(member) = self.snapshot.member(declared) else {
            return CallResolution::over(Vector::new());
        };

        // Statically bound declarations need no dispatch at all.
        if !member.dispatch.is_open() {
            return CallResolution::exact(declared.clone());
        }

        // Receiver's runtime type is provably known: the call lands on that
        // type's most-derived implementation.
        if let Some(concrete) = receiver_concrete {
            if let Some(resolved) = self.snapshot.resolve_for_concrete(declared, concrete) {
                return CallResolution::exact(resolved.id.clone());
            }
        }

        if let Some(static_ty) = receiver_static {
            // A sealed static type pins the runtime type without construction.
            if self.snapshot.is_sealed_type(static_ty) {
                if let Some(resolved) = self.snapshot.resolve_for_concrete(declared, static_ty) {
                    return CallResolution::exact(resolved.id.clone());
                }
            }
            // A sealed override inherited by the static type is a resolution
            // point too: nothing below it can override further.
            if let Some(resolved) = self.snapshot.resolve_for_concrete(declared, static_ty) {
                if resolved.dispatch == (Dispatch::Override { sealed: true }) {
                    return CallResolution::exact(resolved.id.clone());
                }
            }
        }

        let static_ty = receiver_static
            .cloned()
            .unwrap_or_else(|| member.containing_type.clone());
        CallResolution::over(self.reachable(declared, &static_ty))
    }

    fn reachable(&self, declared: &SymbolId, static_ty: &TypeId) -> Vector<SymbolId> {
        let key = (declared.clone(), static_ty.clone());
        if let Some(cached) = self.reachable_cache.lock().get(&key) {
            return cached.clone();
        }
        let targets: Vector<SymbolId> = self
            .snapshot
            .reachable_overrides(declared, static_ty)
            .into_iter()
            .map(|m| m.id.clone())
            .collect();
        self.reachable_cache.lock().insert(key, targets.clone());
        targets
    }
}
