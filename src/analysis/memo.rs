//! Memoized call-graph fixpoint resolution.
//!
//! `PurityResolver` is the single entry point for verdicts. Every resolution
//! is cached per (symbol, substitution); recursive and mutually recursive
//! call chains are handled with an explicit mark-and-join fixpoint rather
//! than host-runtime recursion limits:
//!
//! - a call back into a symbol the current thread is already resolving is a
//!   cycle edge and optimistically contributes `Pure`;
//! - when the outermost member of a strongly connected component completes,
//!   every member of the component is finalized with the join of the
//!   component's provisional verdicts — the least fixpoint: a cycle is pure
//!   iff every member's non-recursive effects are pure.
//!
//! The cache is a concurrent map. A top-level resolution that meets an
//! `InProgress` entry blocks on that entry's completion; a thread already
//! holding claims of its own recomputes the entry within its own traversal
//! instead, because two traversals entering one recursive component from
//! different members would otherwise block on each other's gates forever.
//! Optimistic `Pure` still never leaks across thread boundaries. The cache
//! belongs to one snapshot; when the underlying source changes it is
//! discarded wholesale, never patched.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, trace};
use parking_lot::{Condvar, Mutex};

use crate::analysis::dispatch::DispatchResolver;
use crate::analysis::effects::{EffectKind, ReasonChain, Resolution};
use crate::analysis::generics::Substitution;
use crate::analysis::visitor::EffectVisitor;
use crate::errors::ResolveError;
use crate::model::snapshot::Snapshot;
use crate::model::symbol::{Body, Directive, SymbolId};

/// Cache key: a symbol together with the substitution it is resolved under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionKey {
    pub symbol: SymbolId,
    pub substitution: Substitution,
}

impl ResolutionKey {
    pub fn new(symbol: SymbolId, substitution: Substitution) -> Self {
        Self {
            symbol,
            substitution,
        }
    }
}

/// Completion gate other threads block on while an entry is in progress.
struct Gate {
    done: Mutex<Option<Resolution>>,
    cond: Condvar,
}

impl Gate {
    fn new() -> Self {
        Self {
            done: Mutex::new(None),
            cond: Condvar::new(),
        }
    }

    fn open(&self, resolution: Resolution) {
        *self.done.lock() = Some(resolution);
        self.cond.notify_all();
    }

    fn wait(&self) -> Resolution {
        let mut guard = self.done.lock();
        loop {
            if let Some(resolution) = guard.as_ref() {
                return resolution.clone();
            }
            self.cond.wait(&mut guard);
        }
    }
}

enum CacheEntry {
    InProgress { gate: Arc<Gate> },
    Resolved(Resolution),
}

/// A frame of the current thread's resolution stack.
struct Frame {
    key: ResolutionKey,
    index: usize,
    low: usize,
}

/// A member that finished visiting but belongs to a still-open strongly
/// connected component; finalized when the component's root completes.
struct Deferred {
    key: ResolutionKey,
    index: usize,
    resolution: Resolution,
    gate: Arc<Gate>,
}

/// Per-thread traversal state for one top-level resolution.
#[derive(Default)]
pub(crate) struct VisitState {
    next_index: usize,
    stack: Vec<Frame>,
    deferred: Vec<Deferred>,
}

impl VisitState {
    /// If `key` is already part of this thread's traversal, record the cycle
    /// edge, lower the caller's lowlink, and produce the edge's contribution:
    /// optimistic `Pure` for a frame still on the stack, the provisional
    /// resolution for a deferred member of the open component.
    fn note_back_edge(&mut self, key: &ResolutionKey) -> Option<Resolution> {
        let (index, contribution) = self
            .stack
            .iter()
            .find(|f| &f.key == key)
            .map(|f| (f.index, Resolution::pure()))
            .or_else(|| {
                self.deferred
                    .iter()
                    .find(|d| &d.key == key)
                    .map(|d| (d.index, d.resolution.clone()))
            })?;
        if let Some(frame) = self.stack.last_mut() {
            frame.low = frame.low.min(index);
        }
        Some(contribution)
    }
}

/// Memoized purity resolver over one immutable snapshot.
pub struct PurityResolver<'a> {
    snapshot: &'a Snapshot,
    dispatch: DispatchResolver<'a>,
    cache: DashMap<ResolutionKey, CacheEntry>,
}

impl<'a> PurityResolver<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        Self {
            snapshot,
            dispatch: DispatchResolver::new(snapshot),
            cache: DashMap::new(),
        }
    }

    pub fn snapshot(&self) -> &'a Snapshot {
        self.snapshot
    }

    pub(crate) fn dispatch(&self) -> &DispatchResolver<'a> {
        &self.dispatch
    }

    /// Resolve a non-generic member (or a generic one with all parameters
    /// left open).
    pub fn resolve(&self, symbol: &SymbolId) -> Resolution {
        self.resolve_instantiated(symbol, Substitution::empty())
    }

    /// Like [`PurityResolver::resolve`], but refuses symbols the snapshot
    /// cannot see into instead of classifying them conservatively. Hosts use
    /// this when a non-answer is more useful than a pessimistic `Impure`.
    pub fn try_resolve(&self, symbol: &SymbolId) -> Result<Resolution, ResolveError> {
        match self.snapshot.member(symbol) {
            None => Err(ResolveError::UnresolvableSymbol(symbol.clone())),
            Some(member)
                if member.body == Body::Opaque && member.directive == Directive::None =>
            {
                Err(ResolveError::OpaqueMember(symbol.clone()))
            }
            Some(_) => Ok(self.resolve(symbol)),
        }
    }

    /// Resolve a member under a concrete type-parameter substitution.
    pub fn resolve_instantiated(&self, symbol: &SymbolId, subst: Substitution) -> Resolution {
        let key = self.key_for(symbol, subst);
        let mut state = VisitState::default();
        let resolution = self.resolve_inner(key, &mut state);
        debug_assert!(state.stack.is_empty(), "resolution stack not drained");
        debug_assert!(state.deferred.is_empty(), "unfinalized cycle members");
        resolution
    }

    /// Number of cached resolutions.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_cache_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Drop every cached verdict. Used when the host rebuilds its snapshot;
    /// the cache is never incrementally patched.
    pub fn invalidate_all(&self) {
        self.cache.clear();
    }

    /// Canonicalize a key: substitutions only mention the member's own
    /// declared type parameters.
    pub(crate) fn key_for(&self, symbol: &SymbolId, subst: Substitution) -> ResolutionKey {
        let restricted = match self.snapshot.member(symbol) {
            Some(member) => subst.restrict_to(&member.type_params),
            None => Substitution::empty(),
        };
        ResolutionKey::new(symbol.clone(), restricted)
    }

    pub(crate) fn resolve_inner(
        &self,
        key: ResolutionKey,
        state: &mut VisitState,
    ) -> Resolution {
        // A key already on this thread's traversal is a cycle edge, whatever
        // the cache says about it.
        if let Some(contribution) = state.note_back_edge(&key) {
            debug!("cycle edge back into {}", key.symbol);
            return contribution;
        }

        enum Claim {
            Done(Resolution),
            Wait(Arc<Gate>),
            Recompute,
            Claimed(Arc<Gate>),
        }

        let claim = match self.cache.entry(key.clone()) {
            Entry::Occupied(occupied) => match occupied.get() {
                CacheEntry::Resolved(resolution) => Claim::Done(resolution.clone()),
                CacheEntry::InProgress { gate } => {
                    if state.stack.is_empty() {
                        Claim::Wait(gate.clone())
                    } else {
                        Claim::Recompute
                    }
                }
            },
            Entry::Vacant(vacant) => {
                let gate = Arc::new(Gate::new());
                vacant.insert(CacheEntry::InProgress { gate: gate.clone() });
                Claim::Claimed(gate)
            }
        };

        let gate = match claim {
            Claim::Done(resolution) => return resolution,
            Claim::Wait(gate) => {
                // Holding no claims of our own, blocking cannot close a
                // cross-thread wait cycle.
                trace!("waiting on concurrent resolution of {}", key.symbol);
                return gate.wait();
            }
            Claim::Recompute => {
                // Another thread holds this entry while we are mid-traversal.
                // Waiting could deadlock against a traversal that entered the
                // same recursive component from a different member, so we
                // compute the entry within our own traversal; the claimant
                // publishes the same result and both inserts are benign. The
                // placeholder gate has no waiters.
                trace!(
                    "recomputing {} held by a concurrent traversal",
                    key.symbol
                );
                Arc::new(Gate::new())
            }
            Claim::Claimed(gate) => gate,
        };

        let index = state.next_index;
        state.next_index += 1;
        state.stack.push(Frame {
            key: key.clone(),
            index,
            low: index,
        });
        trace!("resolving {} (depth {})", key.symbol, state.stack.len());

        let resolution = self.compute(&key, state);

        let frame = state
            .stack
            .pop()
            .unwrap_or_else(|| panic!("resolution stack underflow at {}", key.symbol));
        debug_assert_eq!(frame.key, key);

        if frame.low == frame.index {
            self.finalize_component(frame, resolution, gate, state)
        } else {
            // Part of a still-open component: propagate the lowlink and keep
            // the provisional result until the component's root completes.
            if let Some(parent) = state.stack.last_mut() {
                parent.low = parent.low.min(frame.low);
            }
            state.deferred.push(Deferred {
                key,
                index: frame.index,
                resolution: resolution.clone(),
                gate,
            });
            resolution
        }
    }

    /// Directive short-circuits, opaque handling, or a body visit.
    fn compute(&self, key: &ResolutionKey, state: &mut VisitState) -> Resolution {
        let Some(member) = self.snapshot.member(&key.symbol) else {
            return Resolution {
                verdict: crate::core::Verdict::Impure,
                worst: Some(ReasonChain::single(
                    key.symbol.clone(),
                    EffectKind::UnresolvableSymbol(key.symbol.clone()),
                )),
            };
        };

        if member.directive == Directive::AssumePure {
            return Resolution::pure();
        }

        match &member.body {
            Body::Source(stmts) => {
                EffectVisitor::analyze(self, state, member, &key.substitution, stmts)
            }
            Body::Opaque => {
                if member.directive == Directive::ReturnsFreshObject {
                    // Freshness annotations on body-opaque members are
                    // trusted the same way AssumePure is.
                    Resolution::pure()
                } else {
                    Resolution {
                        verdict: crate::core::Verdict::Impure,
                        worst: Some(ReasonChain::single(
                            key.symbol.clone(),
                            EffectKind::OpaqueCallee(key.symbol.clone()),
                        )),
                    }
                }
            }
        }
    }

    /// The component root finished: join provisional verdicts over the whole
    /// strongly connected component and publish every member's final result.
    fn finalize_component(
        &self,
        root: Frame,
        root_resolution: Resolution,
        root_gate: Arc<Gate>,
        state: &mut VisitState,
    ) -> Resolution {
        let split = state
            .deferred
            .iter()
            .position(|d| d.index >= root.index)
            .unwrap_or(state.deferred.len());
        let members: Vec<Deferred> = state.deferred.split_off(split);

        let verdict = members
            .iter()
            .map(|d| d.resolution.verdict)
            .fold(root_resolution.verdict, |acc, v| acc.join(v));

        let worst = if root_resolution.verdict == verdict {
            root_resolution.worst.clone()
        } else {
            members
                .iter()
                .find(|d| d.resolution.verdict == verdict)
                .and_then(|d| d.resolution.worst.clone())
        };

        if !members.is_empty() {
            debug!(
                "finalizing recursive component of {} member(s) rooted at {} as {}",
                members.len() + 1,
                root.key.symbol,
                verdict
            );
        }

        for deferred in members {
            let resolution = if deferred.resolution.verdict == verdict {
                deferred.resolution
            } else {
                Resolution {
                    verdict,
                    worst: worst.clone().map(|chain| {
                        let via = chain.0[0].symbol.clone();
                        chain.prefixed(deferred.key.symbol.clone(), EffectKind::Call(via))
                    }),
                }
            };
            self.cache
                .insert(deferred.key, CacheEntry::Resolved(resolution.clone()));
            deferred.gate.open(resolution);
        }

        let final_resolution = Resolution { verdict, worst };
        self.cache
            .insert(root.key, CacheEntry::Resolved(final_resolution.clone()));
        root_gate.open(final_resolution.clone());
        final_resolution
    }
}
