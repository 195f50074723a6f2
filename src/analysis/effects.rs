//! Effect contributions and diagnostic reason chains.
//!
//! The effect visitor turns every primitive operation in a body into an
//! [`Effect`]: a verdict contribution plus the chain of calls/accesses that
//! explains it. A member's [`Resolution`] keeps the chain of the worst
//! contribution so a violating `MarkedPure` member can be pinpointed down to
//! the access that broke the contract.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::Verdict;
use crate::model::symbol::SymbolId;

/// What a single contribution was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    /// Read of a non-readonly static field or static auto-property.
    StaticRead(SymbolId),
    /// Write of a static field or static auto-property.
    StaticWrite(SymbolId),
    /// Write into a location reachable from the caller's graph.
    ExternalWrite { target: String },
    /// Write of an instance field of the member's own instance.
    InstanceWrite(SymbolId),
    /// Read of a mutable instance field of the member's own instance.
    InstanceRead(SymbolId),
    /// Raise, subscribe, or unsubscribe of an event.
    EventOperation(SymbolId),
    /// A call whose resolved verdict propagated into this member.
    Call(SymbolId),
    /// Callee with no visible body and no directive.
    OpaqueCallee(SymbolId),
    /// The referenced member could not be bound.
    UnresolvableSymbol(SymbolId),
    /// A construct the analysis does not model.
    UnsupportedConstruct { construct: String },
    /// Formatting member invoked at runtime cannot be bound statically.
    UnboundFormatting,
    /// Argument passed by `ref`/`out` into a location the caller observes.
    ByRefArgument { param: String },
    /// Write through the member's own `ref`/`out` parameter: the slot lives
    /// in the caller.
    ByRefParamWrite { param: String },
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectKind::StaticRead(s) => write!(f, "read of mutable static {s}"),
            EffectKind::StaticWrite(s) => write!(f, "write of static {s}"),
            EffectKind::ExternalWrite { target } => write!(f, "write of external {target}"),
            EffectKind::InstanceWrite(s) => write!(f, "write of own field {s}"),
            EffectKind::InstanceRead(s) => write!(f, "read of own mutable field {s}"),
            EffectKind::EventOperation(s) => write!(f, "event operation on {s}"),
            EffectKind::Call(s) => write!(f, "call of {s}"),
            EffectKind::OpaqueCallee(s) => write!(f, "call of opaque member {s}"),
            EffectKind::UnresolvableSymbol(s) => write!(f, "unresolvable symbol {s}"),
            EffectKind::UnsupportedConstruct { construct } => {
                write!(f, "unsupported construct `{construct}`")
            }
            EffectKind::UnboundFormatting => {
                f.write_str("formatting member cannot be bound statically")
            }
            EffectKind::ByRefArgument { param } => {
                write!(f, "by-ref argument through `{param}`")
            }
            EffectKind::ByRefParamWrite { param } => {
                write!(f, "write through by-ref parameter `{param}`")
            }
        }
    }
}

/// One hop of a reason chain: what happened, inside which member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonStep {
    pub symbol: SymbolId,
    pub kind: EffectKind,
}

/// The call/access path from the analyzed member down to the operation that
/// produced a contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonChain(pub Vec<ReasonStep>);

impl ReasonChain {
    pub fn single(symbol: SymbolId, kind: EffectKind) -> Self {
        Self(vec![ReasonStep { symbol, kind }])
    }

    /// Prefix this chain with a hop in the calling member.
    pub fn prefixed(mut self, symbol: SymbolId, kind: EffectKind) -> Self {
        self.0.insert(0, ReasonStep { symbol, kind });
        self
    }
}

impl fmt::Display for ReasonChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for step in &self.0 {
            if !first {
                f.write_str(" -> ")?;
            }
            write!(f, "{}: {}", step.symbol, step.kind)?;
            first = false;
        }
        Ok(())
    }
}

/// A single verdict contribution discovered inside a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Effect {
    pub verdict: Verdict,
    pub chain: ReasonChain,
}

impl Effect {
    pub fn new(verdict: Verdict, symbol: SymbolId, kind: EffectKind) -> Self {
        Self {
            verdict,
            chain: ReasonChain::single(symbol, kind),
        }
    }
}

/// The resolved verdict of a member, with the worst contribution's chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub verdict: Verdict,
    /// Absent iff the verdict is `Pure`. The first-discovered contribution
    /// reaching the final verdict, so output is stable across runs.
    pub worst: Option<ReasonChain>,
}

impl Resolution {
    pub fn pure() -> Self {
        Self {
            verdict: Verdict::Pure,
            worst: None,
        }
    }

    /// Fold a set of effects into the member's resolution, keeping the first
    /// chain that reaches the joined verdict.
    pub fn fold(effects: &[Effect]) -> Self {
        let verdict = crate::core::join_all(effects.iter().map(|e| e.verdict));
        if verdict == Verdict::Pure {
            return Self::pure();
        }
        let worst = effects
            .iter()
            .find(|e| e.verdict == verdict)
            .map(|e| e.chain.clone());
        Self { verdict, worst }
    }
}
