//! The purity analysis pipeline.
//!
//! [`effects`] defines contributions and resolutions, [`provenance`] tracks
//! where values come from, [`dispatch`] binds virtual calls, [`generics`]
//! handles type-parameter receivers, the effect visitor classifies member
//! bodies,
//! [`memo`] caches and fixpoints the call graph, and [`checker`] drives batch
//! contract checking.

pub mod checker;
pub mod dispatch;
pub mod effects;
pub mod generics;
pub mod memo;
pub mod provenance;
mod visitor;

pub use checker::PurityChecker;
pub use dispatch::{CallResolution, DispatchResolver};
pub use effects::{Effect, EffectKind, ReasonChain, ReasonStep, Resolution};
pub use generics::{Substitution, TypeParamCall};
pub use memo::{PurityResolver, ResolutionKey};
pub use provenance::{Provenance, ProvenanceTracker};
