//! Purity inference and pure-contract checking for object-oriented code
//! models.
//!
//! The host lowers its symbol graph and member bodies into a
//! [`model::Snapshot`], then asks a [`PurityResolver`] for per-member
//! verdicts or runs a [`PurityChecker`] over every `MarkedPure` member.
//! Verdicts live on a four-level lattice ([`Verdict`]); failures come with a
//! reason chain naming the operation that broke the contract.
//!
//! ```
//! use puremark::model::{MemberDef, Snapshot, SymbolId, TypeDef};
//! use puremark::model::syntax::{Expr, Stmt};
//! use puremark::{PurityResolver, Verdict};
//!
//! let snapshot = Snapshot::builder()
//!     .ty(TypeDef::new("Math"))
//!     .member(
//!         MemberDef::method("Math", "Add")
//!             .static_()
//!             .body(vec![Stmt::Return(Some(Expr::Constant))]),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let resolver = PurityResolver::new(&snapshot);
//! let resolution = resolver.resolve(&SymbolId::new("Math", "Add"));
//! assert_eq!(resolution.verdict, Verdict::Pure);
//! ```

pub mod analysis;
pub mod core;
pub mod diagnostics;
pub mod errors;
pub mod model;

pub use analysis::{
    EffectKind, PurityChecker, PurityResolver, ReasonChain, Resolution, Substitution,
};
pub use crate::core::{join_all, Verdict};
pub use diagnostics::{CollectSink, Diagnostic, DiagnosticSink};
pub use errors::ResolveError;
