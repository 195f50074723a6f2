//! Host-facing code model: symbols, syntax tree, and the immutable snapshot.

pub mod snapshot;
pub mod symbol;
pub mod syntax;

pub use snapshot::{MemberDef, Snapshot, SnapshotBuilder, TypeDef};
pub use symbol::{
    Body, Directive, DirectiveConfig, Dispatch, MemberKind, MemberSymbol, Param, SourceLocation,
    SymbolId, TypeId, TypeSymbol,
};
pub use syntax::{Call, EventOp, Expr, Place, StaticType, Stmt, TypeArg};
