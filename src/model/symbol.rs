//! Symbol identities and member/type declarations.
//!
//! These are the shapes the host's symbol and type resolution service feeds
//! into a [`crate::model::snapshot::Snapshot`]. Symbols are immutable once
//! built; the analysis never mutates them.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Identity of a member: containing type plus member name.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId {
    pub type_name: String,
    pub member: String,
}

impl SymbolId {
    pub fn new(type_name: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            member: member.into(),
        }
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.type_name, self.member)
    }
}

/// Identity of a type in the snapshot.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(pub String);

impl TypeId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declared purity directive on a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Directive {
    /// No directive declared.
    None,
    /// Trust the annotation: the member is `Pure` regardless of its body.
    AssumePure,
    /// The checked obligation: a diagnostic is emitted iff the computed
    /// verdict is not `Pure`.
    MarkedPure,
    /// The member's return value is a fresh object the caller may treat as
    /// local, provided every input that could have produced it was local.
    ReturnsFreshObject,
}

/// Maps host attribute names onto [`Directive`] values.
///
/// Hosts with their own attribute vocabulary replace the default name sets.
#[derive(Debug, Clone)]
pub struct DirectiveConfig {
    pub marked_pure_names: HashSet<String>,
    pub assume_pure_names: HashSet<String>,
    pub returns_fresh_names: HashSet<String>,
}

static DEFAULT_MARKED_PURE: Lazy<HashSet<String>> =
    Lazy::new(|| ["IsPure"].iter().map(|s| s.to_string()).collect());
static DEFAULT_ASSUME_PURE: Lazy<HashSet<String>> =
    Lazy::new(|| ["AssumeIsPure"].iter().map(|s| s.to_string()).collect());
static DEFAULT_RETURNS_FRESH: Lazy<HashSet<String>> =
    Lazy::new(|| ["ReturnsNewObject"].iter().map(|s| s.to_string()).collect());

impl Default for DirectiveConfig {
    fn default() -> Self {
        Self {
            marked_pure_names: DEFAULT_MARKED_PURE.clone(),
            assume_pure_names: DEFAULT_ASSUME_PURE.clone(),
            returns_fresh_names: DEFAULT_RETURNS_FRESH.clone(),
        }
    }
}

impl DirectiveConfig {
    /// Classify a host attribute name; unrecognized names map to `None`.
    pub fn classify(&self, attribute_name: &str) -> Directive {
        if self.assume_pure_names.contains(attribute_name) {
            Directive::AssumePure
        } else if self.marked_pure_names.contains(attribute_name) {
            Directive::MarkedPure
        } else if self.returns_fresh_names.contains(attribute_name) {
            Directive::ReturnsFreshObject
        } else {
            Directive::None
        }
    }
}

/// What kind of member a symbol is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberKind {
    Method,
    Constructor,
    PropertyGetter,
    PropertySetter,
    Operator,
    Field,
}

/// Virtual-dispatch modifiers on a member declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dispatch {
    /// Statically bound; calls resolve to this declaration directly.
    NonVirtual,
    /// Virtual with a default body; overrides may exist below.
    Virtual,
    /// Abstract or interface-declared; no default body.
    Abstract,
    /// Overrides a base or interface member. A sealed override is a
    /// resolution point: no further override can exist below it.
    Override { sealed: bool },
    /// Explicit interface implementation, keyed by the interface member.
    ExplicitInterfaceImpl,
}

impl Dispatch {
    /// Whether a call through this declaration may land on another override.
    pub fn is_open(self) -> bool {
        matches!(
            self,
            Dispatch::Virtual | Dispatch::Abstract | Dispatch::Override { sealed: false }
        )
    }
}

/// A declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    /// `ref`/`out` style pass-by-reference; writing through it is an effect
    /// on the caller's graph.
    pub by_ref: bool,
}

impl Param {
    pub fn value(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            by_ref: false,
        }
    }

    pub fn by_ref(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            by_ref: true,
        }
    }
}

/// Source position for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: usize,
}

/// A member's body as exposed by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Source statements in the generic syntax tree.
    Source(Vec<crate::model::syntax::Stmt>),
    /// Pre-compiled, body-opaque member. Without a directive it is `Impure`.
    Opaque,
}

/// A member declaration: method, constructor, accessor, operator, or field.
#[derive(Debug, Clone)]
pub struct MemberSymbol {
    pub id: SymbolId,
    pub containing_type: TypeId,
    pub kind: MemberKind,
    pub is_static: bool,
    /// Fields only: `readonly`/`const` — reading it is always `Pure`.
    pub is_readonly: bool,
    pub directive: Directive,
    pub dispatch: Dispatch,
    /// The base or interface member this one overrides or implements.
    pub overrides: Option<SymbolId>,
    pub type_params: Vec<String>,
    pub params: Vec<Param>,
    /// Declared return type when the host knows it; used to carry a concrete
    /// type for `ReturnsFreshObject` results.
    pub return_type: Option<TypeId>,
    pub location: Option<SourceLocation>,
    pub body: Body,
}

impl MemberSymbol {
    /// Whether this field may be read without any effect contribution.
    pub fn is_immutable_field(&self) -> bool {
        self.kind == MemberKind::Field && self.is_readonly
    }
}

/// A type declaration with its place in the hierarchy.
#[derive(Debug, Clone)]
pub struct TypeSymbol {
    pub id: TypeId,
    pub base: Option<TypeId>,
    pub interfaces: Vec<TypeId>,
    /// Sealed types are resolution points: the runtime type of a value whose
    /// static type is sealed is known exactly.
    pub is_sealed: bool,
}
