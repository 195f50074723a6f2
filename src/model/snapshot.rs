//! Immutable snapshot of the symbol graph under analysis.
//!
//! A [`Snapshot`] is built once per compilation state through
//! [`SnapshotBuilder`] and never mutated afterwards; the resolver caches hang
//! off one snapshot and are discarded together with it when the underlying
//! source changes. The snapshot answers the type-relationship questions the
//! dispatch resolver needs: base-type walks, assignability, override-chain
//! roots, reachable overrides below a static type, and the most-derived
//! override for a known concrete type.

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

use crate::model::symbol::{
    Body, Directive, Dispatch, MemberKind, MemberSymbol, Param, SourceLocation, SymbolId, TypeId,
    TypeSymbol,
};
use crate::model::syntax::Stmt;

/// Member names treated as object-identity/formatting members: invoking one
/// of these on an unconstrained type parameter triggers dispatch resolution.
static DEFAULT_IDENTITY_MEMBERS: Lazy<HashSet<String>> = Lazy::new(|| {
    ["ToString", "GetHashCode", "Equals", "Format"]
        .iter()
        .map(|s| s.to_string())
        .collect()
});

/// Immutable symbol graph for one analysis run.
#[derive(Debug)]
pub struct Snapshot {
    members: HashMap<SymbolId, MemberSymbol>,
    types: HashMap<TypeId, TypeSymbol>,
    /// Root declaration -> every member in its override closure.
    override_closure: HashMap<SymbolId, Vec<SymbolId>>,
    identity_members: HashSet<String>,
}

impl Snapshot {
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::new()
    }

    pub fn member(&self, id: &SymbolId) -> Option<&MemberSymbol> {
        self.members.get(id)
    }

    pub fn type_symbol(&self, id: &TypeId) -> Option<&TypeSymbol> {
        self.types.get(id)
    }

    pub fn members(&self) -> impl Iterator<Item = &MemberSymbol> {
        self.members.values()
    }

    /// Members carrying the checked `MarkedPure` obligation.
    pub fn marked_pure_members(&self) -> impl Iterator<Item = &MemberSymbol> {
        self.members
            .values()
            .filter(|m| m.directive == Directive::MarkedPure)
    }

    pub fn is_identity_member(&self, name: &str) -> bool {
        self.identity_members.contains(name)
    }

    pub fn is_sealed_type(&self, id: &TypeId) -> bool {
        self.types.get(id).is_some_and(|t| t.is_sealed)
    }

    /// Whether `sub` is the same type as, derives from, or implements `sup`.
    pub fn is_assignable(&self, sub: &TypeId, sup: &TypeId) -> bool {
        if sub == sup {
            return true;
        }
        let Some(ty) = self.types.get(sub) else {
            return false;
        };
        if let Some(base) = &ty.base {
            if self.is_assignable(base, sup) {
                return true;
            }
        }
        ty.interfaces.iter().any(|i| self.is_assignable(i, sup))
    }

    /// Walk `overrides` links up to the original declaration.
    pub fn root_declaration<'a>(&'a self, id: &'a SymbolId) -> &'a SymbolId {
        let mut current = id;
        while let Some(member) = self.members.get(current) {
            match &member.overrides {
                Some(base) if self.members.contains_key(base) => current = base,
                _ => break,
            }
        }
        current
    }

    /// The implementation a call on a receiver of exactly `concrete` type
    /// lands on, or `None` when nothing non-abstract is found in its chain.
    pub fn resolve_for_concrete(
        &self,
        declared: &SymbolId,
        concrete: &TypeId,
    ) -> Option<&MemberSymbol> {
        let root = self.root_declaration(declared).clone();
        let mut current = Some(concrete.clone());
        while let Some(ty_id) = current {
            let ty = self.types.get(&ty_id)?;
            let found = self.members.values().find(|m| {
                m.containing_type == ty_id && self.root_declaration(&m.id) == &root
            });
            if let Some(member) = found {
                if member.dispatch == Dispatch::Abstract {
                    return None;
                }
                return Some(member);
            }
            current = ty.base.clone();
        }
        None
    }

    /// Every non-abstract implementation a call through `declared` on a
    /// receiver of static type `static_type` could dispatch to: the
    /// implementation the static type itself inherits, plus all overrides in
    /// types deriving from (or implementing) the static type.
    pub fn reachable_overrides(
        &self,
        declared: &SymbolId,
        static_type: &TypeId,
    ) -> Vec<&MemberSymbol> {
        let root = self.root_declaration(declared).clone();
        let mut seen: HashSet<&SymbolId> = HashSet::new();
        let mut result = Vec::new();

        if let Some(inherited) = self.resolve_for_concrete(declared, static_type) {
            if seen.insert(&inherited.id) {
                result.push(inherited);
            }
        }

        if let Some(closure) = self.override_closure.get(&root) {
            for id in closure {
                let Some(member) = self.members.get(id) else {
                    continue;
                };
                if member.dispatch == Dispatch::Abstract {
                    continue;
                }
                if self.is_assignable(&member.containing_type, static_type)
                    && seen.insert(&member.id)
                {
                    result.push(member);
                }
            }
        }

        result
    }

    /// The most-derived member named `name` declared on `ty` or inherited
    /// from one of its bases.
    pub fn member_named(&self, ty: &TypeId, name: &str) -> Option<&MemberSymbol> {
        let mut current = Some(ty.clone());
        while let Some(ty_id) = current {
            let type_symbol = self.types.get(&ty_id)?;
            if let Some(member) = self.members.get(&SymbolId::new(ty_id.0.clone(), name)) {
                return Some(member);
            }
            current = type_symbol.base.clone();
        }
        None
    }

    /// The formatting member a string interpolation of a `ty`-typed operand
    /// invokes, searched up the base chain. A formatting-interface member
    /// named `Format` wins over a plain `ToString`; a type declaring neither
    /// falls back to the effect-free root formatting.
    pub fn formatting_member(&self, ty: &TypeId) -> Option<&MemberSymbol> {
        ["Format", "ToString"]
            .iter()
            .find_map(|name| self.member_named(ty, name))
    }
}

/// Fluent builder for [`Snapshot`].
///
/// Validates referential integrity at `build` time: every member's containing
/// type and override target must exist.
pub struct SnapshotBuilder {
    members: Vec<MemberSymbol>,
    types: Vec<TypeSymbol>,
    identity_members: HashSet<String>,
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self {
            members: Vec::new(),
            types: Vec::new(),
            identity_members: DEFAULT_IDENTITY_MEMBERS.clone(),
        }
    }

    pub fn ty(mut self, def: TypeDef) -> Self {
        self.types.push(def.into_symbol());
        self
    }

    pub fn member(mut self, def: MemberDef) -> Self {
        self.members.push(def.into_symbol());
        self
    }

    /// Replace the identity/formatting member-name catalogue.
    pub fn identity_members<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.identity_members = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> Result<Snapshot> {
        let types: HashMap<TypeId, TypeSymbol> =
            self.types.into_iter().map(|t| (t.id.clone(), t)).collect();
        let members: HashMap<SymbolId, MemberSymbol> = self
            .members
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect();

        for member in members.values() {
            if !types.contains_key(&member.containing_type) {
                bail!(
                    "member {} declared on unknown type {}",
                    member.id,
                    member.containing_type
                );
            }
            if let Some(overridden) = &member.overrides {
                if !members.contains_key(overridden) {
                    bail!("member {} overrides unknown member {}", member.id, overridden);
                }
            }
        }

        let mut snapshot = Snapshot {
            members,
            types,
            override_closure: HashMap::new(),
            identity_members: self.identity_members,
        };

        let mut closure: HashMap<SymbolId, Vec<SymbolId>> = HashMap::new();
        for member in snapshot.members.values() {
            if member.overrides.is_some() {
                let root = snapshot.root_declaration(&member.id).clone();
                closure.entry(root).or_default().push(member.id.clone());
            }
        }
        // Deterministic dispatch joins regardless of map iteration order.
        for ids in closure.values_mut() {
            ids.sort();
        }
        snapshot.override_closure = closure;
        Ok(snapshot)
    }
}

/// Declarative type definition for the builder.
pub struct TypeDef {
    id: TypeId,
    base: Option<TypeId>,
    interfaces: Vec<TypeId>,
    is_sealed: bool,
}

impl TypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TypeId::new(name),
            base: None,
            interfaces: Vec::new(),
            is_sealed: false,
        }
    }

    pub fn base(mut self, name: impl Into<String>) -> Self {
        self.base = Some(TypeId::new(name));
        self
    }

    pub fn implements(mut self, name: impl Into<String>) -> Self {
        self.interfaces.push(TypeId::new(name));
        self
    }

    pub fn sealed(mut self) -> Self {
        self.is_sealed = true;
        self
    }

    fn into_symbol(self) -> TypeSymbol {
        TypeSymbol {
            id: self.id,
            base: self.base,
            interfaces: self.interfaces,
            is_sealed: self.is_sealed,
        }
    }
}

/// Declarative member definition for the builder.
pub struct MemberDef {
    id: SymbolId,
    kind: MemberKind,
    is_static: bool,
    is_readonly: bool,
    directive: Directive,
    dispatch: Dispatch,
    overrides: Option<SymbolId>,
    type_params: Vec<String>,
    params: Vec<Param>,
    return_type: Option<TypeId>,
    location: Option<SourceLocation>,
    body: Body,
}

impl MemberDef {
    fn new(type_name: impl Into<String>, member: impl Into<String>, kind: MemberKind) -> Self {
        Self {
            id: SymbolId::new(type_name, member),
            kind,
            is_static: false,
            is_readonly: false,
            directive: Directive::None,
            dispatch: Dispatch::NonVirtual,
            overrides: None,
            type_params: Vec::new(),
            params: Vec::new(),
            return_type: None,
            location: None,
            body: Body::Source(Vec::new()),
        }
    }

    pub fn method(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(type_name, name, MemberKind::Method)
    }

    pub fn ctor(type_name: impl Into<String>) -> Self {
        Self::new(type_name, ".ctor", MemberKind::Constructor)
    }

    pub fn getter(type_name: impl Into<String>, property: impl Into<String>) -> Self {
        Self::new(type_name, property, MemberKind::PropertyGetter)
    }

    pub fn setter(type_name: impl Into<String>, property: impl Into<String>) -> Self {
        Self::new(type_name, property, MemberKind::PropertySetter)
    }

    pub fn operator(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(type_name, name, MemberKind::Operator)
    }

    pub fn field(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(type_name, name, MemberKind::Field)
    }

    pub fn static_(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.is_readonly = true;
        self
    }

    pub fn directive(mut self, directive: Directive) -> Self {
        self.directive = directive;
        self
    }

    pub fn marked_pure(self) -> Self {
        self.directive(Directive::MarkedPure)
    }

    pub fn assume_pure(self) -> Self {
        self.directive(Directive::AssumePure)
    }

    pub fn returns_fresh(self) -> Self {
        self.directive(Directive::ReturnsFreshObject)
    }

    pub fn virtual_(mut self) -> Self {
        self.dispatch = Dispatch::Virtual;
        self
    }

    pub fn abstract_(mut self) -> Self {
        self.dispatch = Dispatch::Abstract;
        self.body = Body::Opaque;
        self
    }

    pub fn override_of(mut self, base: SymbolId) -> Self {
        self.dispatch = Dispatch::Override { sealed: false };
        self.overrides = Some(base);
        self
    }

    pub fn sealed_override_of(mut self, base: SymbolId) -> Self {
        self.dispatch = Dispatch::Override { sealed: true };
        self.overrides = Some(base);
        self
    }

    pub fn explicit_impl_of(mut self, interface_member: SymbolId) -> Self {
        self.dispatch = Dispatch::ExplicitInterfaceImpl;
        self.overrides = Some(interface_member);
        self
    }

    pub fn type_params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.type_params = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn params(mut self, params: Vec<Param>) -> Self {
        self.params = params;
        self
    }

    pub fn returns(mut self, ty: impl Into<String>) -> Self {
        self.return_type = Some(TypeId::new(ty));
        self
    }

    pub fn at(mut self, file: impl Into<String>, line: usize) -> Self {
        self.location = Some(SourceLocation {
            file: file.into(),
            line,
        });
        self
    }

    pub fn body(mut self, stmts: Vec<Stmt>) -> Self {
        self.body = Body::Source(stmts);
        self
    }

    pub fn opaque(mut self) -> Self {
        self.body = Body::Opaque;
        self
    }

    fn into_symbol(self) -> MemberSymbol {
        let containing_type = TypeId::new(self.id.type_name.clone());
        MemberSymbol {
            id: self.id,
            containing_type,
            kind: self.kind,
            is_static: self.is_static,
            is_readonly: self.is_readonly,
            directive: self.directive,
            dispatch: self.dispatch,
            overrides: self.overrides,
            type_params: self.type_params,
            params: self.params,
            return_type: self.return_type,
            location: self.location,
            body: self.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hierarchy() -> Snapshot {
        Snapshot::builder()
            .ty(TypeDef::new("Animal"))
            .ty(TypeDef::new("Dog").base("Animal"))
            .ty(TypeDef::new("Puppy").base("Dog").sealed())
            .member(MemberDef::method("Animal", "Speak").virtual_())
            .member(
                MemberDef::method("Dog", "Speak").override_of(SymbolId::new("Animal", "Speak")),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn assignability_walks_base_chain() {
        let snapshot = hierarchy();
        assert!(snapshot.is_assignable(&TypeId::new("Puppy"), &TypeId::new("Animal")));
        assert!(snapshot.is_assignable(&TypeId::new("Dog"), &TypeId::new("Dog")));
        assert!(!snapshot.is_assignable(&TypeId::new("Animal"), &TypeId::new("Dog")));
    }

    #[test]
    fn concrete_resolution_finds_most_derived() {
        let snapshot = hierarchy();
        let resolved = snapshot
            .resolve_for_concrete(&SymbolId::new("Animal", "Speak"), &TypeId::new("Puppy"))
            .unwrap();
        assert_eq!(resolved.id, SymbolId::new("Dog", "Speak"));
    }

    #[test]
    fn reachable_overrides_include_inherited_default() {
        let snapshot = hierarchy();
        let reachable =
            snapshot.reachable_overrides(&SymbolId::new("Animal", "Speak"), &TypeId::new("Animal"));
        let ids: Vec<_> = reachable.iter().map(|m| m.id.clone()).collect();
        assert!(ids.contains(&SymbolId::new("Animal", "Speak")));
        assert!(ids.contains(&SymbolId::new("Dog", "Speak")));
    }

    #[test]
    fn root_declaration_walks_override_links() {
        let snapshot = hierarchy();
        let dog_speak = SymbolId::new("Dog", "Speak");
        let root = snapshot.root_declaration(&dog_speak);
        assert_eq!(root, &SymbolId::new("Animal", "Speak"));
    }

    #[test]
    fn member_named_walks_the_base_chain() {
        let snapshot = hierarchy();
        let speak = snapshot
            .member_named(&TypeId::new("Puppy"), "Speak")
            .unwrap();
        assert_eq!(speak.id, SymbolId::new("Dog", "Speak"));
        assert!(snapshot
            .member_named(&TypeId::new("Puppy"), "Fetch")
            .is_none());
    }

    #[test]
    fn build_rejects_dangling_override() {
        let result = Snapshot::builder()
            .ty(TypeDef::new("A"))
            .member(MemberDef::method("A", "M").override_of(SymbolId::new("B", "M")))
            .build();
        assert!(result.is_err());
    }
}
