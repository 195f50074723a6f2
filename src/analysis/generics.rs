//! Generic-parameter effect rules.
//!
//! A member is never penalized for taking, storing, or passing along a value
//! of an unconstrained type parameter `T`. Only invoking an object-identity
//! or formatting member on such a value forces a decision:
//!
//! - when `T` is still the enclosing member's own open parameter, the
//!   contribution is deferred to the caller's eventual instantiation (pure at
//!   this level, re-resolved under the caller's substitution);
//! - when `T` is closed to a concrete type at the call site, the call
//!   resolves through virtual dispatch on that concrete type.
//!
//! Substitutions propagate caller to callee and participate in memo keys, so
//! the same generic member resolved under different instantiations yields
//! independent, correctly cached verdicts.

use std::collections::BTreeMap;

use crate::model::snapshot::Snapshot;
use crate::model::symbol::{MemberSymbol, TypeId};
use crate::model::syntax::TypeArg;

/// Normalized type-parameter substitution. Only closed parameters appear;
/// an absent entry means the parameter is still open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Substitution(BTreeMap<String, TypeId>);

impl Substitution {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, param: &str) -> Option<&TypeId> {
        self.0.get(param)
    }

    pub fn insert(&mut self, param: impl Into<String>, ty: TypeId) {
        self.0.insert(param.into(), ty);
    }

    /// Build the callee's substitution from the call's type arguments,
    /// closing pass-through parameters with the caller's own substitution.
    pub fn for_callee(caller: &Substitution, type_args: &[(String, TypeArg)]) -> Substitution {
        let mut result = Substitution::empty();
        for (param, arg) in type_args {
            match arg {
                TypeArg::Concrete(ty) => result.insert(param.clone(), ty.clone()),
                TypeArg::Param(caller_param) => {
                    if let Some(ty) = caller.get(caller_param) {
                        result.insert(param.clone(), ty.clone());
                    }
                }
            }
        }
        result
    }

    /// Drop entries for parameters the member does not declare, keeping memo
    /// keys canonical.
    pub fn restrict_to(&self, params: &[String]) -> Substitution {
        Substitution(
            self.0
                .iter()
                .filter(|(name, _)| params.iter().any(|p| p == *name))
                .map(|(name, ty)| (name.clone(), ty.clone()))
                .collect(),
        )
    }
}

/// How a call on a type-parameter-typed receiver resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeParamCall {
    /// Open parameter of the enclosing member: defer to the instantiation.
    Deferred,
    /// Closed at the call site: dispatch on this concrete type.
    Resolve(TypeId),
    /// Neither closable nor an identity/formatting member: cannot be bound.
    Unresolvable,
}

/// Classify a call to `member_name` on a receiver typed by type parameter
/// `param` inside `enclosing`, under the current substitution.
pub fn classify_type_param_call(
    snapshot: &Snapshot,
    enclosing: &MemberSymbol,
    subst: &Substitution,
    param: &str,
    member_name: &str,
) -> TypeParamCall {
    if let Some(concrete) = subst.get(param) {
        return TypeParamCall::Resolve(concrete.clone());
    }
    let is_own_param = enclosing.type_params.iter().any(|p| p == param);
    if is_own_param && snapshot.is_identity_member(member_name) {
        TypeParamCall::Deferred
    } else {
        TypeParamCall::Unresolvable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::snapshot::{MemberDef, TypeDef};
    use crate::model::symbol::SymbolId;

    fn snapshot() -> Snapshot {
        Snapshot::builder()
            .ty(TypeDef::new("Util"))
            .member(
                MemberDef::method("Util", "Describe")
                    .static_()
                    .type_params(["T"]),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn open_identity_call_defers() {
        let snap = snapshot();
        let member = snap.member(&SymbolId::new("Util", "Describe")).unwrap();
        let call = classify_type_param_call(&snap, member, &Substitution::empty(), "T", "ToString");
        assert_eq!(call, TypeParamCall::Deferred);
    }

    #[test]
    fn closed_param_resolves_concretely() {
        let snap = snapshot();
        let member = snap.member(&SymbolId::new("Util", "Describe")).unwrap();
        let mut subst = Substitution::empty();
        subst.insert("T", TypeId::new("Widget"));
        let call = classify_type_param_call(&snap, member, &subst, "T", "ToString");
        assert_eq!(call, TypeParamCall::Resolve(TypeId::new("Widget")));
    }

    #[test]
    fn non_identity_call_on_open_param_is_unresolvable() {
        let snap = snapshot();
        let member = snap.member(&SymbolId::new("Util", "Describe")).unwrap();
        let call = classify_type_param_call(&snap, member, &Substitution::empty(), "T", "Frobnicate");
        assert_eq!(call, TypeParamCall::Unresolvable);
    }

    #[test]
    fn callee_substitution_closes_pass_through_params() {
        let mut caller = Substitution::empty();
        caller.insert("T", TypeId::new("Widget"));
        let callee = Substitution::for_callee(
            &caller,
            &[
                ("U".to_string(), TypeArg::Param("T".to_string())),
                ("V".to_string(), TypeArg::Concrete(TypeId::new("Gadget"))),
            ],
        );
        assert_eq!(callee.get("U"), Some(&TypeId::new("Widget")));
        assert_eq!(callee.get("V"), Some(&TypeId::new("Gadget")));
    }

    #[test]
    fn open_pass_through_stays_open() {
        let callee = Substitution::for_callee(
            &Substitution::empty(),
            &[("U".to_string(), TypeArg::Param("T".to_string()))],
        );
        assert!(callee.get("U").is_none());
    }
}
