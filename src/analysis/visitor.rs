//! The effect visitor: classifies every primitive operation in one member
//! body into a verdict contribution.
//!
//! The visitor walks the body once, consulting the provenance tracker for
//! every receiver, the dispatch resolver for every call, the generic
//! resolver for type-parameter receivers, and the memoizer for callee
//! verdicts. All contributions fold with the lattice join; the worst
//! contribution's call/access chain is kept for diagnostics.

use log::trace;

use crate::analysis::dispatch::CallResolution;
use crate::analysis::effects::{Effect, EffectKind, ReasonChain, Resolution};
use crate::analysis::generics::{classify_type_param_call, Substitution, TypeParamCall};
use crate::analysis::memo::{PurityResolver, VisitState};
use crate::analysis::provenance::{Provenance, ProvenanceTracker};
use crate::core::Verdict;
use crate::model::symbol::{MemberKind, MemberSymbol, SymbolId, TypeId};
use crate::model::syntax::{Call, Expr, Place, StaticType, Stmt};

/// What kind of receiver a call or access goes through.
enum Receiver {
    /// No receiver: a static call or access.
    Static,
    /// The member's own instance (outside constructors).
    This,
    /// A value that never escaped this member.
    Local,
    /// A caller-supplied or otherwise escaped value.
    External,
}

pub(crate) struct EffectVisitor<'a, 'b> {
    resolver: &'b PurityResolver<'a>,
    state: &'b mut VisitState,
    member: &'b MemberSymbol,
    subst: &'b Substitution,
    provenance: ProvenanceTracker<'a>,
    effects: Vec<Effect>,
}

impl<'a, 'b> EffectVisitor<'a, 'b> {
    pub(crate) fn analyze(
        resolver: &'b PurityResolver<'a>,
        state: &'b mut VisitState,
        member: &'b MemberSymbol,
        subst: &'b Substitution,
        body: &[Stmt],
    ) -> Resolution {
        let provenance = ProvenanceTracker::for_member(resolver.snapshot(), member);
        let mut visitor = Self {
            resolver,
            state,
            member,
            subst,
            provenance,
            effects: Vec::new(),
        };
        visitor.visit_stmts(body);
        Resolution::fold(&visitor.effects)
    }

    fn push(&mut self, verdict: Verdict, kind: EffectKind) {
        trace!("{}: {} -> {}", self.member.id, kind, verdict);
        self.effects
            .push(Effect::new(verdict, self.member.id.clone(), kind));
    }

    fn visit_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.visit_stmt(stmt);
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(expr) => self.visit_expr(expr),
            Stmt::Let { name, value } => {
                self.visit_expr(value);
                self.provenance.assign(name, value);
            }
            Stmt::Assign { target, value } => {
                self.visit_expr(value);
                self.visit_write(target, Some(value));
            }
            Stmt::Increment { target } => {
                self.visit_read_of_place(target);
                self.visit_write(target, None);
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                self.visit_expr(cond);
                self.visit_stmts(then_body);
                self.visit_stmts(else_body);
            }
            Stmt::Loop { cond, body } => {
                if let Some(cond) = cond {
                    self.visit_expr(cond);
                }
                self.visit_stmts(body);
            }
            Stmt::Return(expr) | Stmt::Throw(expr) => {
                if let Some(expr) = expr {
                    self.visit_expr(expr);
                }
            }
            Stmt::Yield(expr) => self.visit_expr(expr),
            Stmt::Event { event, .. } => {
                self.push(Verdict::Impure, EffectKind::EventOperation(event.clone()));
            }
            Stmt::Unsupported { construct } => {
                self.push(
                    Verdict::Impure,
                    EffectKind::UnsupportedConstruct {
                        construct: construct.clone(),
                    },
                );
            }
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Constant | Expr::Local(_) | Expr::Param(_) | Expr::This => {}
            Expr::StaticRead(symbol) => self.visit_static_read(symbol),
            Expr::FieldRead { receiver, field } => {
                self.visit_expr(receiver);
                self.visit_field_read(receiver, field);
            }
            Expr::Index { receiver, index } => {
                self.visit_expr(receiver);
                self.visit_expr(index);
                self.visit_index_read(receiver);
            }
            Expr::Call(call) => self.visit_call(call),
            Expr::New { ty, ctor, args } => {
                for arg in args {
                    self.visit_expr(arg);
                }
                self.visit_construction(ty, ctor.as_ref());
            }
            Expr::SequenceLit { elems } => {
                for elem in elems {
                    self.visit_expr(elem);
                }
            }
            // Casting is never an effect by itself.
            Expr::Cast { expr, .. } => self.visit_expr(expr),
            Expr::Format {
                operand,
                operand_type,
            } => {
                self.visit_expr(operand);
                self.visit_format(operand, operand_type.as_ref());
            }
            Expr::Lambda { body, .. } => {
                // Effects inside the closure count against the enclosing
                // member; laziness of invocation does not change verdicts.
                self.visit_stmts(body);
            }
            Expr::Unsupported { construct } => {
                self.push(
                    Verdict::Impure,
                    EffectKind::UnsupportedConstruct {
                        construct: construct.clone(),
                    },
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    fn visit_static_read(&mut self, symbol: &SymbolId) {
        match self.resolver.snapshot().member(symbol) {
            Some(member) if member.is_readonly => {}
            Some(_) => self.push(Verdict::Impure, EffectKind::StaticRead(symbol.clone())),
            None => self.push(
                Verdict::Impure,
                EffectKind::UnresolvableSymbol(symbol.clone()),
            ),
        }
    }

    fn visit_field_read(&mut self, receiver: &Expr, field: &SymbolId) {
        match self.classify_receiver(Some(receiver)) {
            Receiver::This => {
                let readonly = self
                    .resolver
                    .snapshot()
                    .member(field)
                    .is_some_and(|m| m.is_readonly);
                if !readonly {
                    self.push(
                        Verdict::PureExceptReadLocally,
                        EffectKind::InstanceRead(field.clone()),
                    );
                }
            }
            // Reading externally-supplied state is not itself an effect, and
            // reads of a local object's state cannot be observed at all.
            Receiver::Local | Receiver::External | Receiver::Static => {}
        }
    }

    /// Reading own state through an indexer follows the field-read rule;
    /// element reads out of any other receiver are effect-free.
    fn visit_index_read(&mut self, receiver: &Expr) {
        if matches!(self.classify_receiver(Some(receiver)), Receiver::This) {
            self.push(
                Verdict::PureExceptReadLocally,
                EffectKind::InstanceRead(SymbolId::new(
                    self.member.id.type_name.clone(),
                    "[item]",
                )),
            );
        }
    }

    fn visit_read_of_place(&mut self, place: &Place) {
        match place {
            Place::Local(_) => {}
            Place::Static(symbol) => self.visit_static_read(symbol),
            Place::Field { receiver, field } => {
                self.visit_expr(receiver);
                self.visit_field_read(receiver, field);
            }
            Place::Index { receiver, index } => {
                self.visit_expr(receiver);
                self.visit_expr(index);
                self.visit_index_read(receiver);
            }
        }
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    fn visit_write(&mut self, place: &Place, value: Option<&Expr>) {
        match place {
            Place::Local(name) => {
                // A ref/out parameter slot belongs to the caller.
                if self.member.params.iter().any(|p| p.by_ref && p.name == *name) {
                    self.push(
                        Verdict::Impure,
                        EffectKind::ByRefParamWrite {
                            param: name.clone(),
                        },
                    );
                    self.escape_if_local(value);
                } else if let Some(value) = value {
                    self.provenance.assign(name, value);
                }
            }
            Place::Static(symbol) => {
                self.push(Verdict::Impure, EffectKind::StaticWrite(symbol.clone()));
                self.escape_if_local(value);
            }
            Place::Field { receiver, field } => {
                self.visit_expr(receiver);
                match self.classify_receiver(Some(receiver)) {
                    Receiver::This => {
                        self.push(
                            Verdict::PureExceptLocally,
                            EffectKind::InstanceWrite(field.clone()),
                        );
                        // The instance outlives the call, so the stored
                        // value is reachable after we return.
                        self.escape_if_local(value);
                    }
                    Receiver::Local => {
                        // Writing a field of an object that never escaped is
                        // invisible to the caller.
                    }
                    Receiver::External | Receiver::Static => {
                        self.push(
                            Verdict::Impure,
                            EffectKind::ExternalWrite {
                                target: field.to_string(),
                            },
                        );
                        self.escape_if_local(value);
                    }
                }
            }
            Place::Index { receiver, index } => {
                self.visit_expr(receiver);
                self.visit_expr(index);
                match self.classify_receiver(Some(receiver)) {
                    Receiver::This => {
                        self.push(
                            Verdict::PureExceptLocally,
                            EffectKind::InstanceWrite(SymbolId::new(
                                self.member.id.type_name.clone(),
                                "[item]",
                            )),
                        );
                        self.escape_if_local(value);
                    }
                    Receiver::Local => {}
                    Receiver::External | Receiver::Static => {
                        self.push(
                            Verdict::Impure,
                            EffectKind::ExternalWrite {
                                target: "indexed element".to_string(),
                            },
                        );
                        self.escape_if_local(value);
                    }
                }
            }
        }
    }

    /// Storing a local value into an externally reachable location escapes
    /// it: downstream uses of the variable see `External`.
    fn escape_if_local(&mut self, value: Option<&Expr>) {
        match value.map(strip_casts) {
            Some(Expr::Local(name)) => {
                if self.provenance.provenance_of(&Expr::Local(name.clone())).is_local() {
                    self.provenance.mark_escaped(name);
                }
            }
            // A closure leaving the member takes its captured locals along.
            Some(Expr::Lambda { captures, .. }) => {
                for name in captures {
                    self.provenance.mark_escaped(name);
                }
            }
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    fn visit_call(&mut self, call: &Call) {
        if let Some(receiver) = call.receiver.as_deref() {
            self.visit_expr(receiver);
        }
        for arg in &call.args {
            self.visit_expr(arg);
        }
        self.visit_by_ref_args(call);

        // Calls on a type-parameter-typed receiver go through the generic
        // effect rules first.
        if let Some(StaticType::TypeParam(param)) = &call.receiver_type {
            match classify_type_param_call(
                self.resolver.snapshot(),
                self.member,
                self.subst,
                param,
                &call.target.member,
            ) {
                TypeParamCall::Deferred => return,
                TypeParamCall::Unresolvable => {
                    self.push(
                        Verdict::Impure,
                        EffectKind::UnresolvableSymbol(call.target.clone()),
                    );
                    return;
                }
                TypeParamCall::Resolve(concrete) => {
                    // The statically referenced target names the parameter,
                    // not a real type; rebind it on the substituted type.
                    let declared = match self
                        .resolver
                        .snapshot()
                        .member_named(&concrete, &call.target.member)
                    {
                        Some(member) => member.id.clone(),
                        None => {
                            self.push(
                                Verdict::Impure,
                                EffectKind::UnresolvableSymbol(call.target.clone()),
                            );
                            return;
                        }
                    };
                    let callee_subst = Substitution::for_callee(self.subst, &call.type_args);
                    let resolution =
                        self.resolve_targets(&declared, Some(&concrete), None, &callee_subst);
                    self.contribute_resolution(&declared, resolution, call.receiver.as_deref());
                    return;
                }
            }
        }

        let concrete = call
            .receiver
            .as_deref()
            .and_then(|r| self.provenance.provenance_of(r).concrete_type().cloned());
        let static_ty = match &call.receiver_type {
            Some(StaticType::Named(ty)) => Some(ty.clone()),
            _ => None,
        };
        self.contribute_call(call, concrete.as_ref(), static_ty.as_ref());
    }

    fn visit_by_ref_args(&mut self, call: &Call) {
        for &index in &call.by_ref_args {
            let Some(arg) = call.args.get(index) else {
                continue;
            };
            match strip_casts(arg) {
                // The callee writes into one of our own slots; nothing the
                // caller can observe, but the slot's contents are now
                // whatever the callee put there.
                Expr::Local(name) => self.provenance.mark_escaped(name),
                Expr::Param(_) => {}
                Expr::FieldRead { receiver, field } => {
                    match self.classify_receiver(Some(receiver)) {
                        Receiver::This => self.push(
                            Verdict::PureExceptLocally,
                            EffectKind::InstanceWrite(field.clone()),
                        ),
                        Receiver::Local => {}
                        Receiver::External | Receiver::Static => self.push(
                            Verdict::Impure,
                            EffectKind::ByRefArgument {
                                param: field.to_string(),
                            },
                        ),
                    }
                }
                Expr::StaticRead(symbol) => self.push(
                    Verdict::Impure,
                    EffectKind::ByRefArgument {
                        param: symbol.to_string(),
                    },
                ),
                other => {
                    let provenance = self.provenance.provenance_of(other);
                    if !provenance.is_local() {
                        self.push(
                            Verdict::Impure,
                            EffectKind::ByRefArgument {
                                param: format!("argument {index}"),
                            },
                        );
                    }
                }
            }
        }
    }

    /// Resolve the call's targets, fold their verdicts, and contribute the
    /// result under the receiver's provenance.
    fn contribute_call(
        &mut self,
        call: &Call,
        receiver_concrete: Option<&TypeId>,
        receiver_static: Option<&TypeId>,
    ) {
        let callee_subst = Substitution::for_callee(self.subst, &call.type_args);
        let resolution =
            self.resolve_targets(&call.target, receiver_concrete, receiver_static, &callee_subst);
        self.contribute_resolution(&call.target, resolution, call.receiver.as_deref());
    }

    fn resolve_targets(
        &mut self,
        declared: &SymbolId,
        receiver_concrete: Option<&TypeId>,
        receiver_static: Option<&TypeId>,
        callee_subst: &Substitution,
    ) -> Resolution {
        let call_resolution: CallResolution =
            self.resolver
                .dispatch()
                .resolve_call(declared, receiver_concrete, receiver_static);

        if let Some(concrete) = call_resolution.concrete {
            let key = self.resolver.key_for(&concrete, callee_subst.clone());
            return self.resolver.resolve_inner(key, self.state);
        }
        if call_resolution.targets.is_empty() {
            return Resolution {
                verdict: Verdict::Impure,
                worst: Some(ReasonChain::single(
                    self.member.id.clone(),
                    EffectKind::UnresolvableSymbol(declared.clone()),
                )),
            };
        }

        // Conservative join over every implementation the call could reach.
        let mut verdict = Verdict::Pure;
        let mut worst: Option<ReasonChain> = None;
        for target in call_resolution.targets.iter() {
            let key = self.resolver.key_for(target, callee_subst.clone());
            let resolution = self.resolver.resolve_inner(key, self.state);
            if resolution.verdict > verdict {
                verdict = resolution.verdict;
                worst = resolution.worst;
            }
        }
        Resolution { verdict, worst }
    }

    /// Apply the receiver-provenance rule to a callee's resolved verdict.
    fn contribute_resolution(
        &mut self,
        declared: &SymbolId,
        resolution: Resolution,
        receiver: Option<&Expr>,
    ) {
        let contribution = match self.classify_receiver(receiver) {
            // A local receiver confines instance effects to an object the
            // caller can never see; static/global effects still escape.
            Receiver::Local => match resolution.verdict {
                Verdict::PureExceptLocally | Verdict::PureExceptReadLocally => Verdict::Pure,
                other => other,
            },
            // Instance writes of the callee land on a caller-supplied
            // object, which the caller's caller can observe; instance
            // reads just read externally-supplied state, which is no
            // more an effect than a direct field read of the receiver.
            Receiver::External => match resolution.verdict {
                Verdict::PureExceptLocally => Verdict::Impure,
                Verdict::PureExceptReadLocally => Verdict::Pure,
                other => other,
            },
            // The callee's instance is the caller's own instance.
            Receiver::Static | Receiver::This => resolution.verdict,
        };
        if contribution == Verdict::Pure {
            return;
        }
        let chain = match resolution.worst {
            Some(chain) => chain.prefixed(self.member.id.clone(), EffectKind::Call(declared.clone())),
            None => ReasonChain::single(self.member.id.clone(), EffectKind::Call(declared.clone())),
        };
        self.effects.push(Effect {
            verdict: contribution,
            chain,
        });
    }

    fn visit_construction(&mut self, ty: &TypeId, ctor: Option<&SymbolId>) {
        let ctor_symbol = ctor
            .cloned()
            .unwrap_or_else(|| SymbolId::new(ty.0.clone(), ".ctor"));
        match self.resolver.snapshot().member(&ctor_symbol) {
            Some(_) => {
                let key = self.resolver.key_for(&ctor_symbol, Substitution::empty());
                let resolution = self.resolver.resolve_inner(key, self.state);
                // The freshly allocated object is local by definition, so
                // instance effects of its constructor are confined.
                let contribution = match resolution.verdict {
                    Verdict::PureExceptLocally | Verdict::PureExceptReadLocally => Verdict::Pure,
                    other => other,
                };
                if contribution != Verdict::Pure {
                    let chain = match resolution.worst {
                        Some(chain) => chain
                            .prefixed(self.member.id.clone(), EffectKind::Call(ctor_symbol)),
                        None => ReasonChain::single(
                            self.member.id.clone(),
                            EffectKind::Call(ctor_symbol),
                        ),
                    };
                    self.effects.push(Effect {
                        verdict: contribution,
                        chain,
                    });
                }
            }
            None => {
                if ctor.is_some() {
                    self.push(
                        Verdict::Impure,
                        EffectKind::UnresolvableSymbol(ctor_symbol),
                    );
                }
                // An implicit default constructor initializes nothing.
            }
        }
    }

    // ------------------------------------------------------------------
    // String formatting
    // ------------------------------------------------------------------

    fn visit_format(&mut self, operand: &Expr, operand_type: Option<&StaticType>) {
        // Literals format through primitive formatting, which has no effects.
        if matches!(strip_casts(operand), Expr::Constant) {
            return;
        }
        let concrete = self
            .provenance
            .provenance_of(operand)
            .concrete_type()
            .cloned()
            .or_else(|| match operand_type {
                Some(StaticType::Named(ty)) if self.resolver.snapshot().is_sealed_type(ty) => {
                    Some(ty.clone())
                }
                _ => None,
            });

        if concrete.is_none() {
            if let Some(StaticType::TypeParam(param)) = operand_type {
                match classify_type_param_call(
                    self.resolver.snapshot(),
                    self.member,
                    self.subst,
                    param,
                    "ToString",
                ) {
                    TypeParamCall::Deferred => return,
                    TypeParamCall::Unresolvable => {
                        self.push(Verdict::Impure, EffectKind::UnboundFormatting);
                        return;
                    }
                    TypeParamCall::Resolve(ty) => {
                        self.contribute_formatting(operand, &ty);
                        return;
                    }
                }
            }
            // The runtime target of the formatting call cannot be bound.
            self.push(Verdict::Impure, EffectKind::UnboundFormatting);
            return;
        }

        if let Some(ty) = concrete {
            self.contribute_formatting(operand, &ty);
        }
    }

    fn contribute_formatting(&mut self, operand: &Expr, ty: &TypeId) {
        match self.resolver.snapshot().formatting_member(ty) {
            Some(member) => {
                let id = member.id.clone();
                let key = self.resolver.key_for(&id, Substitution::empty());
                let resolution = self.resolver.resolve_inner(key, self.state);
                self.contribute_resolution(&id, resolution, Some(operand));
            }
            // No formatting member in the model: the default root formatting
            // applies, which has no effects.
            None => {}
        }
    }

    // ------------------------------------------------------------------
    // Receiver classification
    // ------------------------------------------------------------------

    fn classify_receiver(&self, receiver: Option<&Expr>) -> Receiver {
        let Some(receiver) = receiver else {
            return Receiver::Static;
        };
        let stripped = strip_casts(receiver);
        if matches!(stripped, Expr::This) {
            // In a constructor the instance under construction is local.
            if self.member.kind == MemberKind::Constructor {
                return Receiver::Local;
            }
            return Receiver::This;
        }
        match self.provenance.provenance_of(receiver) {
            Provenance::Local { .. } => Receiver::Local,
            Provenance::External => Receiver::External,
        }
    }
}

/// Casting never changes what a receiver is.
fn strip_casts(expr: &Expr) -> &Expr {
    let mut current = expr;
    while let Expr::Cast { expr, .. } = current {
        current = expr;
    }
    current
}
