//! Generic statement/expression tree for member bodies.
//!
//! The host lowers its surface syntax into these nodes before handing a body
//! to the analysis. The node set is deliberately small: assignment, call,
//! field/property access, object creation, loops, conditionals, event
//! operations, yield, throw, lambdas, and an `Unsupported` escape hatch for
//! anything the host cannot lower (classified conservatively as impure).

use crate::model::symbol::{SymbolId, TypeId};

/// Static type of an expression as the host's semantic model sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaticType {
    Named(TypeId),
    /// An (unconstrained) generic type parameter, by name.
    TypeParam(String),
}

/// A type argument closing over a callee's type parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeArg {
    Concrete(TypeId),
    /// The caller's own open type parameter, passed through.
    Param(String),
}

/// A call expression with everything the resolver needs to bind it.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// The statically referenced member.
    pub target: SymbolId,
    /// Receiver expression; `None` for static calls.
    pub receiver: Option<Box<Expr>>,
    /// Static type of the receiver, when the host knows it.
    pub receiver_type: Option<StaticType>,
    pub args: Vec<Expr>,
    /// Indices of arguments passed by `ref`/`out`.
    pub by_ref_args: Vec<usize>,
    /// Substitutions for the target's type parameters, in declaration order.
    pub type_args: Vec<(String, TypeArg)>,
}

impl Call {
    pub fn static_call(target: SymbolId, args: Vec<Expr>) -> Self {
        Self {
            target,
            receiver: None,
            receiver_type: None,
            args,
            by_ref_args: Vec::new(),
            type_args: Vec::new(),
        }
    }

    pub fn on(target: SymbolId, receiver: Expr, args: Vec<Expr>) -> Self {
        Self {
            target,
            receiver: Some(Box::new(receiver)),
            receiver_type: None,
            args,
            by_ref_args: Vec::new(),
            type_args: Vec::new(),
        }
    }

    pub fn with_receiver_type(mut self, ty: StaticType) -> Self {
        self.receiver_type = Some(ty);
        self
    }

    pub fn with_type_args(mut self, type_args: Vec<(String, TypeArg)>) -> Self {
        self.type_args = type_args;
        self
    }

    pub fn with_by_ref_args(mut self, indices: Vec<usize>) -> Self {
        self.by_ref_args = indices;
        self
    }
}

/// Value-producing expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal or `const` — never an effect, always local provenance.
    Constant,
    /// Read a local variable.
    Local(String),
    /// Read a parameter.
    Param(String),
    /// The current instance.
    This,
    /// Read a static field or static auto-property.
    StaticRead(SymbolId),
    /// Read an instance field or property.
    FieldRead {
        receiver: Box<Expr>,
        field: SymbolId,
    },
    /// Element read, e.g. `receiver[index]`.
    Index {
        receiver: Box<Expr>,
        index: Box<Expr>,
    },
    Call(Call),
    /// `new T(...)`.
    New {
        ty: TypeId,
        ctor: Option<SymbolId>,
        args: Vec<Expr>,
    },
    /// Array or tuple literal.
    SequenceLit { elems: Vec<Expr> },
    /// Up/downcast; preserves provenance, never an effect by itself.
    Cast { expr: Box<Expr>, to: TypeId },
    /// String-formatting / interpolation operand. The formatting member
    /// actually invoked depends on the operand's runtime type.
    Format {
        operand: Box<Expr>,
        operand_type: Option<StaticType>,
    },
    /// Anonymous function. Captured variables are listed by name.
    Lambda {
        body: Vec<Stmt>,
        captures: Vec<String>,
    },
    /// A construct the host could not lower; classified as impure.
    Unsupported { construct: String },
}

impl Expr {
    pub fn local(name: impl Into<String>) -> Self {
        Expr::Local(name.into())
    }

    pub fn param(name: impl Into<String>) -> Self {
        Expr::Param(name.into())
    }

    pub fn field_read(receiver: Expr, field: SymbolId) -> Self {
        Expr::FieldRead {
            receiver: Box::new(receiver),
            field,
        }
    }

    pub fn index(receiver: Expr, index: Expr) -> Self {
        Expr::Index {
            receiver: Box::new(receiver),
            index: Box::new(index),
        }
    }

    pub fn new_object(ty: TypeId, args: Vec<Expr>) -> Self {
        Expr::New {
            ty,
            ctor: None,
            args,
        }
    }

    pub fn cast(expr: Expr, to: TypeId) -> Self {
        Expr::Cast {
            expr: Box::new(expr),
            to,
        }
    }

    pub fn format(operand: Expr, operand_type: Option<StaticType>) -> Self {
        Expr::Format {
            operand: Box::new(operand),
            operand_type,
        }
    }
}

/// Assignable locations.
#[derive(Debug, Clone, PartialEq)]
pub enum Place {
    Local(String),
    /// A static field or static auto-property.
    Static(SymbolId),
    Field { receiver: Expr, field: SymbolId },
    Index { receiver: Expr, index: Expr },
}

/// Event operations; all of them signal outside the call's local universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOp {
    Raise,
    Subscribe,
    Unsubscribe,
}

/// Statements.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    /// `let name = value` — declares a local and records its provenance.
    Let { name: String, value: Expr },
    Assign { target: Place, value: Expr },
    /// `++`/`--` on a place; a read-modify-write.
    Increment { target: Place },
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    Loop {
        cond: Option<Expr>,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),
    /// Lazy-sequence element production. Laziness does not change verdicts.
    Yield(Expr),
    Throw(Option<Expr>),
    Event {
        op: EventOp,
        event: SymbolId,
        handler: Option<Expr>,
    },
    /// A construct the host could not lower; classified as impure.
    Unsupported { construct: String },
}
