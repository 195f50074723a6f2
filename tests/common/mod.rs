#![allow(dead_code)]

use puremark::model::symbol::SymbolId;
use puremark::model::syntax::{Call, Expr, Place, Stmt};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `target = value;` on a static location.
pub fn static_write(symbol: SymbolId) -> Stmt {
    Stmt::Assign {
        target: Place::Static(symbol),
        value: Expr::Constant,
    }
}

/// `this.field = constant;`
pub fn own_field_write(field: SymbolId) -> Stmt {
    Stmt::Assign {
        target: Place::Field {
            receiver: Expr::This,
            field,
        },
        value: Expr::Constant,
    }
}

/// `return this.field;`
pub fn own_field_return(field: SymbolId) -> Stmt {
    Stmt::Return(Some(Expr::field_read(Expr::This, field)))
}

/// A statement calling `target` statically with no arguments.
pub fn static_call(target: SymbolId) -> Stmt {
    Stmt::Expr(Expr::Call(Call::static_call(target, vec![])))
}

/// A statement calling `target` on `receiver` with no arguments.
pub fn call_on(target: SymbolId, receiver: Expr) -> Stmt {
    Stmt::Expr(Expr::Call(Call::on(target, receiver, vec![])))
}
