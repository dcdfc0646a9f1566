//! Reference programs, built as front-end trees.

use crate::ir::ast::{Expr, Function, Stmt};

/// ```text
/// def simple_test(x):
///     a = 5 + 3
///     return a*4
/// ```
pub fn simple_test() -> Function {
    Function::new(
        "simple_test",
        "x",
        vec![
            Stmt::assign("a", Expr::add(Expr::num(5), Expr::num(3))),
            Stmt::ret(Expr::mul(Expr::name("a"), Expr::num(4))),
        ],
    )
}

/// Three-tap FIR filter whose history lives in persistent globals.
///
/// ```text
/// def fir_filter(x):
///     global a, b, c
///     c = b
///     b = a
///     a = x
///     return 4748*a + 259*b - 155*c
/// ```
pub fn fir_filter() -> Function {
    Function::new(
        "fir_filter",
        "x",
        vec![
            Stmt::global(["a", "b", "c"]),
            Stmt::assign("c", Expr::name("b")),
            Stmt::assign("b", Expr::name("a")),
            Stmt::assign("a", Expr::name("x")),
            Stmt::ret(Expr::sub(
                Expr::add(
                    Expr::mul(Expr::num(4748), Expr::name("a")),
                    Expr::mul(Expr::num(259), Expr::name("b")),
                ),
                Expr::mul(Expr::num(155), Expr::name("c")),
            )),
        ],
    )
}
