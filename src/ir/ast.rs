// This module defines the input tree handed to the compiler by an external front end. The
// tree is a closed set of tagged variants: a Function with its parameters and body, statements
// (global declarations, assignments, returns, plus the control-flow and expression statements a
// front end may still produce) and expressions (integer literals, name references, binary
// operations, unary operations and calls). Only a subset of this vocabulary can be compiled;
// the IR builder matches every variant exhaustively and rejects the rest with
// UnsupportedConstruct, so adding a node kind is a compile-time checked change. Small
// constructor helpers keep hand-built trees in tests and samples readable.

//! Input statement/expression tree.

/// Binary operators a front end can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Num(i64),
    Name(String),
    BinOp {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Call {
        func: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn num(value: i64) -> Self {
        Expr::Num(value)
    }

    pub fn name(name: impl Into<String>) -> Self {
        Expr::Name(name.into())
    }

    pub fn binop(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::BinOp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Self {
        Self::binop(BinOp::Add, lhs, rhs)
    }

    pub fn sub(lhs: Expr, rhs: Expr) -> Self {
        Self::binop(BinOp::Sub, lhs, rhs)
    }

    pub fn mul(lhs: Expr, rhs: Expr) -> Self {
        Self::binop(BinOp::Mul, lhs, rhs)
    }
}

/// Left-hand side of an assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignTarget {
    Name(String),
    /// Tuple unpacking, e.g. `a, b = ...`.
    Tuple(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// `global a, b` declares persistent variables.
    Global(Vec<String>),
    /// `t1 = t2 = value`
    Assign {
        targets: Vec<AssignTarget>,
        value: Expr,
    },
    Return(Expr),
    /// Bare expression evaluated for its side effects.
    Expr(Expr),
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
}

impl Stmt {
    pub fn global<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Stmt::Global(names.into_iter().map(Into::into).collect())
    }

    /// Single-name assignment.
    pub fn assign(target: impl Into<String>, value: Expr) -> Self {
        Stmt::Assign {
            targets: vec![AssignTarget::Name(target.into())],
            value,
        }
    }

    pub fn ret(value: Expr) -> Self {
        Stmt::Return(value)
    }
}

/// A function definition as produced by the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

impl Function {
    pub fn new(name: impl Into<String>, param: impl Into<String>, body: Vec<Stmt>) -> Self {
        Self {
            name: name.into(),
            params: vec![param.into()],
            body,
        }
    }
}
