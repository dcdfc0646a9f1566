// This module lowers the input tree into the linear IR consumed by the scheduler. IrBuilder
// walks the function body once, in order. Global declarations are collected in a pre-pass so
// their reserved slots always occupy the lowest data addresses; the single parameter is then
// bound to a fresh virtual register through an explicit input instruction. Binary operations
// evaluate both operands and emit one instruction defining a new virtual register, literals are
// interned into the data table without emitting anything, names resolve to whatever was bound
// last, assignments only rebind names, and the first return emits an output instruction and
// ends the walk. Every other node of the tree is rejected with UnsupportedConstruct. Virtual
// registers are numbered -1, -2, ... and each is defined by exactly one instruction.

//! IR construction from the input tree.

use hashbrown::HashMap;

use super::ast::{AssignTarget, BinOp, Expr, Function, Stmt, UnaryOp};
use super::{DataTable, Instruction, Opcode, Operand};
use crate::core::{CompileError, CompileResult, RegId};

/// Output of the IR builder.
#[derive(Debug, Clone)]
pub struct IrProgram {
    /// Instructions in source order. Order is only a priority hint for the scheduler.
    pub instructions: Vec<Instruction>,
    pub data: DataTable,
    /// Reserved slot of every declared global.
    pub globals: HashMap<String, RegId>,
}

/// Whether the walk continues after a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Return,
}

#[derive(Debug, Default)]
pub struct IrBuilder {
    program: Vec<Instruction>,
    data: DataTable,
    next_vreg: u32,
    names: HashMap<String, Operand>,
    globals: HashMap<String, RegId>,
}

impl IrBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lower `function` into IR.
    pub fn build(mut self, function: &Function) -> CompileResult<IrProgram> {
        let [param] = function.params.as_slice() else {
            return Err(CompileError::unsupported(format!(
                "function `{}` takes {} parameters, expected exactly one",
                function.name,
                function.params.len()
            )));
        };

        self.declare_globals(&function.body);
        self.bind_input(param);

        for stmt in &function.body {
            if self.emit_stmt(stmt)? == Flow::Return {
                break;
            }
        }

        log::debug!(
            "built `{}`: {} instructions, {} data slots ({} reserved), {} virtual registers",
            function.name,
            self.program.len(),
            self.data.len(),
            self.data.reserved(),
            self.next_vreg
        );

        Ok(IrProgram {
            instructions: self.program,
            data: self.data,
            globals: self.globals,
        })
    }

    fn declare_globals(&mut self, body: &[Stmt]) {
        let mut declared: Vec<&str> = Vec::new();
        for stmt in body {
            if let Stmt::Global(names) = stmt {
                for name in names {
                    if !declared.contains(&name.as_str()) {
                        declared.push(name);
                    }
                }
            }
        }

        self.data = DataTable::with_reserved(declared.len() as RegId);
        for (slot, name) in declared.into_iter().enumerate() {
            let slot = slot as RegId;
            self.names.insert(name.to_string(), Operand::physical(slot));
            self.globals.insert(name.to_string(), slot);
        }
    }

    fn fresh_vreg(&mut self) -> Operand {
        self.next_vreg += 1;
        Operand::virtual_reg(self.next_vreg)
    }

    fn bind_input(&mut self, name: &str) -> Operand {
        let target = self.fresh_vreg();
        self.program.push(Instruction::input_to(target));
        self.names.insert(name.to_string(), target);
        target
    }

    fn emit_stmt(&mut self, stmt: &Stmt) -> CompileResult<Flow> {
        match stmt {
            // Reserved by the pre-pass.
            Stmt::Global(_) => Ok(Flow::Continue),
            Stmt::Assign { targets, value } => {
                let output = self.emit_expr(value)?;
                for target in targets {
                    match target {
                        AssignTarget::Name(name) => {
                            self.names.insert(name.clone(), output);
                        }
                        AssignTarget::Tuple(names) => {
                            return Err(CompileError::unsupported(format!(
                                "tuple assignment to ({})",
                                names.join(", ")
                            )));
                        }
                    }
                }
                Ok(Flow::Continue)
            }
            Stmt::Return(value) => {
                let value = self.emit_expr(value)?;
                self.program.push(Instruction::output_of(value));
                Ok(Flow::Return)
            }
            Stmt::Expr(_) => Err(CompileError::unsupported("expression statement")),
            Stmt::If { .. } => Err(CompileError::unsupported("if statement")),
            Stmt::While { .. } => Err(CompileError::unsupported("while loop")),
        }
    }

    fn emit_expr(&mut self, expr: &Expr) -> CompileResult<Operand> {
        match expr {
            Expr::Num(value) => Ok(Operand::physical(self.data.intern(*value))),
            Expr::Name(name) => self
                .names
                .get(name)
                .copied()
                .ok_or_else(|| CompileError::UnknownName { name: name.clone() }),
            Expr::BinOp { op, lhs, rhs } => {
                let opcode = match op {
                    BinOp::Add => Opcode::Add,
                    BinOp::Sub => Opcode::Sub,
                    BinOp::Mul => Opcode::Mul,
                    BinOp::Div | BinOp::Mod => {
                        return Err(CompileError::unsupported(format!(
                            "binary operator `{}`",
                            op.symbol()
                        )));
                    }
                };
                let lhs = self.emit_expr(lhs)?;
                let rhs = self.emit_expr(rhs)?;
                let output = self.fresh_vreg();
                self.program.push(Instruction::binary(opcode, lhs, rhs, output));
                Ok(output)
            }
            Expr::Unary { op: UnaryOp::Neg, .. } => {
                Err(CompileError::unsupported("unary operator `-`"))
            }
            Expr::Call { func, .. } => {
                Err(CompileError::unsupported(format!("call to `{func}`")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(body: Vec<Stmt>) -> CompileResult<IrProgram> {
        IrBuilder::new().build(&Function::new("f", "x", body))
    }

    #[test]
    fn test_input_comes_first() {
        let ir = build(vec![Stmt::ret(Expr::name("x"))]).unwrap();
        assert_eq!(
            ir.instructions,
            vec![
                Instruction::input_to(Operand::virtual_reg(1)),
                Instruction::output_of(Operand::virtual_reg(1)),
            ]
        );
        assert!(ir.data.is_empty());
    }

    #[test]
    fn test_literals_emit_no_instruction() {
        let ir = build(vec![Stmt::ret(Expr::num(9))]).unwrap();
        assert_eq!(ir.instructions.len(), 2);
        assert_eq!(ir.instructions[1], Instruction::output_of(Operand::physical(0)));
        assert_eq!(ir.data.values(), &[9]);
    }

    #[test]
    fn test_operands_evaluated_left_to_right() {
        let ir = build(vec![Stmt::ret(Expr::sub(
            Expr::mul(Expr::name("x"), Expr::num(3)),
            Expr::add(Expr::name("x"), Expr::num(1)),
        ))])
        .unwrap();

        let ops: Vec<Opcode> = ir.instructions.iter().map(|i| i.opcode()).collect();
        assert_eq!(
            ops,
            vec![Opcode::Input, Opcode::Mul, Opcode::Add, Opcode::Sub, Opcode::Output]
        );
        assert_eq!(
            ir.instructions[3].inputs(),
            &[Operand::virtual_reg(2), Operand::virtual_reg(3)]
        );
        assert_eq!(ir.data.values(), &[3, 1]);
    }

    #[test]
    fn test_globals_reserved_before_constants() {
        let ir = build(vec![
            Stmt::assign("t", Expr::num(10)),
            Stmt::global(["g", "h"]),
            Stmt::global(["g"]),
            Stmt::ret(Expr::add(Expr::name("g"), Expr::name("t"))),
        ])
        .unwrap();

        assert_eq!(ir.data.reserved(), 2);
        assert_eq!(ir.data.values(), &[0, 0, 10]);
        assert_eq!(ir.globals.get("g"), Some(&0));
        assert_eq!(ir.globals.get("h"), Some(&1));
        assert_eq!(ir.instructions[1].inputs(), &[Operand::physical(0), Operand::physical(2)]);
    }

    #[test]
    fn test_walk_stops_at_first_return() {
        let ir = build(vec![
            Stmt::ret(Expr::name("x")),
            Stmt::While {
                cond: Expr::name("x"),
                body: Vec::new(),
            },
        ])
        .unwrap();
        assert_eq!(ir.instructions.len(), 2);
    }

    #[test]
    fn test_multi_target_assignment() {
        let ir = build(vec![
            Stmt::Assign {
                targets: vec![AssignTarget::Name("a".into()), AssignTarget::Name("b".into())],
                value: Expr::add(Expr::name("x"), Expr::num(1)),
            },
            Stmt::ret(Expr::mul(Expr::name("a"), Expr::name("b"))),
        ])
        .unwrap();
        let mul = &ir.instructions[2];
        assert_eq!(mul.inputs()[0], mul.inputs()[1]);
    }

    #[test]
    fn test_rejections() {
        let err = build(vec![Stmt::ret(Expr::name("y"))]).unwrap_err();
        assert_eq!(err, CompileError::UnknownName { name: "y".into() });

        let err = build(vec![Stmt::ret(Expr::binop(BinOp::Div, Expr::num(1), Expr::num(2)))]);
        assert!(matches!(err, Err(CompileError::UnsupportedConstruct { .. })));

        let err = build(vec![Stmt::Assign {
            targets: vec![AssignTarget::Tuple(vec!["a".into(), "b".into()])],
            value: Expr::name("x"),
        }]);
        assert!(matches!(err, Err(CompileError::UnsupportedConstruct { .. })));

        let two_params = Function {
            name: "f".into(),
            params: vec!["x".into(), "y".into()],
            body: Vec::new(),
        };
        assert!(matches!(
            IrBuilder::new().build(&two_params),
            Err(CompileError::UnsupportedConstruct { .. })
        ));
    }
}
