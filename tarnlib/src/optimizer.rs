//! AST-level optimization pass.
//!
//! Two rewrites, both semantics-preserving:
//! - constant folding of integer arithmetic and unary operators; division
//!   and modulo by a literal zero are left in place so the runtime error
//!   still fires
//! - dead-code elimination of statements that follow a `return`, `break` or
//!   `continue` in the same statement list
//!
//! Comparisons and the logical operators are not folded; the logical
//! operators compile to control flow and the comparison operators stay as
//! written so conditions read back out of `--dump` unchanged.

use crate::ast::{BinaryOp, Expr, Item, Program, Stmt, UnaryOp};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptStats {
    pub constants_folded: usize,
    pub dead_code_removed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Optimizer {
    stats: OptStats,
}

impl Optimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite `program` in place and return what was done.
    pub fn run(&mut self, program: &mut Program) -> OptStats {
        self.stats = OptStats::default();
        for item in &mut program.items {
            match item {
                Item::Function(func) => self.opt_body(&mut func.body),
                Item::Stmt(stmt) => self.opt_stmt(stmt),
            }
        }
        self.stats
    }

    pub fn stats(&self) -> OptStats {
        self.stats
    }

    fn opt_body(&mut self, body: &mut Vec<Stmt>) {
        for stmt in body.iter_mut() {
            self.opt_stmt(stmt);
        }
        if let Some(pos) = body.iter().position(Stmt::is_terminator) {
            let dead = body.len() - pos - 1;
            if dead > 0 {
                body.truncate(pos + 1);
                self.stats.dead_code_removed += dead;
            }
        }
    }

    fn opt_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Assign { value, .. } => self.fold_expr(value),
            Stmt::ArrayAssign {
                target,
                index,
                value,
            } => {
                self.fold_expr(target);
                self.fold_expr(index);
                self.fold_expr(value);
            }
            Stmt::Expr(expr) | Stmt::Print(expr) => self.fold_expr(expr),
            Stmt::If { cond, body } => {
                self.fold_expr(cond);
                self.opt_body(body);
            }
            Stmt::While { cond, body } => {
                self.fold_expr(cond);
                self.opt_body(body);
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => {
                if let Some(init) = init {
                    self.opt_stmt(init);
                }
                if let Some(cond) = cond {
                    self.fold_expr(cond);
                }
                if let Some(step) = step {
                    self.opt_stmt(step);
                }
                self.opt_body(body);
            }
            Stmt::Return(Some(expr)) => self.fold_expr(expr),
            Stmt::Block(stmts) => self.opt_body(stmts),
            Stmt::Break | Stmt::Continue | Stmt::Return(None) => {}
        }
    }

    fn fold_expr(&mut self, expr: &mut Expr) {
        match expr {
            Expr::Binary { left, op, right } => {
                let op = *op;
                self.fold_expr(left);
                self.fold_expr(right);
                let folded = match (&**left, &**right) {
                    (Expr::Number(a), Expr::Number(b)) => fold_binary(*a, op, *b),
                    _ => None,
                };
                if let Some(value) = folded {
                    self.stats.constants_folded += 1;
                    *expr = Expr::Number(value);
                }
            }
            Expr::Unary { op, expr: inner } => {
                let op = *op;
                self.fold_expr(inner);
                let folded = match &**inner {
                    Expr::Number(n) => Some(match op {
                        UnaryOp::Neg => 0i32.wrapping_sub(*n),
                        UnaryOp::Not => (*n == 0) as i32,
                    }),
                    _ => None,
                };
                if let Some(value) = folded {
                    self.stats.constants_folded += 1;
                    *expr = Expr::Number(value);
                }
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    self.fold_expr(arg);
                }
            }
            Expr::ArrayLit(elements) => {
                for element in elements {
                    self.fold_expr(element);
                }
            }
            Expr::Index { target, index } => {
                self.fold_expr(target);
                self.fold_expr(index);
            }
            Expr::Number(_) | Expr::Str(_) | Expr::Ident(_) => {}
        }
    }
}

/// Fold one integer arithmetic operation, mirroring the VM's wrapping
/// semantics. Returns `None` for operators the pass leaves alone and for
/// division/modulo by zero.
fn fold_binary(a: i32, op: BinaryOp, b: i32) -> Option<i32> {
    match op {
        BinaryOp::Add => Some(a.wrapping_add(b)),
        BinaryOp::Sub => Some(a.wrapping_sub(b)),
        BinaryOp::Mul => Some(a.wrapping_mul(b)),
        BinaryOp::Div => {
            if b == 0 {
                None
            } else {
                Some(a.wrapping_div(b))
            }
        }
        BinaryOp::Mod => {
            if b == 0 {
                None
            } else {
                Some(a.wrapping_rem(b))
            }
        }
        _ => None,
    }
}
