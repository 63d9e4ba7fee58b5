use std::collections::HashMap;
use std::mem;

use crate::ast::{BinaryOp, Expr, FnDecl, Item, Program, Stmt, UnaryOp};
use crate::diagnostic::{DiagnosticBag, Phase, Span};
use crate::parser::Parser;

use super::{
    BytecodeProgram, FunctionInfo, Instr, Opcode, Value, MAX_FUNCTIONS, MAX_INSTRUCTIONS,
};

/// Parse and lower `source` in one shot.
pub fn compile_source(source: &str) -> Result<BytecodeProgram, DiagnosticBag> {
    let (program, diags) = Parser::parse_source(source);
    if !diags.is_empty() {
        return Err(diags);
    }
    Compiler::new().compile(&program)
}

/// AST-to-bytecode compiler.
///
/// Runs in two passes: function registration first (so calls to
/// later-declared functions resolve), then emission. Forward jumps are
/// emitted with a zero operand and patched once the target index is known.
///
/// A `Compiler` value holds the accumulated program, function table and
/// top-level scopes so the interactive shell can feed fragments one at a
/// time; `compile` resets that state, `feed_fragment` carries it forward.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    diags: DiagnosticBag,
    program: BytecodeProgram,
    function_map: HashMap<String, u16>,
    toplevel: ScopeStack,
    code_overflow: bool,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all accumulated shell state.
    pub fn reset(&mut self) {
        self.program = BytecodeProgram::default();
        self.function_map.clear();
        self.toplevel = ScopeStack::new();
        self.code_overflow = false;
    }

    /// Lower a whole program. Emits the `CONST 0; RETURN` footer so main
    /// always terminates.
    pub fn compile(&mut self, program: &Program) -> Result<BytecodeProgram, DiagnosticBag> {
        self.reset();
        self.lower_program(program, false)
    }

    /// Shell mode: parse and lower one fragment on top of the accumulated
    /// state. The function table, constant pool and top-level scopes carry
    /// forward; the implicit trailing `return 0` is suppressed so successive
    /// fragments concatenate. Returns the full program with `main_entry` at
    /// the fragment's first top-level instruction.
    pub fn feed_fragment(&mut self, source: &str) -> Result<BytecodeProgram, DiagnosticBag> {
        let (program, diags) = Parser::parse_source(source);
        if !diags.is_empty() {
            return Err(diags);
        }
        self.lower_program(&program, true)
    }

    fn lower_program(
        &mut self,
        program: &Program,
        incremental: bool,
    ) -> Result<BytecodeProgram, DiagnosticBag> {
        self.diags = DiagnosticBag::new();

        // Snapshot the carried state. A fragment that fails to lower must
        // not leave partial functions, code or scope entries behind: the
        // shell would otherwise let later fragments call a function or read
        // a variable the compiler itself rejected.
        let saved_program = self.program.clone();
        let saved_function_map = self.function_map.clone();
        let saved_toplevel = self.toplevel.clone();
        let saved_overflow = self.code_overflow;

        // Pass 1: reserve a function-table entry per declaration so calls in
        // any body can resolve, including calls to later functions.
        for item in &program.items {
            if let Item::Function(func) = item {
                self.register_function(func);
            }
        }

        // Pass 2: function bodies in declaration order, then top-level code.
        for item in &program.items {
            if let Item::Function(func) = item {
                self.lower_function(func);
            }
        }

        self.program.main_entry = self.here();
        let mut scope = mem::take(&mut self.toplevel);
        let mut loops = Vec::new();
        for item in &program.items {
            if let Item::Stmt(stmt) = item {
                self.lower_stmt(stmt, &mut scope, &mut loops);
            }
        }
        if !incremental {
            let zero = self.add_constant(Value::Int(0));
            self.emit(Opcode::Const, zero);
            self.emit(Opcode::Return, 0);
        }
        self.program.main_locals = scope.peak;
        self.toplevel = scope;

        if self.diags.is_empty() {
            Ok(self.program.clone())
        } else {
            self.program = saved_program;
            self.function_map = saved_function_map;
            self.toplevel = saved_toplevel;
            self.code_overflow = saved_overflow;
            Err(mem::take(&mut self.diags))
        }
    }

    fn register_function(&mut self, func: &FnDecl) {
        if self.function_map.contains_key(&func.name) {
            self.error(format!("Function `{}` is already defined", func.name));
            return;
        }
        if self.program.functions.len() >= MAX_FUNCTIONS {
            self.error(format!("Too many functions (limit {MAX_FUNCTIONS})"));
            return;
        }
        if func.params.len() > u8::MAX as usize {
            self.error(format!("Function `{}` has too many parameters", func.name));
            return;
        }
        for (i, param) in func.params.iter().enumerate() {
            if func.params[..i].contains(param) {
                self.error(format!(
                    "Duplicate parameter `{param}` in function `{}`",
                    func.name
                ));
                return;
            }
        }
        let index = self.program.functions.len() as u16;
        self.function_map.insert(func.name.clone(), index);
        self.program.functions.push(FunctionInfo {
            name: func.name.clone(),
            entry: 0,
            arity: func.params.len() as u8,
            local_count: 0,
        });
    }

    fn lower_function(&mut self, func: &FnDecl) {
        let Some(&index) = self.function_map.get(&func.name) else {
            return;
        };
        self.program.functions[index as usize].entry = self.here();

        let mut scope = ScopeStack::new();
        let mut loops = Vec::new();
        for param in &func.params {
            scope.define(param);
        }
        for stmt in &func.body {
            self.lower_stmt(stmt, &mut scope, &mut loops);
        }

        // Unconditional footer: bodies are laid out back to back in the flat
        // code vector, so falling off the end must never reach the next one.
        let zero = self.add_constant(Value::Int(0));
        self.emit(Opcode::Const, zero);
        self.emit(Opcode::Return, 0);

        if scope.peak > u8::MAX as u16 {
            self.error(format!("Function `{}` uses too many locals", func.name));
        } else {
            self.program.functions[index as usize].local_count = scope.peak as u8;
        }
    }

    fn lower_stmt(&mut self, stmt: &Stmt, scope: &mut ScopeStack, loops: &mut Vec<LoopCtx>) {
        match stmt {
            Stmt::Assign { name, value } => {
                self.lower_expr(value, scope);
                let slot = scope.define(name);
                self.emit(Opcode::Store, slot);
            }
            Stmt::ArrayAssign {
                target,
                index,
                value,
            } => {
                self.lower_expr(target, scope);
                self.lower_expr(index, scope);
                self.lower_expr(value, scope);
                self.emit(Opcode::ArrayStore, 0);
            }
            Stmt::Expr(expr) => {
                self.lower_expr(expr, scope);
                self.emit(Opcode::Pop, 0);
            }
            Stmt::Print(expr) => {
                self.lower_expr(expr, scope);
                self.emit(Opcode::Print, 0);
            }
            Stmt::If { cond, body } => {
                self.lower_expr(cond, scope);
                let exit = self.emit_jump(Opcode::JumpIfZero);
                for s in body {
                    self.lower_stmt(s, scope, loops);
                }
                let end = self.here();
                self.patch_jump(exit, end);
            }
            Stmt::While { cond, body } => {
                let loop_start = self.here();
                loops.push(LoopCtx {
                    continue_target: Some(loop_start),
                    break_jumps: Vec::new(),
                    continue_jumps: Vec::new(),
                });
                self.lower_expr(cond, scope);
                let exit = self.emit_jump(Opcode::JumpIfZero);
                for s in body {
                    self.lower_stmt(s, scope, loops);
                }
                self.emit(Opcode::Jump, loop_start);
                let end = self.here();
                self.patch_jump(exit, end);
                if let Some(ctx) = loops.pop() {
                    for at in ctx.break_jumps {
                        self.patch_jump(at, end);
                    }
                }
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => {
                scope.enter();
                if let Some(init) = init {
                    self.lower_stmt(init, scope, loops);
                }
                let start = self.here();
                loops.push(LoopCtx {
                    // Unknown until the body is emitted; continues patch late.
                    continue_target: None,
                    break_jumps: Vec::new(),
                    continue_jumps: Vec::new(),
                });
                let exit = cond.as_ref().map(|cond| {
                    self.lower_expr(cond, scope);
                    self.emit_jump(Opcode::JumpIfZero)
                });
                for s in body {
                    self.lower_stmt(s, scope, loops);
                }
                let continue_target = self.here();
                if let Some(step) = step {
                    self.lower_stmt(step, scope, loops);
                }
                self.emit(Opcode::Jump, start);
                let end = self.here();
                if let Some(exit) = exit {
                    self.patch_jump(exit, end);
                }
                if let Some(ctx) = loops.pop() {
                    for at in ctx.break_jumps {
                        self.patch_jump(at, end);
                    }
                    for at in ctx.continue_jumps {
                        self.patch_jump(at, continue_target);
                    }
                }
                scope.exit();
            }
            Stmt::Break => {
                let at = self.emit_jump(Opcode::Jump);
                match loops.last_mut() {
                    Some(ctx) => ctx.break_jumps.push(at),
                    None => self.error("`break` used outside a loop"),
                }
            }
            Stmt::Continue => match loops.last_mut() {
                Some(ctx) => {
                    if let Some(target) = ctx.continue_target {
                        self.emit(Opcode::Jump, target);
                    } else {
                        let at = self.emit_jump(Opcode::Jump);
                        ctx.continue_jumps.push(at);
                    }
                }
                None => self.error("`continue` used outside a loop"),
            },
            Stmt::Return(expr) => {
                if let Some(expr) = expr {
                    self.lower_expr(expr, scope);
                } else {
                    let zero = self.add_constant(Value::Int(0));
                    self.emit(Opcode::Const, zero);
                }
                self.emit(Opcode::Return, 0);
            }
            Stmt::Block(stmts) => {
                scope.enter();
                for s in stmts {
                    self.lower_stmt(s, scope, loops);
                }
                scope.exit();
            }
        }
    }

    fn lower_expr(&mut self, expr: &Expr, scope: &mut ScopeStack) {
        match expr {
            Expr::Number(v) => {
                let idx = self.add_constant(Value::Int(*v));
                self.emit(Opcode::Const, idx);
            }
            Expr::Str(s) => {
                let idx = self.add_constant(Value::Str(s.clone()));
                self.emit(Opcode::Const, idx);
            }
            Expr::Ident(name) => match scope.lookup(name) {
                Some(slot) => {
                    self.emit(Opcode::Load, slot);
                }
                None => {
                    self.error(format!("Undefined variable `{name}`"));
                    let zero = self.add_constant(Value::Int(0));
                    self.emit(Opcode::Const, zero);
                }
            },
            Expr::Binary {
                left,
                op: BinaryOp::AndAnd,
                right,
            } => {
                // Short-circuit: the right side only evaluates when the left
                // is nonzero; the result is a canonical 0/1.
                self.lower_expr(left, scope);
                let left_false = self.emit_jump(Opcode::JumpIfZero);
                self.lower_expr(right, scope);
                let right_false = self.emit_jump(Opcode::JumpIfZero);
                let one = self.add_constant(Value::Int(1));
                self.emit(Opcode::Const, one);
                let done = self.emit_jump(Opcode::Jump);
                let false_label = self.here();
                self.patch_jump(left_false, false_label);
                self.patch_jump(right_false, false_label);
                let zero = self.add_constant(Value::Int(0));
                self.emit(Opcode::Const, zero);
                let end = self.here();
                self.patch_jump(done, end);
            }
            Expr::Binary {
                left,
                op: BinaryOp::OrOr,
                right,
            } => {
                self.lower_expr(left, scope);
                let try_right = self.emit_jump(Opcode::JumpIfZero);
                let one = self.add_constant(Value::Int(1));
                self.emit(Opcode::Const, one);
                let done_left = self.emit_jump(Opcode::Jump);
                let right_label = self.here();
                self.patch_jump(try_right, right_label);
                self.lower_expr(right, scope);
                let both_false = self.emit_jump(Opcode::JumpIfZero);
                self.emit(Opcode::Const, one);
                let done_right = self.emit_jump(Opcode::Jump);
                let false_label = self.here();
                self.patch_jump(both_false, false_label);
                let zero = self.add_constant(Value::Int(0));
                self.emit(Opcode::Const, zero);
                let end = self.here();
                self.patch_jump(done_left, end);
                self.patch_jump(done_right, end);
            }
            Expr::Binary { left, op, right } => {
                self.lower_expr(left, scope);
                self.lower_expr(right, scope);
                let opcode = match op {
                    BinaryOp::Add => Opcode::Add,
                    BinaryOp::Sub => Opcode::Sub,
                    BinaryOp::Mul => Opcode::Mul,
                    BinaryOp::Div => Opcode::Div,
                    BinaryOp::Mod => Opcode::Mod,
                    BinaryOp::EqEq => Opcode::Eq,
                    BinaryOp::Neq => Opcode::Neq,
                    BinaryOp::Lt => Opcode::Lt,
                    BinaryOp::Lte => Opcode::Lte,
                    BinaryOp::Gt => Opcode::Gt,
                    BinaryOp::Gte => Opcode::Gte,
                    BinaryOp::AndAnd | BinaryOp::OrOr => unreachable!(),
                };
                self.emit(opcode, 0);
            }
            Expr::Unary {
                op: UnaryOp::Neg,
                expr,
            } => {
                let zero = self.add_constant(Value::Int(0));
                self.emit(Opcode::Const, zero);
                self.lower_expr(expr, scope);
                self.emit(Opcode::Sub, 0);
            }
            Expr::Unary {
                op: UnaryOp::Not,
                expr,
            } => {
                // Conditional producing 1 when the operand is 0, else 0.
                self.lower_expr(expr, scope);
                let was_zero = self.emit_jump(Opcode::JumpIfZero);
                let zero = self.add_constant(Value::Int(0));
                self.emit(Opcode::Const, zero);
                let done = self.emit_jump(Opcode::Jump);
                let truthy = self.here();
                self.patch_jump(was_zero, truthy);
                let one = self.add_constant(Value::Int(1));
                self.emit(Opcode::Const, one);
                let end = self.here();
                self.patch_jump(done, end);
            }
            Expr::Call { name, args } => {
                for arg in args {
                    self.lower_expr(arg, scope);
                }
                match self.function_map.get(name).copied() {
                    Some(index) => {
                        let arity = self.program.functions[index as usize].arity;
                        if args.len() != arity as usize {
                            self.error(format!(
                                "Function `{name}` expects {arity} argument(s), got {}",
                                args.len()
                            ));
                        }
                        self.emit(Opcode::Call, index);
                    }
                    None => self.error(format!("Undefined function `{name}`")),
                }
            }
            Expr::ArrayLit(elements) => {
                for element in elements {
                    self.lower_expr(element, scope);
                }
                self.emit(Opcode::BuildArray, elements.len() as u16);
            }
            Expr::Index { target, index } => {
                self.lower_expr(target, scope);
                self.lower_expr(index, scope);
                self.emit(Opcode::ArrayLoad, 0);
            }
        }
    }

    /// Append one instruction, returning its index for later patching.
    fn emit(&mut self, op: Opcode, operand: u16) -> usize {
        if self.program.code.len() >= MAX_INSTRUCTIONS {
            if !self.code_overflow {
                self.code_overflow = true;
                self.error(format!("Program exceeds {MAX_INSTRUCTIONS} instructions"));
            }
            return self.program.code.len().saturating_sub(1);
        }
        self.program.code.push(Instr::new(op, operand));
        self.program.code.len() - 1
    }

    /// Forward jump with a placeholder operand.
    fn emit_jump(&mut self, op: Opcode) -> usize {
        self.emit(op, 0)
    }

    fn patch_jump(&mut self, at: usize, target: u16) {
        self.program.code[at].operand = target;
    }

    fn here(&self) -> u16 {
        self.program.code.len() as u16
    }

    /// Intern a constant, reusing a structurally equal entry when present.
    /// Only ints and strings reach the pool.
    fn add_constant(&mut self, value: Value) -> u16 {
        for (i, existing) in self.program.constants.iter().enumerate() {
            if *existing == value {
                return i as u16;
            }
        }
        let index = self.program.constants.len();
        if index > u16::MAX as usize {
            self.error("Constant pool overflow");
            return 0;
        }
        self.program.constants.push(value);
        index as u16
    }

    fn error(&mut self, message: impl Into<String>) {
        self.diags.error(Phase::Codegen, message, Span::default());
    }
}

/// Per-loop bookkeeping: `while` knows its continue target up front, `for`
/// only after the body is emitted.
#[derive(Debug, Clone, Default)]
struct LoopCtx {
    continue_target: Option<u16>,
    break_jumps: Vec<usize>,
    continue_jumps: Vec<usize>,
}

/// Scope stack with slot assignment. A slot index is the number of active
/// slots at definition time, so siblings reuse slots; `peak` tracks the high
/// water mark that sizes the frame.
#[derive(Debug, Clone)]
struct ScopeStack {
    scopes: Vec<HashMap<String, u16>>,
    active: u16,
    peak: u16,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
            active: 0,
            peak: 0,
        }
    }

    fn enter(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn exit(&mut self) {
        if self.scopes.len() > 1 {
            if let Some(popped) = self.scopes.pop() {
                self.active -= popped.len() as u16;
            }
        }
    }

    fn lookup(&self, name: &str) -> Option<u16> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    /// Resolve `name`, allocating the next slot in the innermost scope on
    /// first definition.
    fn define(&mut self, name: &str) -> u16 {
        if let Some(slot) = self.lookup(name) {
            return slot;
        }
        let slot = self.active;
        if let Some(innermost) = self.scopes.last_mut() {
            innermost.insert(name.to_string(), slot);
        }
        self.active += 1;
        self.peak = self.peak.max(self.active);
        slot
    }
}
