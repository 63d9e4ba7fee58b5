use crate::bytecode::{BytecodeProgram, Opcode, Value};

use super::{Frame, OutputHost, Profiler, Vm, VmError, VmErrorKind};

impl Vm {
    pub(super) fn run(
        &mut self,
        program: &BytecodeProgram,
        host: &mut dyn OutputHost,
        mut profiler: Option<&mut Profiler>,
        keep_state: bool,
    ) -> Result<Value, VmError> {
        self.stack.clear();
        self.frames.clear();
        self.printed.clear();
        // Slots are zero-filled, so a declared-but-never-written local reads
        // as 0 rather than surfacing Void.
        if keep_state {
            if self.locals.len() < self.config.max_locals {
                self.locals.resize(self.config.max_locals, Value::Int(0));
            }
        } else {
            self.locals.clear();
            self.locals.resize(self.config.max_locals, Value::Int(0));
        }

        let mut ip = program.main_entry as usize;
        let mut bp = 0usize;
        // Slot footprint of the currently executing function; CALL uses it to
        // place the callee frame just past the caller's slots.
        let mut frame_locals = program.main_locals as usize;

        while ip < program.code.len() {
            let instr = program.code[ip];
            let Some(op) = Opcode::from_u8(instr.opcode) else {
                return Err(VmError::at(
                    VmErrorKind::UnknownOpcode,
                    ip,
                    format!("Unknown opcode {:#04x}", instr.opcode),
                ));
            };
            if let Some(p) = profiler.as_deref_mut() {
                p.on_execute(op);
            }
            if self.config.trace {
                eprintln!("[trace] {ip:04} {} {}", op.mnemonic(), instr.operand);
            }
            let operand = instr.operand;

            match op {
                Opcode::Const => {
                    let Some(value) = program.constants.get(operand as usize).cloned() else {
                        return Err(VmError::at(
                            VmErrorKind::InvalidConstant,
                            ip,
                            format!("Invalid constant index {operand}"),
                        ));
                    };
                    self.push(value, ip)?;
                    ip += 1;
                }
                Opcode::Load => {
                    let slot = bp + operand as usize;
                    if slot >= self.locals.len() {
                        return Err(VmError::at(
                            VmErrorKind::InvalidLocal,
                            ip,
                            format!("Invalid local slot {slot}"),
                        ));
                    }
                    let value = self.locals[slot].clone();
                    self.push(value, ip)?;
                    ip += 1;
                }
                Opcode::Store => {
                    let value = self.pop(ip)?;
                    let slot = bp + operand as usize;
                    if slot >= self.locals.len() {
                        return Err(VmError::at(
                            VmErrorKind::InvalidLocal,
                            ip,
                            format!("Invalid local slot {slot}"),
                        ));
                    }
                    self.locals[slot] = value;
                    ip += 1;
                }
                Opcode::Add => {
                    let b = self.pop(ip)?;
                    let a = self.pop(ip)?;
                    let result = match (a, b) {
                        (Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_add(b)),
                        (Value::Str(a), Value::Str(b)) => Value::Str(a + &b),
                        (a, b) => {
                            return Err(VmError::at(
                                VmErrorKind::TypeMismatch,
                                ip,
                                format!(
                                    "ADD requires two ints or two strings, got {} and {}",
                                    a.type_name(),
                                    b.type_name()
                                ),
                            ));
                        }
                    };
                    self.push(result, ip)?;
                    ip += 1;
                }
                Opcode::Sub
                | Opcode::Mul
                | Opcode::Div
                | Opcode::Mod
                | Opcode::Lt
                | Opcode::Lte
                | Opcode::Gt
                | Opcode::Gte => {
                    let b = self.pop_int(op, ip)?;
                    let a = self.pop_int(op, ip)?;
                    let result = match op {
                        Opcode::Sub => Value::Int(a.wrapping_sub(b)),
                        Opcode::Mul => Value::Int(a.wrapping_mul(b)),
                        Opcode::Div => {
                            if b == 0 {
                                return Err(VmError::at(
                                    VmErrorKind::DivisionByZero,
                                    ip,
                                    "Division by zero",
                                ));
                            }
                            Value::Int(a.wrapping_div(b))
                        }
                        Opcode::Mod => {
                            if b == 0 {
                                return Err(VmError::at(
                                    VmErrorKind::DivisionByZero,
                                    ip,
                                    "Modulo by zero",
                                ));
                            }
                            Value::Int(a.wrapping_rem(b))
                        }
                        Opcode::Lt => Value::Int((a < b) as i32),
                        Opcode::Lte => Value::Int((a <= b) as i32),
                        Opcode::Gt => Value::Int((a > b) as i32),
                        Opcode::Gte => Value::Int((a >= b) as i32),
                        _ => unreachable!(),
                    };
                    self.push(result, ip)?;
                    ip += 1;
                }
                Opcode::Eq => {
                    let b = self.pop(ip)?;
                    let a = self.pop(ip)?;
                    self.push(Value::Int((a == b) as i32), ip)?;
                    ip += 1;
                }
                Opcode::Neq => {
                    let b = self.pop(ip)?;
                    let a = self.pop(ip)?;
                    self.push(Value::Int((a != b) as i32), ip)?;
                    ip += 1;
                }
                Opcode::Jump => {
                    ip = operand as usize;
                }
                Opcode::JumpIfZero => {
                    let value = self.pop(ip)?;
                    if matches!(value, Value::Int(0)) {
                        ip = operand as usize;
                    } else {
                        ip += 1;
                    }
                }
                Opcode::Call => {
                    let Some(callee) = program.functions.get(operand as usize) else {
                        return Err(VmError::at(
                            VmErrorKind::InvalidFunction,
                            ip,
                            format!("Invalid function index {operand}"),
                        ));
                    };
                    if self.frames.len() >= self.config.max_call_depth {
                        return Err(VmError::at(
                            VmErrorKind::StackOverflow,
                            ip,
                            format!("Call depth limit exceeded ({})", self.config.max_call_depth),
                        ));
                    }
                    let new_base = bp + frame_locals;
                    let arity = callee.arity as usize;
                    let needed = new_base + (callee.local_count as usize).max(arity);
                    if needed > self.locals.len() {
                        return Err(VmError::at(
                            VmErrorKind::StackOverflow,
                            ip,
                            format!("Out of local slots calling `{}`", callee.name),
                        ));
                    }
                    // Arguments are on the stack left to right, so the top of
                    // the stack fills the last parameter slot.
                    for i in (0..arity).rev() {
                        let arg = self.pop(ip)?;
                        self.locals[new_base + i] = arg;
                    }
                    self.frames.push(Frame {
                        return_ip: (ip + 1) as u16,
                        saved_bp: bp as u16,
                        saved_locals: frame_locals as u16,
                        func: operand,
                    });
                    bp = new_base;
                    frame_locals = callee.local_count as usize;
                    ip = callee.entry as usize;
                }
                Opcode::Return => {
                    let value = self.pop(ip)?;
                    match self.frames.pop() {
                        // Returning from the outermost frame ends the program.
                        None => return Ok(value),
                        Some(frame) => {
                            ip = frame.return_ip as usize;
                            bp = frame.saved_bp as usize;
                            frame_locals = frame.saved_locals as usize;
                            self.push(value, ip)?;
                        }
                    }
                }
                Opcode::Print => {
                    let value = self.pop(ip)?;
                    host.write_line(&value.render())?;
                    self.printed.push(value);
                    ip += 1;
                }
                Opcode::BuildArray => {
                    let count = operand as usize;
                    let mut items = vec![Value::Void; count];
                    for i in (0..count).rev() {
                        items[i] = self.pop(ip)?;
                    }
                    self.push(Value::array(items), ip)?;
                    ip += 1;
                }
                Opcode::ArrayLoad => {
                    let index = self.pop(ip)?;
                    let target = self.pop(ip)?;
                    let value = {
                        let (array, idx) = check_index(&target, &index, ip)?;
                        array.borrow()[idx].clone()
                    };
                    self.push(value, ip)?;
                    ip += 1;
                }
                Opcode::ArrayStore => {
                    let value = self.pop(ip)?;
                    let index = self.pop(ip)?;
                    let target = self.pop(ip)?;
                    let (array, idx) = check_index(&target, &index, ip)?;
                    array.borrow_mut()[idx] = value;
                    ip += 1;
                }
                Opcode::Pop => {
                    self.pop(ip)?;
                    ip += 1;
                }
            }
        }

        // Fell off the end (shell fragments have no footer): the result is
        // whatever is on top of the stack, if anything.
        Ok(self.stack.pop().unwrap_or(Value::Void))
    }

    fn push(&mut self, value: Value, ip: usize) -> Result<(), VmError> {
        if self.stack.len() >= self.config.max_stack {
            return Err(VmError::at(VmErrorKind::StackOverflow, ip, "Stack overflow"));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self, ip: usize) -> Result<Value, VmError> {
        self.stack
            .pop()
            .ok_or_else(|| VmError::at(VmErrorKind::StackUnderflow, ip, "Stack underflow"))
    }

    fn pop_int(&mut self, op: Opcode, ip: usize) -> Result<i32, VmError> {
        match self.pop(ip)? {
            Value::Int(v) => Ok(v),
            other => Err(VmError::at(
                VmErrorKind::TypeMismatch,
                ip,
                format!("{} requires integers, got {}", op.mnemonic(), other.type_name()),
            )),
        }
    }
}

fn check_index<'a>(
    target: &'a Value,
    index: &Value,
    ip: usize,
) -> Result<(&'a crate::bytecode::ArrayRef, usize), VmError> {
    let Value::Array(array) = target else {
        return Err(VmError::at(
            VmErrorKind::TypeMismatch,
            ip,
            format!("Expected array for indexing, got {}", target.type_name()),
        ));
    };
    let Value::Int(idx) = index else {
        return Err(VmError::at(
            VmErrorKind::TypeMismatch,
            ip,
            format!("Array index must be an integer, got {}", index.type_name()),
        ));
    };
    let len = array.borrow().len();
    if *idx < 0 || *idx as usize >= len {
        return Err(VmError::at(
            VmErrorKind::IndexOutOfBounds,
            ip,
            format!("Array index {idx} out of bounds (length {len})"),
        ));
    }
    Ok((array, *idx as usize))
}
