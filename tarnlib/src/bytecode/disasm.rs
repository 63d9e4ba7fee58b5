use super::{BytecodeProgram, Value};

impl BytecodeProgram {
    /// Human-readable listing of the whole program, for `--dump`.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        out.push_str("=== Bytecode Program ===\n");

        out.push_str(&format!("Constants: {}\n", self.constants.len()));
        for (i, value) in self.constants.iter().enumerate() {
            out.push_str(&format!("  [{i}] = {}\n", fmt_constant(value)));
        }

        out.push_str(&format!("Functions: {}\n", self.functions.len()));
        for f in &self.functions {
            out.push_str(&format!(
                "  {} entry={} arity={} locals={}\n",
                f.name, f.entry, f.arity, f.local_count
            ));
        }

        out.push_str(&format!("Code: {} instructions\n", self.code.len()));
        for (ip, instr) in self.code.iter().enumerate() {
            match instr.op() {
                Some(op) if op.has_operand() => {
                    out.push_str(&format!("  [{ip}] {} {}\n", op.mnemonic(), instr.operand));
                }
                Some(op) => {
                    out.push_str(&format!("  [{ip}] {}\n", op.mnemonic()));
                }
                None => {
                    out.push_str(&format!("  [{ip}] UNKNOWN({:#04x})\n", instr.opcode));
                }
            }
        }

        out.push_str(&format!("Main entry: {}\n", self.main_entry));
        out
    }
}

fn fmt_constant(value: &Value) -> String {
    match value {
        Value::Str(s) => format!("{s:?}"),
        other => other.render(),
    }
}
