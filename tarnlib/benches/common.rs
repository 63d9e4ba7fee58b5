#![allow(dead_code)]

use tarnlib::bytecode::{compile_source, BytecodeProgram, Value};
use tarnlib::vm::{TestHost, Vm};

pub fn compile_program(src: &str) -> BytecodeProgram {
    compile_source(src).expect("bench source compiles")
}

pub fn run_vm(program: &BytecodeProgram) -> Value {
    let mut vm = Vm::new();
    let mut host = TestHost::default();
    vm.execute(program, &mut host).expect("bench program runs")
}

pub fn src_loop_accumulate(iterations: usize) -> String {
    format!(
        r#"
let acc = 0;
for (let i = 0; i < {iterations}; i = i + 1) {{
  acc = acc + i % 7;
}}
return acc;
"#
    )
}

pub fn src_function_call_chain(iterations: usize) -> String {
    format!(
        r#"
fn bump(x) {{
  return x + 1;
}}
let acc = 0;
for (let i = 0; i < {iterations}; i = i + 1) {{
  acc = bump(acc);
}}
return acc;
"#
    )
}

pub fn src_array_workload(size: usize) -> String {
    format!(
        r#"
fn sum(arr, n) {{
  let total = 0;
  for (let i = 0; i < n; i = i + 1) {{
    total = total + arr[i];
  }}
  return total;
}}
let data = [0, 0, 0, 0, 0, 0, 0, 0];
let acc = 0;
for (let round = 0; round < {size}; round = round + 1) {{
  data[round % 8] = round;
  acc = acc + sum(data, 8);
}}
return acc;
"#
    )
}

pub fn src_branchy(iterations: usize) -> String {
    format!(
        r#"
let odd = 0;
let even = 0;
for (let i = 0; i < {iterations}; i = i + 1) {{
  if (i % 2 == 0) {{
    even = even + 1;
  }}
  if (i % 2 == 1 && i > 10 || i == 3) {{
    odd = odd + 1;
  }}
}}
return odd + even;
"#
    )
}

pub fn src_wide_program(functions: usize) -> String {
    let mut src = String::new();
    for i in 0..functions {
        src.push_str(&format!("fn f{i}(x) {{ return x + {i}; }}\n"));
    }
    src.push_str("let acc = 0;\n");
    for i in 0..functions {
        src.push_str(&format!("acc = f{i}(acc);\n"));
    }
    src.push_str("return acc;\n");
    src
}
