//! Stack virtual machine.
//!
//! Internals are split into:
//! - `error`: runtime error types with stable `E-VM-*` codes
//! - `config`: execution resource bounds
//! - `host_trait` + `host`: output sink boundary for `print`
//! - `profiler`: opcode-frequency statistics for `--profile`
//! - `run`: the dispatch loop and instruction handlers

mod config;
mod error;
mod host;
mod host_trait;
mod profiler;
mod run;

use crate::bytecode::{BytecodeProgram, Value};

pub use config::{VmConfig, DEFAULT_MAX_CALL_DEPTH};
pub use error::{VmError, VmErrorKind};
pub use host::{StdIoHost, TestHost};
pub use host_trait::OutputHost;
pub use profiler::Profiler;

/// One function invocation: where to resume, the caller's frame base and
/// size, and which function is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Frame {
    pub(crate) return_ip: u16,
    pub(crate) saved_bp: u16,
    pub(crate) saved_locals: u16,
    pub(crate) func: u16,
}

/// Executes a [`BytecodeProgram`]. State lives on the `Vm` value; two
/// executions on different `Vm`s share nothing. The locals array survives
/// across [`Vm::execute_incremental`] calls so the interactive shell keeps
/// its variables; the value stack and call stack are cleared per execution.
#[derive(Debug, Clone, Default)]
pub struct Vm {
    stack: Vec<Value>,
    locals: Vec<Value>,
    frames: Vec<Frame>,
    printed: Vec<Value>,
    config: VmConfig,
}

impl Vm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: VmConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Run a program from its main entry until the outermost `RETURN` (or
    /// until execution falls off the end of the code).
    pub fn execute(
        &mut self,
        program: &BytecodeProgram,
        host: &mut dyn OutputHost,
    ) -> Result<Value, VmError> {
        self.run(program, host, None, false)
    }

    /// Shell mode: like [`Vm::execute`] but local slots keep their values
    /// from the previous fragment.
    pub fn execute_incremental(
        &mut self,
        program: &BytecodeProgram,
        host: &mut dyn OutputHost,
    ) -> Result<Value, VmError> {
        self.run(program, host, None, true)
    }

    /// Run with per-instruction profiling.
    pub fn execute_profiled(
        &mut self,
        program: &BytecodeProgram,
        host: &mut dyn OutputHost,
        profiler: &mut Profiler,
    ) -> Result<Value, VmError> {
        self.run(program, host, Some(profiler), false)
    }

    /// Every value printed by the last execution, in order.
    pub fn printed(&self) -> &[Value] {
        &self.printed
    }
}
