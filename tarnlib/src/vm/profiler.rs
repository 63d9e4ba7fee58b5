use std::time::{Duration, Instant};

use crate::bytecode::{Opcode, OPCODE_COUNT};

/// Opcode-frequency profiler. The VM calls [`Profiler::on_execute`] once per
/// dispatched instruction when profiling is requested.
#[derive(Debug, Clone, Default)]
pub struct Profiler {
    counts: [u64; OPCODE_COUNT],
    total: u64,
    started_at: Option<Instant>,
    elapsed: Duration,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_execute(&mut self, op: Opcode) {
        self.counts[op as u8 as usize] += 1;
        self.total += 1;
    }

    pub fn start_timing(&mut self) {
        self.started_at = Some(Instant::now());
    }

    pub fn stop_timing(&mut self) {
        if let Some(started) = self.started_at.take() {
            self.elapsed = started.elapsed();
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1_000.0
    }

    pub fn total_instructions(&self) -> u64 {
        self.total
    }

    pub fn count(&self, op: Opcode) -> u64 {
        self.counts[op as u8 as usize]
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Statistics table, opcodes in numeric order, zero counts omitted.
    pub fn report(&self) -> String {
        let mut out = String::new();
        out.push_str("=== Profiler Statistics ===\n");
        out.push_str(&format!("Total instructions: {}\n", self.total));
        out.push_str(&format!("Elapsed time: {:.3} ms\n", self.elapsed_ms()));
        out.push_str("Opcode counts:\n");
        for byte in 0..OPCODE_COUNT {
            let count = self.counts[byte];
            if count == 0 {
                continue;
            }
            if let Some(op) = Opcode::from_u8(byte as u8) {
                out.push_str(&format!("  {}: {count}\n", op.mnemonic()));
            }
        }
        out
    }
}
