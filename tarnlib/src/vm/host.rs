use std::io::{self, Write};

use super::{OutputHost, VmError, VmErrorKind};

/// Prints to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdIoHost;

impl OutputHost for StdIoHost {
    fn write_line(&mut self, line: &str) -> Result<(), VmError> {
        writeln!(io::stdout(), "{line}")
            .map_err(|e| VmError::new(VmErrorKind::Host, e.to_string()))
    }
}

/// Captures output in memory for tests.
#[derive(Debug, Clone, Default)]
pub struct TestHost {
    pub output: String,
}

impl OutputHost for TestHost {
    fn write_line(&mut self, line: &str) -> Result<(), VmError> {
        self.output.push_str(line);
        self.output.push('\n');
        Ok(())
    }
}

impl TestHost {
    pub fn lines(&self) -> Vec<&str> {
        self.output.lines().collect()
    }
}
