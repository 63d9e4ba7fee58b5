use super::VmError;

/// Where `print` output goes. One rendered line per print, no newline in
/// `line`; the host decides how to terminate it.
pub trait OutputHost {
    fn write_line(&mut self, line: &str) -> Result<(), VmError>;
}
