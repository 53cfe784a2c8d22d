use crate::error::ShellError;
use crate::interpreter::ShellState;
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// Processes killed by a signal report `128 + signal`, as POSIX shells do.
pub type ExitCode = i32;

/// Object-safe form of a command that runs inside the shell process.
///
/// Implemented for every built-in through a blanket impl, and for the value
/// that reports an argument parsing failure.
pub trait ExecutableCommand {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        shell: &mut ShellState,
    ) -> Result<ExitCode, ShellError>;
}
