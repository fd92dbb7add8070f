//! Entry point for the MultiNode node binary.
//!
//! Delegates to [`lava_node::run`] with the process arguments and standard
//! streams.

use std::io::{self, StderrLock, StdinLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let stdin: StdinLock<'_> = io::stdin().lock();
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    lava_node::run(std::env::args_os(), stdin, &mut stdout, &mut stderr)
}
