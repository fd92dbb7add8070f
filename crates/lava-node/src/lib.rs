//! Runtime for the `lava-node` binary.
//!
//! The binary is the glue between a test shell and the group coordinator. It
//! reads the job definition, registers the node with its group, and then
//! relays synchronisation signals read from stdin, one JSON object per line.
//! Each reply is written to stdout as a JSON line, or as the completion line
//! a test shell expects when `--completion-lines` is given.
//!
//! Logs go to stderr so that stdout can be piped straight back into the test
//! shell.

use std::ffi::OsString;
use std::io::{BufRead, Write};
use std::process::ExitCode;

use clap::Parser;
use multinode_client::{
    CancellationToken, GroupDescriptor, GroupSession, Poller, SignalReply, SignalRouter,
};
use serde_json::{Value, json};
use tracing::info;

mod cli;
mod errors;
mod job;
mod shutdown;
mod telemetry;

use cli::Cli;
use errors::AppError;

const NODE_TARGET: &str = env!("CARGO_CRATE_NAME");

/// Runs the node using the provided arguments and IO handles.
///
/// Help and version requests exit successfully. Every other failure is
/// written to `stderr` and yields [`ExitCode::FAILURE`].
#[must_use]
pub fn run<I, R, W, E>(args: I, stdin: R, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) if error.use_stderr() => {
            drop(write!(stderr, "{}", error.render()));
            return ExitCode::FAILURE;
        }
        Err(error) => {
            drop(write!(stdout, "{}", error.render()));
            return ExitCode::SUCCESS;
        }
    };

    match execute(&cli, stdin, stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            drop(writeln!(stderr, "lava-node: {error}"));
            ExitCode::FAILURE
        }
    }
}

fn execute<R, W>(cli: &Cli, stdin: R, stdout: &mut W) -> Result<(), AppError>
where
    R: BufRead,
    W: Write,
{
    telemetry::initialise(&cli.logging())?;

    let job = job::load_job(&cli.job)?;
    let parsed = GroupDescriptor::from_job(&job)?;
    let config = job::resolve_poller_config(cli, &parsed)?;
    // The envelope names the coordinator actually in use.
    let descriptor = parsed.with_coordinator(&config.endpoint());

    let cancel = CancellationToken::new();
    let _signals = shutdown::install(cancel.clone())?;
    let poller = Poller::new(config).with_retry_policy(cli.retry_policy());
    let session = GroupSession::new(descriptor, poller).with_cancellation(cancel);

    let group = session.run()?;
    write_line(stdout, &group.reply().to_string())?;

    let router = SignalRouter::new(&session);
    for line in stdin.lines() {
        let signal = line.map_err(AppError::ReadSignals)?;
        if let Some(reply) = router.route(&signal)? {
            emit(cli, stdout, &reply)?;
        }
    }

    if cli.clear_group {
        session.finalise()?;
    } else {
        session.close();
    }
    info!(target: NODE_TARGET, "signal input closed; node finished");
    Ok(())
}

fn emit<W: Write>(cli: &Cli, stdout: &mut W, reply: &SignalReply) -> Result<(), AppError> {
    if cli.completion_lines {
        return match reply.completion_line() {
            Some(line) => write_line(stdout, &line),
            None => Ok(()),
        };
    }
    let rendered: Value = json!({
        "request": reply.kind().as_str(),
        "messageID": reply.message_id(),
        "reply": reply.value(),
    });
    let text = serde_json::to_string(&rendered).map_err(AppError::SerialiseOutput)?;
    write_line(stdout, &text)
}

fn write_line<W: Write>(stdout: &mut W, line: &str) -> Result<(), AppError> {
    writeln!(stdout, "{line}").map_err(AppError::WriteOutput)?;
    stdout.flush().map_err(AppError::WriteOutput)
}

#[cfg(test)]
mod tests;
