//! Command-line arguments for the node binary.

use std::num::NonZeroU32;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use multinode_client::RetryPolicy;
use multinode_config::{
    CoordinatorEndpoint, DEFAULT_LOG_FILTER, LogFormat, LoggingConfig, default_log_format,
};

/// Joins a MultiNode group and relays synchronisation signals.
///
/// Registers with the coordinator, prints the group's roles as one JSON line,
/// then reads one signal per line from stdin and prints each reply.
#[derive(Parser, Debug)]
#[command(name = "lava-node", version)]
pub(crate) struct Cli {
    /// Tracing filter expression, for example `info` or `multinode_client=debug`.
    #[arg(long, value_name = "EXPR", default_value = DEFAULT_LOG_FILTER)]
    pub(crate) log_filter: String,
    /// Log output format.
    #[arg(long, value_name = "FORMAT", default_value_t = default_log_format())]
    pub(crate) log_format: LogFormat,
    /// Coordinator settings file; the system file is used when present.
    #[arg(long, value_name = "PATH")]
    pub(crate) coordinator_config: Option<Utf8PathBuf>,
    /// Coordinator address, overriding the job and settings file.
    #[arg(long, value_name = "HOST:PORT")]
    pub(crate) coordinator: Option<CoordinatorEndpoint>,
    /// Gives up a request after this many connection attempts.
    #[arg(long, value_name = "N")]
    pub(crate) max_attempts: Option<NonZeroU32>,
    /// Gives up a request after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub(crate) deadline_secs: Option<u64>,
    /// Asks the coordinator to clear the group when stdin closes.
    #[arg(long)]
    pub(crate) clear_group: bool,
    /// Prints test-shell completion lines instead of JSON replies.
    #[arg(long)]
    pub(crate) completion_lines: bool,
    /// Job definition in JSON.
    #[arg(value_name = "JOB_FILE")]
    pub(crate) job: Utf8PathBuf,
}

impl Cli {
    pub(crate) fn logging(&self) -> LoggingConfig {
        LoggingConfig::new(self.log_filter.as_str(), self.log_format)
    }

    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::forever();
        if let Some(attempts) = self.max_attempts {
            policy = policy.with_max_attempts(attempts);
        }
        if let Some(seconds) = self.deadline_secs {
            policy = policy.with_deadline(Duration::from_secs(seconds));
        }
        policy
    }
}
