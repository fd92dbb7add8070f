//! Reconnecting request/response client for the coordinator.
//!
//! Every exchange opens a new TCP connection, writes one JSON request,
//! half-closes, reads one reply and closes. A `wait` reply means the
//! coordinator has not yet got what the request asks for, so the poller
//! sleeps and sends the same request again. Connection failures are retried
//! with a growing delay; the delay returns to its base once a connection
//! succeeds.

mod backoff;
mod cancel;
mod connector;
mod errors;

use std::io;
use std::time::Duration;

use multinode_config::{ConfigError, PollerConfig};
use serde_json::Value;
use tracing::{debug, error, info, warn};

pub use self::backoff::RetryPolicy;
pub use self::cancel::{CancellationToken, Sleeper, ThreadSleeper};
pub use self::connector::{Connection, Connector, TcpConnector};
pub use self::errors::PollError;

use self::backoff::Backoff;
use crate::reply::PollReply;

pub(crate) const TRANSPORT_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::transport");

/// Interval between "still waiting" log lines.
const WAIT_LOG_PERIOD: Duration = Duration::from_secs(10);

/// Sends one request and blocks until the coordinator gives a terminal reply.
pub trait Transport {
    /// Polls the coordinator with the serialised `request`.
    ///
    /// # Errors
    ///
    /// Returns [`PollError`] when the poll is cancelled or its retry policy
    /// runs out. Socket failures are retried, not returned.
    fn poll(&self, request: &str, cancel: &CancellationToken) -> Result<PollReply, PollError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn poll(&self, request: &str, cancel: &CancellationToken) -> Result<PollReply, PollError> {
        (**self).poll(request, cancel)
    }
}

/// Blocking coordinator client.
///
/// Holds its configuration as instance state, so pollers pointed at
/// different coordinators can coexist in one process.
#[derive(Debug, Clone)]
pub struct Poller<C = TcpConnector, S = ThreadSleeper> {
    config: PollerConfig,
    retry: RetryPolicy,
    connector: C,
    sleeper: S,
}

impl Poller {
    /// Builds a TCP poller from decoded configuration.
    #[must_use]
    pub fn new(config: PollerConfig) -> Self {
        Self::with_parts(config, TcpConnector, ThreadSleeper)
    }

    /// Builds a TCP poller from the JSON configuration string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the string is not valid configuration;
    /// without it no coordination is possible.
    pub fn from_json(config: &str) -> Result<Self, ConfigError> {
        PollerConfig::from_json(config).map(Self::new)
    }
}

impl<C, S> Poller<C, S> {
    /// Builds a poller from explicit connector and sleeper implementations.
    #[must_use]
    pub fn with_parts(config: PollerConfig, connector: C, sleeper: S) -> Self {
        Self {
            config,
            retry: RetryPolicy::forever(),
            connector,
            sleeper,
        }
    }

    /// Replaces the retry policy applied to every poll.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Poller configuration.
    #[must_use]
    pub const fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Retry policy applied to every poll.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Connector used to open connections.
    #[must_use]
    pub const fn connector(&self) -> &C {
        &self.connector
    }

    /// Sleeper used between attempts.
    #[must_use]
    pub const fn sleeper(&self) -> &S {
        &self.sleeper
    }
}

impl<C: Connector, S: Sleeper> Transport for Poller<C, S> {
    fn poll(&self, request: &str, cancel: &CancellationToken) -> Result<PollReply, PollError> {
        let endpoint = self.config.endpoint();
        let mut budget = self.retry.begin();
        let mut backoff = Backoff::new(self.config.poll_delay, self.config.backoff_increment);
        let wait_log_every = wait_log_interval(self.config.poll_delay);
        let mut waits: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(PollError::Cancelled);
            }
            let attempt = budget.begin_attempt(&endpoint)?;

            let mut connection = match self.connector.connect(&endpoint) {
                Ok(connection) => connection,
                Err(source) => {
                    let delay = budget.clamp(backoff.current());
                    warn!(
                        target: TRANSPORT_TARGET,
                        endpoint = %endpoint,
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %source,
                        "coordinator connection failed; backing off"
                    );
                    self.sleeper.sleep(delay, cancel);
                    backoff.grow();
                    continue;
                }
            };
            backoff.reset();

            let exchanged = exchange(
                &mut connection,
                request,
                self.config.blocksize,
                budget.remaining(),
            );
            let raw = match exchanged {
                Ok(raw) => raw,
                Err(source) => {
                    warn!(
                        target: TRANSPORT_TARGET,
                        endpoint = %endpoint,
                        attempt,
                        error = %source,
                        "coordinator exchange failed; retrying"
                    );
                    continue;
                }
            };
            drop(connection);

            match classify(raw) {
                Classified::Wait => {
                    waits = waits.saturating_add(1);
                    if waits.is_multiple_of(wait_log_every) {
                        info!(
                            target: TRANSPORT_TARGET,
                            endpoint = %endpoint,
                            waits,
                            "still waiting for the coordinator"
                        );
                    }
                    self.sleeper.sleep(budget.clamp(backoff.current()), cancel);
                }
                Classified::Terminal(value) => {
                    debug!(
                        target: TRANSPORT_TARGET,
                        endpoint = %endpoint,
                        attempt,
                        "coordinator replied"
                    );
                    return Ok(PollReply::Terminal(value));
                }
                Classified::Undecodable(text) => {
                    error!(
                        target: TRANSPORT_TARGET,
                        endpoint = %endpoint,
                        reply = %text,
                        "coordinator reply is not valid JSON"
                    );
                    return Ok(PollReply::Undecodable(text));
                }
            }
        }
    }
}

enum Classified {
    Wait,
    Terminal(Value),
    Undecodable(String),
}

/// A stalled coordinator surfaces as a timed-out read once a deadline is
/// set, so the budget check on the next attempt can end the poll.
fn exchange<T: Connection>(
    connection: &mut T,
    request: &str,
    blocksize: usize,
    timeout: Option<Duration>,
) -> io::Result<Vec<u8>> {
    connection.set_exchange_timeout(timeout)?;
    connection.send_request(request.as_bytes())?;
    connection.read_response(blocksize)
}

fn classify(raw: Vec<u8>) -> Classified {
    match serde_json::from_slice::<Value>(&raw) {
        Ok(value) if value.get("response").and_then(Value::as_str) == Some("wait") => {
            Classified::Wait
        }
        Ok(value) => Classified::Terminal(value),
        Err(_) => Classified::Undecodable(String::from_utf8_lossy(&raw).into_owned()),
    }
}

/// Number of consecutive waits between progress logs: `max(1, 10s / delay)`.
fn wait_log_interval(poll_delay: Duration) -> u64 {
    let per_period = WAIT_LOG_PERIOD
        .as_millis()
        .checked_div(poll_delay.as_millis())
        .unwrap_or(1);
    u64::try_from(per_period).unwrap_or(u64::MAX).max(1)
}
