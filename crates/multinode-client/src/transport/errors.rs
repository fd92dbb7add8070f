//! Errors that end a poll without a reply.

use std::time::Duration;

use multinode_config::CoordinatorEndpoint;
use thiserror::Error;

/// Reasons a poll stopped before the coordinator gave a terminal reply.
///
/// Socket failures are retried and never surface here; only the retry
/// policy or a cancellation can end a poll early.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PollError {
    /// The cancellation token was triggered.
    #[error("poll cancelled")]
    Cancelled,
    /// The retry policy's attempt limit was reached.
    #[error("gave up on coordinator {endpoint} after {attempts} connection attempts")]
    AttemptsExhausted {
        /// Coordinator being polled.
        endpoint: CoordinatorEndpoint,
        /// Connection attempts made.
        attempts: u32,
    },
    /// The retry policy's deadline passed.
    #[error("gave up on coordinator {endpoint} after {deadline:?}")]
    DeadlineExceeded {
        /// Coordinator being polled.
        endpoint: CoordinatorEndpoint,
        /// Deadline that elapsed.
        deadline: Duration,
    },
}
