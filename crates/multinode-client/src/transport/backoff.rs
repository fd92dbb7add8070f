//! Back-off state and retry limits for one poll.

use std::num::NonZeroU32;
use std::time::{Duration, Instant};

use multinode_config::CoordinatorEndpoint;

use super::PollError;

/// Delay between attempts within one poll.
///
/// Each failed connection adds the increment; a successful connection
/// returns the delay to its base value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Backoff {
    base: Duration,
    increment: Duration,
    current: Duration,
}

impl Backoff {
    pub(crate) const fn new(base: Duration, increment: Duration) -> Self {
        Self {
            base,
            increment,
            current: base,
        }
    }

    pub(crate) const fn current(&self) -> Duration {
        self.current
    }

    pub(crate) const fn reset(&mut self) {
        self.current = self.base;
    }

    pub(crate) const fn grow(&mut self) {
        self.current = self.current.saturating_add(self.increment);
    }
}

/// Limits on how long a single poll keeps trying.
///
/// The default policy retries forever, which is how nodes behave when the
/// coordinator is slow to come up. Both limits may be combined; whichever is
/// reached first ends the poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: Option<NonZeroU32>,
    deadline: Option<Duration>,
}

impl RetryPolicy {
    /// Retries until the coordinator answers or the poll is cancelled.
    #[must_use]
    pub const fn forever() -> Self {
        Self {
            max_attempts: None,
            deadline: None,
        }
    }

    /// Caps the number of connection attempts, counting attempts that were
    /// answered with `wait`.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: NonZeroU32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Caps the wall-clock time spent in one poll. The first attempt is
    /// always made.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attempt cap, if any.
    #[must_use]
    pub const fn max_attempts(&self) -> Option<NonZeroU32> {
        self.max_attempts
    }

    /// Deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub(crate) fn begin(self) -> RetryBudget {
        RetryBudget {
            policy: self,
            started: Instant::now(),
            attempts: 0,
        }
    }
}

/// Attempts and time consumed by one poll.
#[derive(Debug)]
pub(crate) struct RetryBudget {
    policy: RetryPolicy,
    started: Instant,
    attempts: u32,
}

impl RetryBudget {
    /// Records the start of another attempt and returns its 1-based number.
    pub(crate) fn begin_attempt(&mut self, endpoint: &CoordinatorEndpoint) -> Result<u32, PollError> {
        if let Some(limit) = self.policy.max_attempts
            && self.attempts >= limit.get()
        {
            return Err(PollError::AttemptsExhausted {
                endpoint: endpoint.clone(),
                attempts: self.attempts,
            });
        }
        if let Some(deadline) = self.policy.deadline
            && self.attempts > 0
            && self.started.elapsed() >= deadline
        {
            return Err(PollError::DeadlineExceeded {
                endpoint: endpoint.clone(),
                deadline,
            });
        }
        self.attempts = self.attempts.saturating_add(1);
        Ok(self.attempts)
    }

    /// Time left before the deadline, or `None` when the poll is unbounded.
    pub(crate) fn remaining(&self) -> Option<Duration> {
        self.policy
            .deadline
            .map(|deadline| deadline.saturating_sub(self.started.elapsed()))
    }

    /// Shortens `delay` so a sleep never runs past the deadline.
    pub(crate) fn clamp(&self, delay: Duration) -> Duration {
        self.remaining().map_or(delay, |left| delay.min(left))
    }
}
