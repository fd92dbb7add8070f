//! Termination signal handling.
//!
//! SIGINT and SIGTERM cancel the session token so that a poll sleeping
//! between attempts returns promptly. If the process is not in a poll, for
//! example while blocked reading stdin, the signal's default action is
//! applied after a grace period.

use multinode_client::CancellationToken;

use crate::errors::AppError;

#[cfg(unix)]
mod imp {
    use std::thread;
    use std::time::Duration;

    use multinode_client::CancellationToken;
    use signal_hook::consts::signal::{SIGINT, SIGTERM};
    use signal_hook::iterator::{Handle, Signals};
    use signal_hook::low_level::emulate_default_handler;
    use tracing::{info, warn};

    use crate::errors::AppError;

    const SHUTDOWN_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::shutdown");

    /// Time the main thread has to unwind after a cancellation.
    const GRACE_PERIOD: Duration = Duration::from_secs(2);

    pub(crate) struct SignalGuard {
        handle: Handle,
        finished: CancellationToken,
        thread: Option<thread::JoinHandle<()>>,
    }

    pub(crate) fn install(cancel: CancellationToken) -> Result<SignalGuard, AppError> {
        let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(AppError::InstallSignals)?;
        let handle = signals.handle();
        let finished = CancellationToken::new();
        let watcher = finished.clone();
        let thread = thread::spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!(
                    target: SHUTDOWN_TARGET,
                    signal,
                    grace_ms = GRACE_PERIOD.as_millis(),
                    "termination signal received; cancelling session"
                );
                cancel.cancel();
                if !watcher.wait_timeout(GRACE_PERIOD)
                    && let Err(error) = emulate_default_handler(signal)
                {
                    warn!(
                        target: SHUTDOWN_TARGET,
                        error = %error,
                        "failed to apply default signal action"
                    );
                }
            }
        });
        Ok(SignalGuard {
            handle,
            finished,
            thread: Some(thread),
        })
    }

    impl Drop for SignalGuard {
        fn drop(&mut self) {
            self.finished.cancel();
            self.handle.close();
            if let Some(thread) = self.thread.take() {
                drop(thread.join());
            }
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use multinode_client::CancellationToken;

    use crate::errors::AppError;

    pub(crate) struct SignalGuard;

    pub(crate) fn install(_cancel: CancellationToken) -> Result<SignalGuard, AppError> {
        Ok(SignalGuard)
    }
}

pub(crate) use imp::SignalGuard;

/// Starts cancelling `cancel` on SIGINT or SIGTERM until the guard drops.
pub(crate) fn install(cancel: CancellationToken) -> Result<SignalGuard, AppError> {
    imp::install(cancel)
}
