//! In-process connector, sleeper and transport doubles.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use multinode_config::CoordinatorEndpoint;
use serde_json::{Value, json};

use crate::reply::PollReply;
use crate::transport::{
    CancellationToken, Connection, Connector, PollError, Sleeper, Transport,
};

/// Outcome of one scripted connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// The connection is refused.
    Refuse,
    /// The connection succeeds and the coordinator answers with the text.
    Reply(String),
    /// The connection succeeds but the exchange fails.
    Fail,
}

impl Script {
    /// A `{"response": status}` reply.
    #[must_use]
    pub fn status(status: &str) -> Self {
        Self::Reply(json!({ "response": status }).to_string())
    }
}

/// Connector that plays back a script, one entry per attempt.
///
/// Attempts beyond the end of the script are refused.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    attempts: Arc<Mutex<u32>>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl ScriptedConnector {
    /// Builds a connector playing `scripts` in order.
    #[must_use]
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts.into_iter().collect())),
            ..Self::default()
        }
    }

    /// Connection attempts made so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        *self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Requests written on successful connections.
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Connector for ScriptedConnector {
    type Connection = ScriptedConnection;

    fn connect(&self, _endpoint: &CoordinatorEndpoint) -> io::Result<ScriptedConnection> {
        {
            let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
            *attempts = attempts.saturating_add(1);
        }
        let script = self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(Script::Refuse);
        match script {
            Script::Refuse => Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "scripted refusal",
            )),
            Script::Reply(reply) => Ok(ScriptedConnection {
                reply: Some(reply),
                sent: Arc::clone(&self.sent),
            }),
            Script::Fail => Ok(ScriptedConnection {
                reply: None,
                sent: Arc::clone(&self.sent),
            }),
        }
    }
}

/// Connection produced by [`ScriptedConnector`].
#[derive(Debug)]
pub struct ScriptedConnection {
    reply: Option<String>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl Connection for ScriptedConnection {
    fn send_request(&mut self, request: &[u8]) -> io::Result<()> {
        if self.reply.is_none() {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "scripted reset",
            ));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(String::from_utf8_lossy(request).into_owned());
        Ok(())
    }

    fn read_response(&mut self, blocksize: usize) -> io::Result<Vec<u8>> {
        let mut bytes = self.reply.take().unwrap_or_default().into_bytes();
        bytes.truncate(blocksize);
        Ok(bytes)
    }
}

/// Sleeper that records requested delays instead of sleeping.
///
/// It can also cancel the token after a number of sleeps to simulate a
/// shutdown signal arriving during back-off.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
    cancel_after: Option<usize>,
}

impl RecordingSleeper {
    /// A sleeper that only records.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sleeper that cancels the token on its `sleeps`-th call.
    #[must_use]
    pub fn cancelling_after(sleeps: usize) -> Self {
        Self {
            cancel_after: Some(sleeps),
            ..Self::default()
        }
    }

    /// Delays requested so far.
    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration, cancel: &CancellationToken) {
        let mut delays = self.delays.lock().unwrap_or_else(PoisonError::into_inner);
        delays.push(duration);
        if self.cancel_after == Some(delays.len()) {
            cancel.cancel();
        }
    }
}

/// Transport that records requests and answers from a queue.
///
/// Once the queue is empty every poll is acknowledged.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    replies: Mutex<VecDeque<Result<PollReply, PollError>>>,
    requests: Mutex<Vec<Value>>,
}

impl RecordingTransport {
    /// Builds a transport answering with `replies` in order.
    #[must_use]
    pub fn new(replies: impl IntoIterator<Item = Result<PollReply, PollError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests polled so far, decoded. Requests that were not JSON are
    /// recorded as strings.
    #[must_use]
    pub fn requests(&self) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Transport for RecordingTransport {
    fn poll(&self, request: &str, _cancel: &CancellationToken) -> Result<PollReply, PollError> {
        let decoded = serde_json::from_str(request)
            .unwrap_or_else(|_| Value::String(request.to_owned()));
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(decoded);
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Ok(PollReply::Terminal(json!({ "response": "ack" }))))
    }
}
