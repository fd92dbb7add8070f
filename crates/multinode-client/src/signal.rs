//! Routing of raw signal strings from the test framework.
//!
//! Test shells announce synchronisation points by emitting a JSON object such
//! as `{"request": "lava_sync", "messageID": "barrier-1"}`. The router decodes
//! it and calls the matching [`GroupSession`] primitive. Anything it cannot
//! make sense of is logged and dropped so that a stray line never aborts the
//! job.

use std::fmt;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::reply::PollReply;
use crate::session::{GroupSession, SessionError};
use crate::transport::Transport;

const SIGNAL_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::signal");

/// Key stripped from `lava_send` payloads; it carries test-definition
/// bookkeeping, not data for other nodes.
const YAML_LINE_KEY: &str = "yaml_line";

/// Primitive a signal maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// `lava_sync`.
    Sync,
    /// `lava_wait`.
    Wait,
    /// `lava_wait_all`.
    WaitAll,
    /// `lava_send`.
    Send,
}

impl SignalKind {
    /// Looks up a request name after normalising `-` to `_`.
    #[must_use]
    pub fn from_request(name: &str) -> Option<Self> {
        match name.replace('-', "_").as_str() {
            "lava_sync" => Some(Self::Sync),
            "lava_wait" => Some(Self::Wait),
            "lava_wait_all" => Some(Self::WaitAll),
            "lava_send" => Some(Self::Send),
            _ => None,
        }
    }

    /// Canonical request name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "lava_sync",
            Self::Wait => "lava_wait",
            Self::WaitAll => "lava_wait_all",
            Self::Send => "lava_send",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Result of a routed signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalReply {
    kind: SignalKind,
    message_id: String,
    reply: PollReply,
}

impl SignalReply {
    /// Primitive that was invoked.
    #[must_use]
    pub const fn kind(&self) -> SignalKind {
        self.kind
    }

    /// Message identifier named by the signal.
    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// The coordinator's reply.
    #[must_use]
    pub const fn reply(&self) -> &PollReply {
        &self.reply
    }

    /// Whether the coordinator refused the request.
    #[must_use]
    pub fn is_nack(&self) -> bool {
        self.reply.is_nack()
    }

    /// The part of the reply the test framework consumes: the attached
    /// `message` when there is one, otherwise the `response` status.
    ///
    /// Undecodable replies yield their raw text.
    #[must_use]
    pub fn value(&self) -> Value {
        match &self.reply {
            PollReply::Terminal(reply) => reply
                .get("message")
                .or_else(|| reply.get("response"))
                .cloned()
                .unwrap_or(Value::Null),
            PollReply::Undecodable(raw) => Value::String(raw.clone()),
        }
    }

    /// Line written back to the test shell to release it.
    ///
    /// Waits list the received data as `node:key=value` pairs. A refused
    /// request appends ` nack`. Sends do not release the shell and yield
    /// `None`.
    #[must_use]
    pub fn completion_line(&self) -> Option<String> {
        let tag = match self.kind {
            SignalKind::Sync => "LAVA_SYNC_COMPLETE",
            SignalKind::Wait => "LAVA_WAIT_COMPLETE",
            SignalKind::WaitAll => "LAVA_WAIT_ALL_COMPLETE",
            SignalKind::Send => return None,
        };
        let detail = if self.is_nack() {
            String::from(" nack")
        } else if self.kind == SignalKind::Sync {
            String::new()
        } else {
            render_pairs(&self.value())
        };
        Some(format!("<{tag}{detail}>"))
    }
}

fn render_pairs(value: &Value) -> String {
    let Some(nodes) = value.as_object() else {
        return String::new();
    };
    let mut rendered = String::new();
    for (node, messages) in nodes {
        let Some(entries) = messages.as_object() else {
            continue;
        };
        for (key, entry) in entries {
            let text = entry
                .as_str()
                .map_or_else(|| entry.to_string(), str::to_owned);
            rendered.push_str(&format!(" {node}:{key}={text}"));
        }
    }
    rendered
}

/// Dispatches decoded signals to a session.
#[derive(Debug)]
pub struct SignalRouter<'a, T> {
    session: &'a GroupSession<T>,
}

impl<'a, T: Transport> SignalRouter<'a, T> {
    /// Routes signals to `session`.
    #[must_use]
    pub const fn new(session: &'a GroupSession<T>) -> Self {
        Self { session }
    }

    /// Decodes `raw` and invokes the matching primitive.
    ///
    /// Returns `Ok(None)` without contacting the coordinator when the signal
    /// is empty, not a JSON object, lacks `request` or `messageID`, or names
    /// an unknown request.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the poll fails. Refusals are part of the
    /// returned reply.
    pub fn route(&self, raw: &str) -> Result<Option<SignalReply>, SessionError> {
        let Some(signal) = decode(raw) else {
            return Ok(None);
        };
        let Some(name) = signal.get("request").and_then(Value::as_str) else {
            warn!(target: SIGNAL_TARGET, signal = raw, "signal has no request; ignoring");
            return Ok(None);
        };
        let Some(kind) = SignalKind::from_request(name) else {
            warn!(target: SIGNAL_TARGET, request = name, "unknown signal request; ignoring");
            return Ok(None);
        };
        let Some(message_id) = signal.get("messageID").and_then(message_id_text) else {
            warn!(
                target: SIGNAL_TARGET,
                request = kind.as_str(),
                "signal has no messageID; ignoring"
            );
            return Ok(None);
        };
        debug!(
            target: SIGNAL_TARGET,
            request = kind.as_str(),
            message_id = message_id.as_str(),
            "routing signal"
        );

        let reply = match kind {
            SignalKind::Sync => self.session.request_sync(&message_id)?,
            SignalKind::Wait => self.session.request_wait(&message_id)?,
            SignalKind::WaitAll => {
                let role = signal.get("role").and_then(Value::as_str);
                self.session.request_wait_all(&message_id, role)?
            }
            SignalKind::Send => {
                let payload = coerce_payload(signal.get("message").cloned());
                let reply = self.session.request_send(&message_id, payload)?;
                if reply.is_nack() {
                    warn!(
                        target: SIGNAL_TARGET,
                        message_id = message_id.as_str(),
                        "coordinator refused lava_send; continuing"
                    );
                }
                reply
            }
        };
        Ok(Some(SignalReply {
            kind,
            message_id,
            reply,
        }))
    }
}

fn decode(raw: &str) -> Option<Map<String, Value>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        debug!(target: SIGNAL_TARGET, "empty signal; ignoring");
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(signal)) => Some(signal),
        Ok(Value::Null) => {
            debug!(target: SIGNAL_TARGET, "null signal; ignoring");
            None
        }
        Ok(_) => {
            warn!(target: SIGNAL_TARGET, signal = trimmed, "signal is not an object; ignoring");
            None
        }
        Err(error) => {
            warn!(
                target: SIGNAL_TARGET,
                signal = trimmed,
                error = %error,
                "signal is not valid JSON; ignoring"
            );
            None
        }
    }
}

fn message_id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Normalises a `lava_send` payload to an object.
///
/// Missing or null payloads become `{}`. Scalars become a key with a null
/// value, which is how key-only sends are represented.
fn coerce_payload(message: Option<Value>) -> Value {
    match message {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(Value::Object(mut entries)) => {
            entries.remove(YAML_LINE_KEY);
            Value::Object(entries)
        }
        Some(Value::String(key)) => {
            let mut entries = Map::new();
            entries.insert(key, Value::Null);
            Value::Object(entries)
        }
        Some(other) => {
            let mut entries = Map::new();
            entries.insert(other.to_string(), Value::Null);
            Value::Object(entries)
        }
    }
}
