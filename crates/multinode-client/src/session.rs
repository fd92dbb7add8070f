//! Long-lived per-node session with the coordinator.

use std::cell::Cell;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::descriptor::GroupDescriptor;
use crate::envelope::{BaseEnvelope, local_hostname};
use crate::reply::{GroupData, PollReply};
use crate::request::Request;
use crate::transport::{CancellationToken, PollError, Transport};

pub(crate) const SESSION_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::session");

/// Lifecycle of a [`GroupSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Built but not yet registered.
    Init,
    /// Registration is in flight.
    Registering,
    /// Registered; primitives may be used.
    Active,
    /// The job is over.
    Done,
}

/// One node's view of its group.
///
/// The session owns the base envelope and a transport. Every primitive
/// composes a fresh request from the envelope and blocks until the
/// coordinator gives a terminal reply.
#[derive(Debug)]
pub struct GroupSession<T> {
    descriptor: GroupDescriptor,
    envelope: BaseEnvelope,
    transport: T,
    cancel: CancellationToken,
    state: Cell<SessionState>,
}

impl<T: Transport> GroupSession<T> {
    /// Builds a session for `descriptor` on this machine.
    #[must_use]
    pub fn new(descriptor: GroupDescriptor, transport: T) -> Self {
        Self::with_hostname(descriptor, transport, local_hostname())
    }

    /// Builds a session reporting `hostname` as the local machine name.
    #[must_use]
    pub fn with_hostname(
        descriptor: GroupDescriptor,
        transport: T,
        hostname: impl Into<String>,
    ) -> Self {
        let envelope = BaseEnvelope::new(&descriptor, hostname);
        Self {
            descriptor,
            envelope,
            transport,
            cancel: CancellationToken::new(),
            state: Cell::new(SessionState::Init),
        }
    }

    /// Uses `cancel` to abort polls, typically a token shared with a
    /// signal handler.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Group identity.
    #[must_use]
    pub const fn descriptor(&self) -> &GroupDescriptor {
        &self.descriptor
    }

    /// Fields sent on every request.
    #[must_use]
    pub const fn envelope(&self) -> &BaseEnvelope {
        &self.envelope
    }

    /// Underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Token that aborts polls made by this session.
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Registers with the coordinator and returns the group's roles.
    ///
    /// Blocks until every node in the group has registered.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if polling fails, the reply cannot be decoded
    /// or the coordinator refuses the registration. The session returns to
    /// [`SessionState::Init`] in that case.
    pub fn run(&self) -> Result<GroupData, SessionError> {
        self.state.set(SessionState::Registering);
        info!(
            target: SESSION_TARGET,
            group = self.envelope.group_name(),
            client = self.envelope.client_name(),
            group_size = self.descriptor.group_size(),
            "registering with coordinator"
        );
        let request = Request::GroupData {
            group_size: self.descriptor.group_size(),
        };
        let outcome = self.dispatch(request).and_then(Self::accept_group_data);
        match &outcome {
            Ok(data) => {
                self.state.set(SessionState::Active);
                info!(
                    target: SESSION_TARGET,
                    group = self.envelope.group_name(),
                    nodes = data.roles().len(),
                    "group registration complete"
                );
            }
            Err(_) => self.state.set(SessionState::Init),
        }
        outcome
    }

    fn accept_group_data(reply: PollReply) -> Result<GroupData, SessionError> {
        if reply.is_nack() {
            return Err(SessionError::Rejected {
                request: "group_data",
            });
        }
        match reply {
            PollReply::Undecodable(raw) => Err(SessionError::UndecodableReply {
                request: "group_data",
                raw,
            }),
            PollReply::Terminal(value) => Ok(GroupData::from_reply(value)),
        }
    }

    /// Sends the base envelope merged with `extra` and waits for the reply.
    ///
    /// This is the single path to the transport: the envelope is copied for
    /// each call so that fields from one request never appear in the next.
    /// Keys in `extra` replace base keys.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Poll`] when the poll is cancelled or runs out
    /// of retries.
    pub fn send(&self, extra: Map<String, Value>) -> Result<PollReply, SessionError> {
        let fields = self.envelope.compose(extra);
        let request = serde_json::to_string(&fields)
            .map_err(|source| SessionError::Serialise { source })?;
        let name = fields
            .get("request")
            .and_then(Value::as_str)
            .unwrap_or_default();
        debug!(target: SESSION_TARGET, request = name, "sending request");
        Ok(self.transport.poll(&request, &self.cancel)?)
    }

    /// Sends a typed request.
    ///
    /// # Errors
    ///
    /// See [`GroupSession::send`].
    pub fn dispatch(&self, request: Request) -> Result<PollReply, SessionError> {
        let state = self.state.get();
        if !matches!(request, Request::GroupData { .. }) && state != SessionState::Active {
            warn!(
                target: SESSION_TARGET,
                request = request.name(),
                state = ?state,
                "request sent outside an active session"
            );
        }
        self.send(request.into_fields())
    }

    /// Blocks until every node in the group reaches the barrier `message_id`.
    ///
    /// # Errors
    ///
    /// See [`GroupSession::send`].
    pub fn request_sync(&self, message_id: &str) -> Result<PollReply, SessionError> {
        info!(target: SESSION_TARGET, message_id, "synchronising with group");
        self.dispatch(Request::Sync {
            message_id: message_id.to_owned(),
        })
    }

    /// Blocks until another node has sent `message_id`. The request names
    /// this node as the waiter.
    ///
    /// # Errors
    ///
    /// See [`GroupSession::send`].
    pub fn request_wait(&self, message_id: &str) -> Result<PollReply, SessionError> {
        info!(target: SESSION_TARGET, message_id, "waiting for message");
        self.dispatch(Request::Wait {
            message_id: message_id.to_owned(),
            node_id: self.descriptor.target().to_owned(),
        })
    }

    /// Blocks until every node, or every node with `role`, has sent.
    ///
    /// `message_id` is logged but not put on the wire.
    ///
    /// # Errors
    ///
    /// See [`GroupSession::send`].
    pub fn request_wait_all(
        &self,
        message_id: &str,
        role: Option<&str>,
    ) -> Result<PollReply, SessionError> {
        info!(
            target: SESSION_TARGET,
            message_id,
            role = role.unwrap_or_default(),
            "waiting for group"
        );
        self.dispatch(Request::WaitAll {
            message_id: message_id.to_owned(),
            role: role.map(str::to_owned),
        })
    }

    /// Publishes `message` to the group under `message_id`.
    ///
    /// # Errors
    ///
    /// See [`GroupSession::send`].
    pub fn request_send(&self, message_id: &str, message: Value) -> Result<PollReply, SessionError> {
        info!(target: SESSION_TARGET, message_id, "sending message to group");
        self.dispatch(Request::Send {
            message_id: message_id.to_owned(),
            message,
        })
    }

    /// Asks the coordinator to drop the group and ends the session.
    ///
    /// # Errors
    ///
    /// See [`GroupSession::send`].
    pub fn finalise(&self) -> Result<PollReply, SessionError> {
        info!(
            target: SESSION_TARGET,
            group = self.envelope.group_name(),
            "clearing group"
        );
        let reply = self.dispatch(Request::ClearGroup {
            group_size: self.descriptor.group_size(),
        });
        self.state.set(SessionState::Done);
        reply
    }

    /// Ends the session without telling the coordinator.
    pub fn close(&self) {
        self.state.set(SessionState::Done);
        debug!(target: SESSION_TARGET, "session closed");
    }
}

/// Errors surfaced by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport gave up.
    #[error(transparent)]
    Poll(#[from] PollError),
    /// The request could not be encoded.
    #[error("failed to encode coordinator request: {source}")]
    Serialise {
        /// Encoder error.
        #[source]
        source: serde_json::Error,
    },
    /// The coordinator answered with something other than JSON.
    #[error("coordinator sent an undecodable reply to '{request}': {raw}")]
    UndecodableReply {
        /// Request that was answered.
        request: &'static str,
        /// Raw reply text.
        raw: String,
    },
    /// The coordinator refused the request.
    #[error("coordinator rejected '{request}'")]
    Rejected {
        /// Request that was refused.
        request: &'static str,
    },
}
