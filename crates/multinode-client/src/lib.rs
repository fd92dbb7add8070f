//! Group synchronisation client for MultiNode test jobs.
//!
//! A MultiNode job runs one node process per device. The nodes rendezvous
//! through an external coordinator using four primitives: a barrier
//! (`lava_sync`), a wait for one node's message (`lava_wait`), a wait for
//! every node or every node of a role (`lava_wait_all`), and a publish
//! (`lava_send`). Every exchange is a JSON object sent over a fresh TCP
//! connection and answered with a single JSON object.
//!
//! The crate is layered leaves first:
//!
//! - [`Poller`] owns the socket, retry and back-off logic behind the
//!   [`Transport`] trait.
//! - [`GroupSession`] holds the group identity parsed from the job
//!   ([`GroupDescriptor`]) and exposes the primitives on top of a transport.
//! - [`SignalRouter`] turns raw signal strings emitted by the test framework
//!   into session calls.
//!
//! All I/O is blocking. A [`CancellationToken`] may be cancelled from another
//! thread to abort a poll that is sleeping between attempts.

mod descriptor;
mod envelope;
mod reply;
mod request;
mod session;
mod signal;
mod transport;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use descriptor::{DescriptorError, GroupDescriptor};
pub use envelope::{BaseEnvelope, local_hostname};
pub use reply::{GroupData, PollReply};
pub use request::Request;
pub use session::{GroupSession, SessionError, SessionState};
pub use signal::{SignalKind, SignalReply, SignalRouter};
pub use transport::{
    CancellationToken, Connection, Connector, PollError, Poller, RetryPolicy, Sleeper,
    TcpConnector, ThreadSleeper, Transport,
};

#[cfg(test)]
mod tests;
