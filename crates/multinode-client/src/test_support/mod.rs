//! Doubles for exercising sessions without a real coordinator.
//!
//! [`FakeCoordinator`] is a loopback TCP server that answers each connection
//! with the next scripted reply. The scripted connector, sleeper and
//! transport replace the corresponding seams in-process so tests can count
//! attempts and observe back-off delays without sleeping.

mod fake_coordinator;
mod scripted;

pub use self::fake_coordinator::FakeCoordinator;
pub use self::scripted::{
    RecordingSleeper, RecordingTransport, Script, ScriptedConnection, ScriptedConnector,
};
