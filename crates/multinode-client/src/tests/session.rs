//! Session envelopes, lifecycle and error mapping.

use rstest::rstest;
use serde_json::{Map, Value, json};

use super::{LOCAL_HOSTNAME, descriptor, expected_envelope};
use crate::test_support::{FakeCoordinator, RecordingTransport};
use crate::{GroupSession, PollError, PollReply, Poller, SessionError, SessionState};

fn session(transport: RecordingTransport) -> GroupSession<RecordingTransport> {
    GroupSession::with_hostname(descriptor(json!({})), transport, LOCAL_HOSTNAME)
}

fn group_data_reply() -> Result<PollReply, PollError> {
    Ok(PollReply::Terminal(json!({
        "response": "group_data",
        "roles": {"node-a": "server", "node-b": "client"},
    })))
}

#[test]
fn descriptor_populates_the_base_envelope() {
    let session = session(RecordingTransport::default());

    assert_eq!(session.descriptor().target(), "node-a");
    assert_eq!(session.envelope().group_name(), "g1");
    assert_eq!(session.envelope().port(), 4000);
    assert_eq!(session.envelope().hostname(), LOCAL_HOSTNAME);
    assert_eq!(session.state(), SessionState::Init);
}

#[test]
fn run_registers_and_returns_roles() {
    let session = session(RecordingTransport::new([group_data_reply()]));

    let data = session.run().expect("registration succeeds");

    assert_eq!(data.role_of("node-b"), Some("client"));
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(
        session.transport().requests(),
        vec![expected_envelope(
            None,
            json!({"request": "group_data", "group_size": 2})
        )]
    );
}

#[test]
fn refused_registration_is_an_error() {
    let session = session(RecordingTransport::new([Ok(PollReply::Terminal(
        json!({"response": "nack"}),
    ))]));

    let error = session.run().expect_err("nack is fatal");

    assert!(matches!(error, SessionError::Rejected { request: "group_data" }));
    assert_eq!(session.state(), SessionState::Init);
}

#[test]
fn undecodable_registration_reply_is_an_error() {
    let session = session(RecordingTransport::new([Ok(PollReply::Undecodable(
        String::from("garbage"),
    ))]));

    let error = session.run().expect_err("undecodable reply");

    assert!(matches!(error, SessionError::UndecodableReply { raw, .. } if raw == "garbage"));
}

#[rstest]
#[case::sync("sync", json!({"request": "lava_sync", "messageID": "barrier-1"}))]
#[case::wait("wait", json!({"request": "lava_wait", "messageID": "barrier-1", "nodeID": "node-a"}))]
#[case::wait_all("wait_all", json!({"request": "lava_wait_all"}))]
#[case::send(
    "send",
    json!({"request": "lava_send", "messageID": "barrier-1", "message": {"ip": "10.0.0.2"}})
)]
fn primitives_carry_base_and_own_fields(#[case] primitive: &str, #[case] own: Value) {
    let session = session(RecordingTransport::new([group_data_reply()]));
    session.run().expect("registration succeeds");

    let reply = match primitive {
        "sync" => session.request_sync("barrier-1"),
        "wait" => session.request_wait("barrier-1"),
        "wait_all" => session.request_wait_all("barrier-1", None),
        "send" => session.request_send("barrier-1", json!({"ip": "10.0.0.2"})),
        other => panic!("unknown primitive {other}"),
    }
    .expect("primitive succeeds");

    assert_eq!(reply.status(), Some("ack"));
    let requests = session.transport().requests();
    assert_eq!(requests.last(), Some(&expected_envelope(None, own)));
}

#[test]
fn wait_all_with_role_omits_message_id() {
    let session = session(RecordingTransport::default());

    session
        .request_wait_all("msg-1", Some("client"))
        .expect("wait all succeeds");

    let requests = session.transport().requests();
    let sent = requests.first().expect("one request");
    assert_eq!(
        sent,
        &expected_envelope(None, json!({"request": "lava_wait", "role": "client"}))
    );
    assert!(sent.get("messageID").is_none());
}

#[test]
fn sequential_sends_do_not_leak_fields() {
    let session = session(RecordingTransport::default());
    let mut first = Map::new();
    first.insert(String::from("request"), json!("lava_send"));
    first.insert(String::from("messageID"), json!("m1"));
    first.insert(String::from("message"), json!({"k": "v"}));
    let mut second = Map::new();
    second.insert(String::from("request"), json!("lava_sync"));

    session.send(first).expect("first send");
    session.send(second).expect("second send");

    let requests = session.transport().requests();
    let last = requests.last().expect("two requests");
    assert_eq!(last, &expected_envelope(None, json!({"request": "lava_sync"})));
    assert!(last.get("messageID").is_none());
    assert!(last.get("message").is_none());
}

#[test]
fn role_from_descriptor_is_sent_on_every_request() {
    let transport = RecordingTransport::default();
    let session = GroupSession::with_hostname(
        descriptor(json!({"role": "server"})),
        transport,
        LOCAL_HOSTNAME,
    );

    session.request_sync("b1").expect("sync succeeds");

    assert_eq!(
        session.transport().requests(),
        vec![expected_envelope(
            Some("server"),
            json!({"request": "lava_sync", "messageID": "b1"})
        )]
    );
}

#[test]
fn transport_failures_propagate() {
    let session = session(RecordingTransport::new([Err(PollError::Cancelled)]));

    let error = session.request_sync("b1").expect_err("cancelled");

    assert!(matches!(error, SessionError::Poll(PollError::Cancelled)));
}

#[test]
fn finalise_clears_the_group_and_ends_the_session() {
    let session = session(RecordingTransport::new([group_data_reply()]));
    session.run().expect("registration succeeds");

    session.finalise().expect("clear group");

    assert_eq!(session.state(), SessionState::Done);
    assert_eq!(
        session.transport().requests().last(),
        Some(&expected_envelope(
            None,
            json!({"request": "clear_group", "group_size": 2})
        ))
    );
}

#[test]
fn close_ends_the_session_without_a_request() {
    let session = session(RecordingTransport::default());
    session.close();
    assert_eq!(session.state(), SessionState::Done);
    assert!(session.transport().requests().is_empty());
}

#[test]
fn barrier_waits_through_coordinator_wait_replies() {
    let mut coordinator = FakeCoordinator::spawn([
        json!({"response": "wait"}).to_string(),
        json!({"response": "wait"}).to_string(),
        json!({"response": "ack"}).to_string(),
    ])
    .expect("spawn coordinator");
    let session = GroupSession::with_hostname(
        descriptor(json!({"port": coordinator.port(), "hostname": "127.0.0.1"})),
        Poller::new(coordinator.poller_config()),
        LOCAL_HOSTNAME,
    );

    let reply = session.request_sync("barrier-1").expect("sync succeeds");

    assert_eq!(reply.status(), Some("ack"));
    let requests = coordinator.take_requests().expect("requests");
    assert_eq!(requests.len(), 3);
    for request in &requests {
        assert_eq!(request["request"], "lava_sync");
        assert_eq!(request["messageID"], "barrier-1");
        assert_eq!(request["client_name"], "node-a");
    }
}
