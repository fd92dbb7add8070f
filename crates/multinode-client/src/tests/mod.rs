//! Behavioural tests spanning the transport, session and router.

mod session;

use serde_json::{Value, json};

use crate::GroupDescriptor;

pub(crate) const LOCAL_HOSTNAME: &str = "dispatcher-01";

pub(crate) fn descriptor(overrides: Value) -> GroupDescriptor {
    let mut base = json!({
        "target_group": "g1",
        "group_size": 2,
        "target": "node-a",
        "port": 4000,
    });
    if let (Some(fields), Value::Object(extra)) = (base.as_object_mut(), overrides) {
        fields.extend(extra);
    }
    GroupDescriptor::parse(&base).expect("parse descriptor")
}

pub(crate) fn base_fields(role: Option<&str>) -> Value {
    json!({
        "port": 4000,
        "host": "localhost",
        "client_name": "node-a",
        "group_name": "g1",
        "hostname": LOCAL_HOSTNAME,
        "role": role,
    })
}

/// Merges `extra` over the expected base fields.
pub(crate) fn expected_envelope(role: Option<&str>, extra: Value) -> Value {
    let mut expected = base_fields(role);
    if let (Some(fields), Value::Object(overrides)) = (expected.as_object_mut(), extra) {
        fields.extend(overrides);
    }
    expected
}
