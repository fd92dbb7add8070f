//! The base envelope carried by every coordinator request.

use serde_json::{Map, Value};
use tracing::warn;

use crate::descriptor::GroupDescriptor;

const ENVELOPE_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::envelope");

/// Fields identifying the node on every request.
///
/// Built once per session and never mutated; each request is composed into
/// a fresh map so consecutive requests cannot observe each other's fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseEnvelope {
    port: u16,
    host: String,
    client_name: String,
    group_name: String,
    hostname: String,
    role: Option<String>,
}

impl BaseEnvelope {
    /// Builds the envelope for `descriptor` running on the machine `hostname`.
    #[must_use]
    pub fn new(descriptor: &GroupDescriptor, hostname: impl Into<String>) -> Self {
        Self {
            port: descriptor.port(),
            host: descriptor.host().to_owned(),
            client_name: descriptor.target().to_owned(),
            group_name: descriptor.group_name().to_owned(),
            hostname: hostname.into(),
            role: descriptor.role().map(str::to_owned),
        }
    }

    /// Coordinator port named in the envelope.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Coordinator host named in the envelope.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// This node's client name.
    #[must_use]
    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// Group the node belongs to.
    #[must_use]
    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    /// Name of the machine running the node.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Role of the node, if any.
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    /// Base fields as a JSON map. An absent role is sent as `null`.
    #[must_use]
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(String::from("port"), Value::from(self.port));
        fields.insert(String::from("host"), Value::String(self.host.clone()));
        fields.insert(
            String::from("client_name"),
            Value::String(self.client_name.clone()),
        );
        fields.insert(
            String::from("group_name"),
            Value::String(self.group_name.clone()),
        );
        fields.insert(
            String::from("hostname"),
            Value::String(self.hostname.clone()),
        );
        fields.insert(
            String::from("role"),
            self.role.clone().map_or(Value::Null, Value::String),
        );
        fields
    }

    /// Copies the base fields and merges `extra` over them.
    ///
    /// Keys in `extra` replace base keys of the same name.
    #[must_use]
    pub fn compose(&self, extra: Map<String, Value>) -> Map<String, Value> {
        let mut fields = self.to_fields();
        fields.extend(extra);
        fields
    }
}

/// Name of the local machine as reported by the operating system.
///
/// Falls back to `localhost` when the name cannot be read.
#[must_use]
pub fn local_hostname() -> String {
    #[cfg(unix)]
    {
        match nix::unistd::gethostname() {
            Ok(name) => name.to_string_lossy().into_owned(),
            Err(error) => {
                warn!(
                    target: ENVELOPE_TARGET,
                    error = %error,
                    "could not read local hostname; using localhost"
                );
                String::from("localhost")
            }
        }
    }

    #[cfg(not(unix))]
    {
        std::env::var("COMPUTERNAME").unwrap_or_else(|_| {
            warn!(
                target: ENVELOPE_TARGET,
                "COMPUTERNAME is not set; using localhost"
            );
            String::from("localhost")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(role: Option<&str>) -> GroupDescriptor {
        let mut value = json!({
            "target_group": "g1",
            "group_size": 2,
            "target": "node-a",
            "port": 4000,
        });
        if let (Some(name), Some(map)) = (role, value.as_object_mut()) {
            map.insert(String::from("role"), Value::from(name));
        }
        GroupDescriptor::parse(&value).expect("parse descriptor")
    }

    #[test]
    fn base_fields_reflect_descriptor() {
        let envelope = BaseEnvelope::new(&descriptor(Some("server")), "dispatcher-01");
        assert_eq!(
            Value::Object(envelope.to_fields()),
            json!({
                "port": 4000,
                "host": "localhost",
                "client_name": "node-a",
                "group_name": "g1",
                "hostname": "dispatcher-01",
                "role": "server",
            })
        );
    }

    #[test]
    fn missing_role_is_null() {
        let envelope = BaseEnvelope::new(&descriptor(None), "dispatcher-01");
        assert_eq!(envelope.to_fields().get("role"), Some(&Value::Null));
    }

    #[test]
    fn extra_fields_win_on_clash() {
        let envelope = BaseEnvelope::new(&descriptor(Some("server")), "dispatcher-01");
        let mut extra = Map::new();
        extra.insert(String::from("role"), Value::from("client"));
        let composed = envelope.compose(extra);
        assert_eq!(composed.get("role"), Some(&Value::from("client")));
        assert_eq!(envelope.role(), Some("server"));
    }

    #[test]
    fn local_hostname_is_not_empty() {
        assert!(!local_hostname().is_empty());
    }
}
