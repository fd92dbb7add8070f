//! Replies returned by the coordinator.

use std::collections::BTreeMap;

use serde_json::Value;

/// Outcome of a completed poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollReply {
    /// A decoded reply whose `response` was anything other than `wait`.
    Terminal(Value),
    /// The coordinator answered with bytes that are not JSON.
    Undecodable(String),
}

impl PollReply {
    /// The `response` status string, when the reply carries one.
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        match self {
            Self::Terminal(value) => value.get("response").and_then(Value::as_str),
            Self::Undecodable(_) => None,
        }
    }

    /// The `message` object attached to the reply, if any.
    #[must_use]
    pub fn message(&self) -> Option<&Value> {
        match self {
            Self::Terminal(value) => value.get("message"),
            Self::Undecodable(_) => None,
        }
    }

    /// Whether the coordinator refused the request.
    #[must_use]
    pub fn is_nack(&self) -> bool {
        self.status() == Some("nack")
    }

    /// The decoded reply, or `None` when it could not be decoded.
    #[must_use]
    pub const fn value(&self) -> Option<&Value> {
        match self {
            Self::Terminal(value) => Some(value),
            Self::Undecodable(_) => None,
        }
    }

    /// Converts the reply into a JSON value. Undecodable text becomes a
    /// JSON string.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Terminal(value) => value,
            Self::Undecodable(raw) => Value::String(raw),
        }
    }
}

/// Registration result handed to the test framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupData {
    roles: BTreeMap<String, String>,
    reply: Value,
}

impl GroupData {
    /// Extracts the client to role map from a `group_data` reply.
    ///
    /// Entries whose role is not a string are skipped.
    #[must_use]
    pub fn from_reply(reply: Value) -> Self {
        let roles = reply
            .get("roles")
            .and_then(Value::as_object)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|(client, role)| {
                        role.as_str().map(|name| (client.clone(), name.to_owned()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self { roles, reply }
    }

    /// Role of every node, keyed by client name.
    #[must_use]
    pub const fn roles(&self) -> &BTreeMap<String, String> {
        &self.roles
    }

    /// Role assigned to `client`.
    #[must_use]
    pub fn role_of(&self, client: &str) -> Option<&str> {
        self.roles.get(client).map(String::as_str)
    }

    /// The raw coordinator reply.
    #[must_use]
    pub const fn reply(&self) -> &Value {
        &self.reply
    }

    /// Consumes the group data, returning the raw reply.
    #[must_use]
    pub fn into_reply(self) -> Value {
        self.reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_and_message_come_from_terminal_replies() {
        let reply = PollReply::Terminal(json!({"response": "ack", "message": {"k": "v"}}));
        assert_eq!(reply.status(), Some("ack"));
        assert_eq!(reply.message(), Some(&json!({"k": "v"})));
        assert!(!reply.is_nack());
    }

    #[test]
    fn undecodable_replies_have_no_status() {
        let reply = PollReply::Undecodable(String::from("<html>"));
        assert_eq!(reply.status(), None);
        assert_eq!(reply.into_value(), json!("<html>"));
    }

    #[test]
    fn group_data_collects_roles() {
        let data = GroupData::from_reply(json!({
            "response": "group_data",
            "roles": {"node-a": "server", "node-b": "client", "node-c": 3},
        }));
        assert_eq!(data.role_of("node-a"), Some("server"));
        assert_eq!(data.role_of("node-b"), Some("client"));
        assert_eq!(data.role_of("node-c"), None);
        assert_eq!(data.roles().len(), 2);
    }
}
