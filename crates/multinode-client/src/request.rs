//! Operations a node can ask of the coordinator.

use serde_json::{Map, Value};

/// One coordinator request, before it is merged into the base envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Registration: announces the node and asks for the group's roles.
    GroupData {
        /// Number of nodes the group expects.
        group_size: u32,
    },
    /// Barrier across every node of the group.
    Sync {
        /// Barrier name.
        message_id: String,
    },
    /// Waits for one node to send `message_id`.
    Wait {
        /// Message to wait for.
        message_id: String,
        /// Client name of the node expected to send it.
        node_id: String,
    },
    /// Waits for every node, or every node with `role`, to send.
    ///
    /// The message identifier is carried for logging but never put on the
    /// wire.
    WaitAll {
        /// Message the caller is waiting for.
        message_id: String,
        /// Restricts the wait to nodes with this role.
        role: Option<String>,
    },
    /// Publishes a message under `message_id`.
    Send {
        /// Identifier other nodes wait on.
        message_id: String,
        /// Payload object.
        message: Value,
    },
    /// Tells the coordinator the group is finished with.
    ClearGroup {
        /// Number of nodes in the group.
        group_size: u32,
    },
}

impl Request {
    /// Wire name of the request.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GroupData { .. } => "group_data",
            Self::Sync { .. } => "lava_sync",
            Self::Wait { .. } | Self::WaitAll { role: Some(_), .. } => "lava_wait",
            Self::WaitAll { role: None, .. } => "lava_wait_all",
            Self::Send { .. } => "lava_send",
            Self::ClearGroup { .. } => "clear_group",
        }
    }

    /// Message identifier the request refers to, if any.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        match self {
            Self::Sync { message_id }
            | Self::Wait { message_id, .. }
            | Self::WaitAll { message_id, .. }
            | Self::Send { message_id, .. } => Some(message_id),
            Self::GroupData { .. } | Self::ClearGroup { .. } => None,
        }
    }

    /// Fields this request layers on top of the base envelope.
    #[must_use]
    pub fn into_fields(self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(String::from("request"), Value::from(self.name()));
        match self {
            Self::GroupData { group_size } | Self::ClearGroup { group_size } => {
                fields.insert(String::from("group_size"), Value::from(group_size));
            }
            Self::Sync { message_id } => {
                fields.insert(String::from("messageID"), Value::String(message_id));
            }
            Self::Wait {
                message_id,
                node_id,
            } => {
                fields.insert(String::from("messageID"), Value::String(message_id));
                fields.insert(String::from("nodeID"), Value::String(node_id));
            }
            Self::WaitAll { role, .. } => {
                if let Some(name) = role {
                    fields.insert(String::from("role"), Value::String(name));
                }
            }
            Self::Send {
                message_id,
                message,
            } => {
                fields.insert(String::from("messageID"), Value::String(message_id));
                fields.insert(String::from("message"), message);
            }
        }
        fields
    }
}
