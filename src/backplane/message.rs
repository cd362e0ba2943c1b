//! Message envelope and topics for the knowledge backplane.

use chrono::Utc;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a message is addressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topic {
    /// Every subscriber except the sender.
    Broadcast,
    /// Exactly one agent's private stream.
    Private(String),
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topic::Broadcast => write!(f, "broadcast"),
            Topic::Private(agent_id) => write!(f, "private:{agent_id}"),
        }
    }
}

/// One piece of knowledge in flight between agents.
///
/// Immutable once published. The serialized shape is the transport-agnostic
/// envelope: `sender`, `sender_type`, `knowledge_type`, `data`, `timestamp`,
/// plus the sender's logical clock at send time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeMessage {
    /// Id of the authoring agent.
    pub sender: String,
    /// Kind label of the authoring agent.
    #[serde(rename = "sender_type")]
    pub sender_kind: String,
    /// Category the receiver files this under.
    pub knowledge_type: String,
    /// Payload.
    pub data: Value,
    /// Sender's logical clock at send time.
    pub clock: u64,
    /// Wall-clock send time, seconds since the epoch.
    pub timestamp: f64,
}

impl KnowledgeMessage {
    /// Stamp a new message with the current wall-clock time.
    pub fn new(
        sender: impl Into<String>,
        sender_kind: impl Into<String>,
        knowledge_type: impl Into<String>,
        data: Value,
        clock: u64,
    ) -> Self {
        Self {
            sender: sender.into(),
            sender_kind: sender_kind.into(),
            knowledge_type: knowledge_type.into(),
            data,
            clock,
            timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
        }
    }

    /// Identity digest of this item: same type, same source, same payload
    /// yields the same fingerprint regardless of delivery count.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Md5::new();
        hasher.update(self.knowledge_type.as_bytes());
        hasher.update(b"|");
        hasher.update(self.sender.as_bytes());
        hasher.update(b"|");
        hasher.update(self.data.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}
