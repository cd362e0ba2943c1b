//! Append-oriented per-agent knowledge store.
//!
//! Knowledge is filed under its type as an ordered, append-only sequence.
//! Merging is idempotent by item identity (type + source + payload), so
//! at-least-once delivery from the backplane never double-counts anything.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backplane::KnowledgeMessage;

/// One received piece of knowledge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    /// Id of the agent that shared it.
    pub source: String,
    /// Kind label of the sharing agent.
    pub source_kind: String,
    /// Payload.
    pub data: Value,
    /// Sender's logical clock at send time.
    pub clock: u64,
    /// Wall-clock send time, seconds since the epoch.
    pub timestamp: f64,
}

/// Mapping knowledge-type → received items, deduplicated on write.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct KnowledgeStore {
    entries: HashMap<String, Vec<KnowledgeItem>>,
    seen: HashSet<String>,
}

impl KnowledgeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// File one message under its knowledge type.
    ///
    /// Returns `false` without touching anything when the item is already
    /// known; existing entries are never overwritten.
    pub fn merge(&mut self, message: &KnowledgeMessage) -> bool {
        if !self.seen.insert(message.fingerprint()) {
            return false;
        }
        self.entries
            .entry(message.knowledge_type.clone())
            .or_default()
            .push(KnowledgeItem {
                source: message.sender.clone(),
                source_kind: message.sender_kind.clone(),
                data: message.data.clone(),
                clock: message.clock,
                timestamp: message.timestamp,
            });
        true
    }

    /// Items received under one knowledge type, in arrival order.
    pub fn items(&self, knowledge_type: &str) -> &[KnowledgeItem] {
        self.entries
            .get(knowledge_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All knowledge types with at least one item.
    pub fn types(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Total item count across all types.
    pub fn total(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Item count per knowledge type, for society summaries.
    pub fn summary(&self) -> HashMap<String, usize> {
        self.entries
            .iter()
            .map(|(knowledge_type, items)| (knowledge_type.clone(), items.len()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(sender: &str, knowledge_type: &str, data: Value) -> KnowledgeMessage {
        KnowledgeMessage::new(sender, "chemist", knowledge_type, data, 1)
    }

    #[test]
    fn test_merge_appends_in_order() {
        let mut store = KnowledgeStore::new();
        assert!(store.merge(&message("a", "atom", json!({"element": "H"}))));
        assert!(store.merge(&message("a", "atom", json!({"element": "O"}))));
        assert!(store.merge(&message("b", "analysis", json!({"stable": true}))));

        let atoms = store.items("atom");
        assert_eq!(atoms.len(), 2);
        assert_eq!(atoms[0].data["element"], "H");
        assert_eq!(atoms[1].data["element"], "O");
        assert_eq!(store.total(), 3);
    }

    #[test]
    fn test_redelivery_is_idempotent() {
        let mut store = KnowledgeStore::new();
        let msg = message("a", "atom", json!({"element": "H"}));

        assert!(store.merge(&msg));
        assert!(!store.merge(&msg));
        assert!(!store.merge(&msg));

        assert_eq!(store.total(), 1);
        assert_eq!(store.summary().get("atom"), Some(&1));
    }

    #[test]
    fn test_same_payload_from_different_sources_is_distinct() {
        let mut store = KnowledgeStore::new();
        assert!(store.merge(&message("a", "atom", json!({"element": "H"}))));
        assert!(store.merge(&message("b", "atom", json!({"element": "H"}))));
        assert_eq!(store.items("atom").len(), 2);
    }

    #[test]
    fn test_unknown_type_is_empty() {
        let store = KnowledgeStore::new();
        assert!(store.items("molecule").is_empty());
        assert_eq!(store.total(), 0);
        assert!(store.types().is_empty());
    }
}
