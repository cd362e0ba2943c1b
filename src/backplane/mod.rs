//! Publish/subscribe backplane for knowledge exchange between agents.
//!
//! Fan-out is in-process: each subscriber owns an unbounded inbound queue,
//! and `publish` only enqueues and returns. A slow agent never blocks a
//! publisher and never loses messages (at-least-once within the process).
//! A sender is excluded from its own deliveries on both the publish and the
//! drain side, so the invariant survives any transport behind this surface.
//!
//! Subscriptions are explicit handles: the agent (or scheduler) owns the
//! handle and its lifetime, and dropping it deregisters the stream.

pub mod message;

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;

pub use message::{KnowledgeMessage, Topic};

/// Knowledge fan-out between agents.
#[derive(Default)]
pub struct Backplane {
    subscribers: DashMap<String, mpsc::UnboundedSender<KnowledgeMessage>>,
    published: AtomicU64,
    delivered: AtomicU64,
}

impl Backplane {
    /// Create an empty backplane.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the inbound stream for `agent_id`.
    ///
    /// Each agent owns exactly one stream; subscribing again replaces the
    /// previous registration and its undrained backlog.
    pub fn subscribe(&self, agent_id: impl Into<String>) -> Subscription {
        let agent_id = agent_id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        if self.subscribers.insert(agent_id.clone(), tx).is_some() {
            log::debug!("replacing existing subscription for {agent_id}");
        }
        Subscription { agent_id, rx }
    }

    /// Remove an agent's registration. Its handle keeps draining whatever
    /// was already queued.
    pub fn unsubscribe(&self, agent_id: &str) {
        self.subscribers.remove(agent_id);
    }

    /// Deliver `message` to every eligible subscriber on `topic`.
    ///
    /// Returns the number of queues the message was placed on. Never waits
    /// on consumers; never delivers to the message's own sender.
    pub fn publish(&self, topic: &Topic, message: KnowledgeMessage) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        let mut count = 0;
        let mut dead: Vec<String> = Vec::new();

        match topic {
            Topic::Broadcast => {
                for entry in self.subscribers.iter() {
                    if entry.key() == &message.sender {
                        continue;
                    }
                    if entry.value().send(message.clone()).is_ok() {
                        count += 1;
                    } else {
                        dead.push(entry.key().clone());
                    }
                }
            }
            Topic::Private(agent_id) => {
                if agent_id != &message.sender {
                    if let Some(entry) = self.subscribers.get(agent_id) {
                        if entry.value().send(message.clone()).is_ok() {
                            count += 1;
                        } else {
                            dead.push(agent_id.clone());
                        }
                    } else {
                        log::debug!("no subscriber for {topic}, message dropped");
                    }
                }
            }
        }

        for agent_id in dead {
            self.subscribers.remove(&agent_id);
        }
        self.delivered.fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Total messages published since construction.
    pub fn messages_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Total per-subscriber deliveries since construction.
    pub fn messages_delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}

/// One agent's inbound message stream.
pub struct Subscription {
    agent_id: String,
    rx: mpsc::UnboundedReceiver<KnowledgeMessage>,
}

impl Subscription {
    /// Id of the subscribing agent.
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Take everything that has accumulated since the previous drain,
    /// without waiting for new arrivals. Self-authored messages are
    /// filtered here as well, whatever the transport did.
    pub fn drain(&mut self) -> Vec<KnowledgeMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            if message.sender == self.agent_id {
                continue;
            }
            messages.push(message);
        }
        messages
    }

    /// Number of messages currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn atom_message(sender: &str, element: &str) -> KnowledgeMessage {
        KnowledgeMessage::new(sender, "chemist", "atom", json!({"element": element}), 1)
    }

    #[test]
    fn test_broadcast_excludes_sender() {
        let backplane = Backplane::new();
        let mut a = backplane.subscribe("a");
        let mut b = backplane.subscribe("b");
        let mut c = backplane.subscribe("c");

        let delivered = backplane.publish(&Topic::Broadcast, atom_message("a", "H"));
        assert_eq!(delivered, 2);

        assert!(a.drain().is_empty());
        assert_eq!(b.drain().len(), 1);
        assert_eq!(c.drain().len(), 1);
    }

    #[test]
    fn test_private_reaches_only_addressee() {
        let backplane = Backplane::new();
        let mut a = backplane.subscribe("a");
        let mut b = backplane.subscribe("b");
        let mut c = backplane.subscribe("c");

        let delivered = backplane.publish(&Topic::Private("b".into()), atom_message("a", "O"));
        assert_eq!(delivered, 1);

        assert!(a.drain().is_empty());
        assert!(c.drain().is_empty());
        let received = b.drain();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].sender, "a");
    }

    #[test]
    fn test_self_addressed_private_is_dropped() {
        let backplane = Backplane::new();
        let mut a = backplane.subscribe("a");

        let delivered = backplane.publish(&Topic::Private("a".into()), atom_message("a", "H"));
        assert_eq!(delivered, 0);
        assert!(a.drain().is_empty());
    }

    #[test]
    fn test_per_sender_order_preserved() {
        let backplane = Backplane::new();
        let _a = backplane.subscribe("a");
        let mut b = backplane.subscribe("b");

        for element in ["H", "C", "N", "O"] {
            backplane.publish(&Topic::Broadcast, atom_message("a", element));
        }

        let elements: Vec<String> = b
            .drain()
            .iter()
            .map(|m| m.data["element"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(elements, vec!["H", "C", "N", "O"]);
    }

    #[test]
    fn test_drain_is_non_blocking() {
        let backplane = Backplane::new();
        let mut a = backplane.subscribe("a");
        assert!(a.is_empty());
        assert!(a.drain().is_empty());
        assert!(a.drain().is_empty());
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let backplane = Backplane::new();
        let a = backplane.subscribe("a");
        let _b = backplane.subscribe("b");
        assert_eq!(backplane.subscriber_count(), 2);

        drop(a);
        // The next publish notices the closed queue and prunes it.
        let delivered = backplane.publish(&Topic::Broadcast, atom_message("b", "H"));
        assert_eq!(delivered, 0);
        assert_eq!(backplane.subscriber_count(), 1);
    }

    #[test]
    fn test_counters() {
        let backplane = Backplane::new();
        let _a = backplane.subscribe("a");
        let _b = backplane.subscribe("b");
        let _c = backplane.subscribe("c");

        backplane.publish(&Topic::Broadcast, atom_message("a", "H"));
        backplane.publish(&Topic::Private("b".into()), atom_message("a", "O"));

        assert_eq!(backplane.messages_published(), 2);
        assert_eq!(backplane.messages_delivered(), 3);
    }

    #[test]
    fn test_resubscribe_replaces_stream() {
        let backplane = Backplane::new();
        let _stale = backplane.subscribe("a");
        let mut fresh = backplane.subscribe("a");
        assert_eq!(backplane.subscriber_count(), 1);

        backplane.publish(&Topic::Private("a".into()), atom_message("b", "H"));
        assert_eq!(fresh.drain().len(), 1);
    }
}
