//! One agent: state, behavior, subscription, and the 4-phase cycle.

use std::sync::Arc;

use crate::backplane::{Backplane, KnowledgeMessage, Subscription};
use crate::bridge::KernelBridge;
use crate::society::behavior::{ActContext, Behavior};
use crate::society::knowledge::KnowledgeStore;
use crate::society::state::{AgentState, AgentStatus};

/// What one agent did during one cycle.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    /// Logical clock after the Tick phase.
    pub clock: u64,
    /// Status after the cycle.
    pub status: AgentStatus,
    /// Whether the Share phase published a message.
    pub published: bool,
    /// New knowledge items merged during Sync.
    pub merged: usize,
    /// Redelivered items the store already knew.
    pub duplicates: usize,
}

/// A society member. Owns its record exclusively; shares only the backplane
/// and (optionally) the kernel bridge with the rest of the society.
pub struct Agent {
    state: AgentState,
    knowledge: KnowledgeStore,
    behavior: Box<dyn Behavior>,
    subscription: Subscription,
    backplane: Arc<Backplane>,
    bridge: Option<Arc<KernelBridge>>,
}

impl Agent {
    /// Create an agent and open its inbound stream on the backplane.
    pub fn new(
        state: AgentState,
        behavior: Box<dyn Behavior>,
        backplane: Arc<Backplane>,
        bridge: Option<Arc<KernelBridge>>,
    ) -> Self {
        let subscription = backplane.subscribe(state.id.clone());
        Self {
            state,
            knowledge: KnowledgeStore::new(),
            behavior,
            subscription,
            backplane,
            bridge,
        }
    }

    /// The agent's id.
    pub fn id(&self) -> &str {
        &self.state.id
    }

    /// The agent's record.
    pub fn state(&self) -> &AgentState {
        &self.state
    }

    /// Everything the agent has learned.
    pub fn knowledge(&self) -> &KnowledgeStore {
        &self.knowledge
    }

    /// Run one Tick→Act→Share→Sync cycle.
    ///
    /// An error from the Act phase aborts only this agent's cycle; whatever
    /// is queued on the subscription stays for the next Sync.
    pub async fn run_cycle(&mut self, tick_cost: f64) -> anyhow::Result<CycleOutcome> {
        // Tick
        self.state.tick(tick_cost);
        if !self.state.is_active() {
            return Ok(CycleOutcome {
                clock: self.state.clock,
                status: self.state.status,
                published: false,
                merged: 0,
                duplicates: 0,
            });
        }

        // Act
        let outbound = {
            let mut ctx = ActContext::new(&self.state, &self.knowledge, self.bridge.as_deref());
            self.behavior.act(&mut ctx).await?
        };

        // Share
        let published = match outbound {
            Some(outbound) => {
                let message = KnowledgeMessage::new(
                    self.state.id.clone(),
                    self.state.kind.clone(),
                    outbound.knowledge_type,
                    outbound.data,
                    self.state.clock,
                );
                let delivered = self.backplane.publish(&outbound.topic, message);
                log::debug!(
                    "agent {} shared on {} to {delivered} subscriber(s)",
                    self.state.id,
                    outbound.topic
                );
                true
            }
            None => false,
        };

        // Sync
        let mut merged = 0;
        let mut duplicates = 0;
        for message in self.subscription.drain() {
            if self.knowledge.merge(&message) {
                merged += 1;
            } else {
                duplicates += 1;
            }
        }

        Ok(CycleOutcome {
            clock: self.state.clock,
            status: self.state.status,
            published,
            merged,
            duplicates,
        })
    }

    /// Operator stop: terminal status and backplane deregistration.
    pub fn stop(&mut self) {
        self.state.stop();
        self.backplane.unsubscribe(&self.state.id);
    }

    /// Externally replenish the agent's energy budget.
    pub fn replenish(&mut self, amount: f64) {
        self.state.replenish(amount);
    }
}
