//! The Act seam: agent-specific decision logic behind a trait object.
//!
//! Concrete behavior types implement [`Behavior`]; the scheduler dispatches
//! them explicitly through the trait; there is no open-ended hierarchy to
//! subclass. During Act a behavior may issue kernel calls through the
//! context (the one intentional blocking point of the phase) and produce at
//! most one outbound message for the Share phase.

use async_trait::async_trait;
use serde_json::Value;

use crate::backplane::Topic;
use crate::bridge::KernelBridge;
use crate::error::BridgeError;
use crate::society::knowledge::KnowledgeStore;
use crate::society::state::AgentState;

/// What an agent decided to share this cycle.
#[derive(Debug, Clone)]
pub struct Outbound {
    /// Where to publish.
    pub topic: Topic,
    /// Category receivers file this under.
    pub knowledge_type: String,
    /// Payload.
    pub data: Value,
}

impl Outbound {
    /// Share with every other agent.
    pub fn broadcast(knowledge_type: impl Into<String>, data: Value) -> Self {
        Self {
            topic: Topic::Broadcast,
            knowledge_type: knowledge_type.into(),
            data,
        }
    }

    /// Share with one specific agent.
    pub fn private(
        to: impl Into<String>,
        knowledge_type: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            topic: Topic::Private(to.into()),
            knowledge_type: knowledge_type.into(),
            data,
        }
    }
}

/// What a behavior can see and reach while deciding.
pub struct ActContext<'a> {
    /// The agent's own record, read-only.
    pub state: &'a AgentState,
    /// Everything the agent has learned so far.
    pub knowledge: &'a KnowledgeStore,
    bridge: Option<&'a KernelBridge>,
}

impl<'a> ActContext<'a> {
    /// Assemble a context for one Act phase.
    pub fn new(
        state: &'a AgentState,
        knowledge: &'a KnowledgeStore,
        bridge: Option<&'a KernelBridge>,
    ) -> Self {
        Self {
            state,
            knowledge,
            bridge,
        }
    }

    /// The shared kernel bridge, when the society runs with one.
    pub fn bridge(&self) -> Option<&KernelBridge> {
        self.bridge
    }

    /// Issue one kernel command with the bridge's default timeout.
    ///
    /// Fails with `ProcessUnavailable` when the society runs without a
    /// bridge, so behaviors degrade the same way as with a dead worker.
    pub async fn kernel_call(&self, command: &str, payload: Value) -> Result<Value, BridgeError> {
        match self.bridge {
            Some(bridge) => bridge.call(command, payload).await,
            None => Err(BridgeError::ProcessUnavailable),
        }
    }
}

/// Agent-specific decision logic, invoked once per cycle.
#[async_trait]
pub trait Behavior: Send {
    /// Decide this cycle's action: zero or more kernel calls, at most one
    /// outbound message.
    async fn act(&mut self, ctx: &mut ActContext<'_>) -> anyhow::Result<Option<Outbound>>;
}
