//! The agent society: per-agent state and knowledge, the behavior seam, and
//! the cycle scheduler.
//!
//! Agents are independent workers advancing in lockstep cycles. Each cycle an
//! agent ticks its clock and budget, decides an action (possibly consulting
//! the symbolic kernel through the bridge), shares at most one message on the
//! backplane, and merges whatever arrived since its previous sync.

pub mod agent;
pub mod behavior;
pub mod knowledge;
pub mod scheduler;
pub mod state;

pub use agent::{Agent, CycleOutcome};
pub use behavior::{ActContext, Behavior, Outbound};
pub use knowledge::{KnowledgeItem, KnowledgeStore};
pub use scheduler::{AgentScheduler, AgentSummary, CycleReport, SocietyStats, StopHandle};
pub use state::{AgentState, AgentStatus};
