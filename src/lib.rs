//! # Agora
//!
//! Runtime for a society of autonomous agents. Agents advance through
//! concurrent Tick→Act→Share→Sync cycles, offload symbolic computation to a
//! long-running external worker process over a line-oriented JSON RPC
//! bridge, and exchange derived knowledge through a publish/subscribe
//! backplane.
//!
//! The crate is the coordination core only: process supervision, request
//! correlation with timeouts, knowledge fan-out without self-delivery, and
//! the cycle scheduler. Domain behaviors plug in through
//! [`society::Behavior`]; the worker process is any executable speaking the
//! wire protocol in [`bridge::protocol`].

pub mod backplane;
pub mod bridge;
pub mod config;
pub mod error;
pub mod society;

pub use backplane::{Backplane, KnowledgeMessage, Subscription, Topic};
pub use bridge::KernelBridge;
pub use config::{BridgeConfig, SocietyConfig};
pub use error::{AgentFailure, BridgeError};
pub use society::{
    ActContext, Agent, AgentScheduler, AgentState, AgentStatus, Behavior, CycleReport,
    KnowledgeStore, Outbound, SocietyStats,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
