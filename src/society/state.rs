//! Per-agent mutable record: identity, logical clock, energy budget, status.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an agent.
///
/// `Exhausted` and `Stopped` are terminal: no further Act or Share phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Participates in every cycle.
    Active,
    /// Energy budget ran out.
    Exhausted,
    /// Stopped by the operator.
    Stopped,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Active => write!(f, "active"),
            AgentStatus::Exhausted => write!(f, "exhausted"),
            AgentStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// Identity and budget of one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    /// Opaque stable identifier.
    pub id: String,
    /// Kind label, carried as `sender_type` in every published envelope.
    pub kind: String,
    /// Monotonic logical clock; +1 per cycle.
    pub clock: u64,
    /// Remaining energy budget.
    pub energy: f64,
    /// Lifecycle status.
    pub status: AgentStatus,
}

impl AgentState {
    /// Create an active agent with the given id, kind and starting energy.
    pub fn new(id: impl Into<String>, kind: impl Into<String>, energy: f64) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            clock: 0,
            energy,
            status: AgentStatus::Active,
        }
    }

    /// Create an agent with a generated id.
    pub fn with_generated_id(kind: impl Into<String>, energy: f64) -> Self {
        Self::new(Uuid::new_v4().to_string(), kind, energy)
    }

    /// Advance the logical clock and burn one tick's energy.
    ///
    /// The status flips to `Exhausted` exactly when the budget reaches zero;
    /// once terminal, ticking changes nothing.
    pub fn tick(&mut self, cost: f64) {
        if self.status != AgentStatus::Active {
            return;
        }
        self.clock += 1;
        self.energy = (self.energy - cost).max(0.0);
        if self.energy <= 0.0 {
            self.status = AgentStatus::Exhausted;
            log::info!("agent {} exhausted at clock {}", self.id, self.clock);
        }
    }

    /// Explicit external replenishment, the only way the budget increases.
    ///
    /// Replenishing an exhausted agent reactivates it; a stopped agent stays
    /// stopped.
    pub fn replenish(&mut self, amount: f64) {
        self.energy += amount;
        if self.status == AgentStatus::Exhausted && self.energy > 0.0 {
            self.status = AgentStatus::Active;
        }
    }

    /// Operator stop. Terminal.
    pub fn stop(&mut self) {
        self.status = AgentStatus::Stopped;
    }

    /// Whether this agent still runs cycles.
    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_advances_clock_and_burns_energy() {
        let mut state = AgentState::new("a1", "chemist", 1.0);
        state.tick(0.25);
        assert_eq!(state.clock, 1);
        assert!((state.energy - 0.75).abs() < 1e-9);
        assert!(state.is_active());
    }

    #[test]
    fn test_exhaustion_exactly_at_zero() {
        let mut state = AgentState::new("a1", "chemist", 0.3);
        state.tick(0.1);
        state.tick(0.1);
        assert!(state.is_active());
        state.tick(0.1);
        assert_eq!(state.status, AgentStatus::Exhausted);
        assert_eq!(state.clock, 3);

        // Terminal: further ticks change nothing.
        state.tick(0.1);
        assert_eq!(state.clock, 3);
        assert_eq!(state.energy, 0.0);
    }

    #[test]
    fn test_replenish_reactivates_exhausted() {
        let mut state = AgentState::new("a1", "chemist", 0.1);
        state.tick(0.1);
        assert_eq!(state.status, AgentStatus::Exhausted);

        state.replenish(5.0);
        assert!(state.is_active());
        state.tick(0.1);
        assert_eq!(state.clock, 2);
    }

    #[test]
    fn test_stop_is_terminal() {
        let mut state = AgentState::new("a1", "chemist", 10.0);
        state.stop();
        state.tick(0.1);
        assert_eq!(state.clock, 0);
        assert_eq!(state.status, AgentStatus::Stopped);

        state.replenish(100.0);
        assert_eq!(state.status, AgentStatus::Stopped);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = AgentState::with_generated_id("chemist", 100.0);
        let b = AgentState::with_generated_id("chemist", 100.0);
        assert_ne!(a.id, b.id);
    }
}
