//! Cycle scheduler for the agent society.
//!
//! One cycle launches a fresh task per active agent, runs every agent's
//! Tick→Act→Share→Sync concurrently, and joins them all before returning.
//! No task persists across cycles. A single agent failing (an error out of
//! Act or an outright panic) is recorded in the cycle report and never
//! stops the other agents or the loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::backplane::Backplane;
use crate::bridge::KernelBridge;
use crate::config::SocietyConfig;
use crate::error::AgentFailure;
use crate::society::agent::Agent;
use crate::society::behavior::Behavior;
use crate::society::state::{AgentState, AgentStatus};

/// Aggregated result of one scheduler cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// 1-based cycle number.
    pub cycle: u64,
    /// Agents that entered the cycle as `Active`.
    pub active_agents: usize,
    /// Messages published during the cycle's Share phases.
    pub published: usize,
    /// New knowledge items merged during the cycle's Sync phases.
    pub merged: usize,
    /// Redelivered items ignored by stores.
    pub duplicates: usize,
    /// Per-agent failures; never fatal to the cycle.
    pub failures: Vec<AgentFailure>,
}

/// Cumulative statistics across a continuous run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SocietyStats {
    /// Cycles completed.
    pub cycles: u64,
    /// Total messages published.
    pub messages_published: u64,
    /// Total new knowledge items merged.
    pub knowledge_merged: u64,
    /// Total agent failures recorded.
    pub failures: u64,
}

/// Snapshot of one agent for the society summary.
#[derive(Debug, Clone, Serialize)]
pub struct AgentSummary {
    /// Agent id.
    pub id: String,
    /// Agent kind label.
    pub kind: String,
    /// Lifecycle status.
    pub status: AgentStatus,
    /// Logical clock.
    pub clock: u64,
    /// Remaining energy.
    pub energy: f64,
    /// Item count per knowledge type.
    pub knowledge: HashMap<String, usize>,
}

/// Clonable handle for requesting a stop at the next cycle boundary.
#[derive(Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Request the scheduler to stop. The cycle in progress finishes.
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Drives all agents through concurrent cycles.
pub struct AgentScheduler {
    backplane: Arc<Backplane>,
    bridge: Option<Arc<KernelBridge>>,
    agents: Vec<(String, Arc<Mutex<Agent>>)>,
    config: SocietyConfig,
    cycle: AtomicU64,
    stats: parking_lot::Mutex<SocietyStats>,
    stop: Arc<AtomicBool>,
}

impl AgentScheduler {
    /// Create a scheduler over a backplane, without a kernel bridge.
    pub fn new(backplane: Arc<Backplane>, config: SocietyConfig) -> Self {
        Self {
            backplane,
            bridge: None,
            agents: Vec::new(),
            config,
            cycle: AtomicU64::new(0),
            stats: parking_lot::Mutex::new(SocietyStats::default()),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a scheduler whose agents share a kernel bridge.
    pub fn with_bridge(
        backplane: Arc<Backplane>,
        bridge: Arc<KernelBridge>,
        config: SocietyConfig,
    ) -> Self {
        let mut scheduler = Self::new(backplane, config);
        scheduler.bridge = Some(bridge);
        scheduler
    }

    /// Add an agent of the given kind with a generated id and the configured
    /// starting energy. Returns the id.
    pub fn add_agent(&mut self, kind: &str, behavior: Box<dyn Behavior>) -> String {
        let state = AgentState::with_generated_id(kind, self.config.initial_energy);
        self.add_agent_with_state(state, behavior)
    }

    /// Add an agent with an explicit state record. Returns the id.
    pub fn add_agent_with_state(
        &mut self,
        state: AgentState,
        behavior: Box<dyn Behavior>,
    ) -> String {
        let id = state.id.clone();
        let agent = Agent::new(
            state,
            behavior,
            self.backplane.clone(),
            self.bridge.clone(),
        );
        log::info!("added agent {id} ({})", agent.state().kind);
        self.agents.push((id.clone(), Arc::new(Mutex::new(agent))));
        id
    }

    /// Number of agents registered, regardless of status.
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// A handle for stopping a continuous run from another task or a signal
    /// handler.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.stop.clone())
    }

    /// Request a stop at the next cycle boundary.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Run one cycle across all active agents concurrently, returning after
    /// every agent's cycle has completed or failed.
    pub async fn run_cycle(&self) -> CycleReport {
        let cycle = self.cycle.fetch_add(1, Ordering::SeqCst) + 1;
        let tick_cost = self.config.tick_cost;

        let mut ids = Vec::with_capacity(self.agents.len());
        let mut tasks = Vec::with_capacity(self.agents.len());
        for (id, slot) in &self.agents {
            ids.push(id.clone());
            let slot = slot.clone();
            tasks.push(tokio::spawn(async move {
                let mut agent = slot.lock().await;
                if !agent.state().is_active() {
                    return None;
                }
                Some(agent.run_cycle(tick_cost).await)
            }));
        }

        let mut report = CycleReport {
            cycle,
            active_agents: 0,
            published: 0,
            merged: 0,
            duplicates: 0,
            failures: Vec::new(),
        };

        let results = futures::future::join_all(tasks).await;
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(None) => {}
                Ok(Some(Ok(outcome))) => {
                    report.active_agents += 1;
                    if outcome.published {
                        report.published += 1;
                    }
                    report.merged += outcome.merged;
                    report.duplicates += outcome.duplicates;
                }
                Ok(Some(Err(e))) => {
                    report.active_agents += 1;
                    log::warn!("agent {id} failed in cycle {cycle}: {e:#}");
                    report.failures.push(AgentFailure {
                        agent_id: id,
                        message: format!("{e:#}"),
                    });
                }
                Err(join_error) => {
                    log::error!("agent {id} task died in cycle {cycle}: {join_error}");
                    report.failures.push(AgentFailure {
                        agent_id: id,
                        message: format!("agent task panicked: {join_error}"),
                    });
                }
            }
        }

        let mut stats = self.stats.lock();
        stats.cycles += 1;
        stats.messages_published += report.published as u64;
        stats.knowledge_merged += report.merged as u64;
        stats.failures += report.failures.len() as u64;

        report
    }

    /// Repeat `run_cycle` up to the configured maximum, pausing between
    /// cycles. Stops early at a cycle boundary when requested through a
    /// [`StopHandle`] or when no agent remains active; a cycle already in
    /// progress always finishes.
    pub async fn run_continuous(&self) -> SocietyStats {
        log::info!(
            "running society of {} agent(s) for up to {} cycle(s)",
            self.agents.len(),
            self.config.max_cycles
        );

        for index in 0..self.config.max_cycles {
            if self.stop.load(Ordering::SeqCst) {
                log::info!("stop requested, ending run at cycle boundary");
                break;
            }

            let report = self.run_cycle().await;
            log::info!(
                "cycle {}/{}: {} active, {} published, {} merged, {} failure(s)",
                report.cycle,
                self.config.max_cycles,
                report.active_agents,
                report.published,
                report.merged,
                report.failures.len()
            );

            if report.active_agents == 0 {
                log::info!("no active agents remain, ending run");
                break;
            }
            if index + 1 < self.config.max_cycles {
                tokio::time::sleep(self.config.cycle_delay()).await;
            }
        }

        self.stats()
    }

    /// Cumulative statistics so far.
    pub fn stats(&self) -> SocietyStats {
        self.stats.lock().clone()
    }

    /// Snapshot every agent's record and knowledge summary.
    pub async fn society_knowledge(&self) -> Vec<AgentSummary> {
        let mut summaries = Vec::with_capacity(self.agents.len());
        for (_, slot) in &self.agents {
            let agent = slot.lock().await;
            let state = agent.state();
            summaries.push(AgentSummary {
                id: state.id.clone(),
                kind: state.kind.clone(),
                status: state.status,
                clock: state.clock,
                energy: state.energy,
                knowledge: agent.knowledge().summary(),
            });
        }
        summaries
    }

    /// Stop every agent and deregister it from the backplane.
    pub async fn stop_all(&self) {
        for (_, slot) in &self.agents {
            slot.lock().await.stop();
        }
    }
}
