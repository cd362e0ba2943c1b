//! Demo society binary.
//!
//! Runs a small default society (emitters producing observations, analysts
//! summarising what they hear), optionally backed by a symbolic worker
//! process.
//!
//! # Environment Variables
//!
//! - `AGORA_WORKER`: worker command to bridge to (no bridge when unset)
//! - `AGORA_WORKER_ARGS`: whitespace-separated worker arguments
//! - `AGORA_MAX_CYCLES`: cycles to run (default: 15)
//! - `AGORA_CYCLE_DELAY_MS`: pause between cycles (default: 1000)
//! - `RUST_LOG`: log filter (default: "info")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin society
//! # or with a worker:
//! AGORA_WORKER=lein AGORA_WORKER_ARGS="run -m kernel.core" cargo run --bin society
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use agora::{
    ActContext, AgentScheduler, Backplane, Behavior, BridgeConfig, KernelBridge, Outbound,
    SocietyConfig,
};

/// Shares one observation per cycle. Consults the kernel when one is
/// bridged, and falls back to a locally derived observation when not.
struct Emitter {
    produced: u64,
}

#[async_trait]
impl Behavior for Emitter {
    async fn act(&mut self, ctx: &mut ActContext<'_>) -> anyhow::Result<Option<Outbound>> {
        self.produced += 1;
        let observation = match ctx.bridge() {
            Some(bridge) => {
                bridge
                    .call("create-atom", json!({"sequence": self.produced}))
                    .await?
            }
            None => json!({"sequence": self.produced, "clock": ctx.state.clock}),
        };
        Ok(Some(Outbound::broadcast("observation", observation)))
    }
}

/// Every few cycles, broadcasts a summary of everything heard so far.
struct Analyst;

#[async_trait]
impl Behavior for Analyst {
    async fn act(&mut self, ctx: &mut ActContext<'_>) -> anyhow::Result<Option<Outbound>> {
        if ctx.state.clock % 5 != 0 {
            return Ok(None);
        }
        let observed = ctx.knowledge.items("observation").len();
        if observed == 0 {
            return Ok(None);
        }
        Ok(Some(Outbound::broadcast(
            "analysis",
            json!({"observations_seen": observed, "at_clock": ctx.state.clock}),
        )))
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = SocietyConfig {
        max_cycles: env_u64("AGORA_MAX_CYCLES", 15),
        cycle_delay_ms: env_u64("AGORA_CYCLE_DELAY_MS", 1000),
        ..SocietyConfig::default()
    };

    let backplane = Arc::new(Backplane::new());
    let bridge = match std::env::var("AGORA_WORKER") {
        Ok(command) => {
            let args: Vec<String> = std::env::var("AGORA_WORKER_ARGS")
                .map(|value| value.split_whitespace().map(String::from).collect())
                .unwrap_or_default();
            let bridge_config = BridgeConfig::new(command).with_args(args);
            log::info!("starting kernel bridge: {}", bridge_config.command);
            Some(Arc::new(KernelBridge::start(bridge_config).await?))
        }
        Err(_) => {
            log::info!("no AGORA_WORKER configured, running without a kernel bridge");
            None
        }
    };

    let mut scheduler = match &bridge {
        Some(bridge) => {
            AgentScheduler::with_bridge(backplane.clone(), bridge.clone(), config)
        }
        None => AgentScheduler::new(backplane.clone(), config),
    };

    for _ in 0..2 {
        scheduler.add_agent("emitter", Box::new(Emitter { produced: 0 }));
    }
    for _ in 0..2 {
        scheduler.add_agent("analyst", Box::new(Analyst));
    }

    let stop = scheduler.stop_handle();
    ctrlc::set_handler(move || {
        log::info!("stop requested, finishing current cycle");
        stop.request_stop();
    })?;

    let stats = scheduler.run_continuous().await;

    println!("\nrun complete: {} cycle(s)", stats.cycles);
    println!(
        "  {} message(s) published, {} knowledge item(s) merged, {} failure(s)",
        stats.messages_published, stats.knowledge_merged, stats.failures
    );
    println!("  backplane delivered {} copies", backplane.messages_delivered());

    for summary in scheduler.society_knowledge().await {
        let total: usize = summary.knowledge.values().sum();
        println!(
            "  agent {} ({}) [{}] clock={} energy={:.1} knowledge={}",
            summary.id, summary.kind, summary.status, summary.clock, summary.energy, total
        );
        for (knowledge_type, count) in &summary.knowledge {
            println!("    - {knowledge_type}: {count}");
        }
    }

    if let Some(bridge) = bridge {
        bridge.shutdown().await;
    }
    Ok(())
}
