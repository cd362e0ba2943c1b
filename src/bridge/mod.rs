//! Bridge to the out-of-process symbolic worker.
//!
//! The worker is an opaque long-running child process speaking one JSON
//! object per line. [`KernelBridge`] ties the pieces together: it spawns the
//! process through [`ProcessSupervisor`], performs the readiness handshake,
//! and exposes request/response calls through [`RpcClient`].
//!
//! A bridge is constructed explicitly and passed (usually as an `Arc`) to
//! whoever needs it; there is no global instance. `start` and `shutdown`
//! bound its lifecycle, and a fake worker script is all a test needs.

pub mod protocol;
pub mod rpc;
pub mod supervisor;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::config::BridgeConfig;
use crate::error::BridgeError;

pub use protocol::{InboundLine, KernelRequest, KernelResponse};
pub use rpc::RpcClient;
pub use supervisor::ProcessSupervisor;

/// Handle to a running symbolic worker.
#[derive(Debug)]
pub struct KernelBridge {
    supervisor: Arc<ProcessSupervisor>,
    rpc: RpcClient,
    config: BridgeConfig,
}

impl KernelBridge {
    /// Spawn the worker and wait for its readiness signal.
    ///
    /// Fails with [`BridgeError::Spawn`] when the process cannot be launched
    /// and [`BridgeError::StartupTimeout`] when no `{"status":"ready"}` line
    /// arrives within the configured window (diagnostic lines before it are
    /// skipped). Either failure tears the child down; initialisation never
    /// proceeds silently.
    pub async fn start(config: BridgeConfig) -> Result<Self, BridgeError> {
        let (supervisor, mut lines) = ProcessSupervisor::spawn(&config)?;
        let supervisor = Arc::new(supervisor);

        if let Err(e) = await_ready(&mut lines, config.startup_timeout()).await {
            supervisor.shutdown(config.shutdown_grace()).await;
            return Err(e);
        }
        log::info!("worker {} is ready", supervisor.identifier());

        let rpc = RpcClient::new(supervisor.clone(), lines);
        Ok(Self {
            supervisor,
            rpc,
            config,
        })
    }

    /// Issue one command with the configured default timeout.
    pub async fn call(&self, command: &str, payload: Value) -> Result<Value, BridgeError> {
        self.rpc
            .call(command, payload, self.config.call_timeout())
            .await
    }

    /// Issue one command with an explicit timeout.
    pub async fn call_with_timeout(
        &self,
        command: &str,
        payload: Value,
        timeout: Duration,
    ) -> Result<Value, BridgeError> {
        self.rpc.call(command, payload, timeout).await
    }

    /// Round-trip the worker's `health-check` command.
    pub async fn health_check(&self) -> Result<Value, BridgeError> {
        self.call("health-check", json!({})).await
    }

    /// Whether the worker process is running and accepting calls.
    pub fn is_alive(&self) -> bool {
        self.rpc.is_available()
    }

    /// Number of calls currently in flight.
    pub fn pending_count(&self) -> usize {
        self.rpc.pending_count()
    }

    /// Stop the worker. Outstanding calls resolve to `ProcessUnavailable`
    /// immediately rather than waiting out their deadlines. Idempotent.
    pub async fn shutdown(&self) {
        self.rpc.poison();
        self.supervisor.shutdown(self.config.shutdown_grace()).await;
    }

    /// Stop the current worker (if any) and start a fresh one with the same
    /// configuration.
    pub async fn restart(&mut self) -> Result<(), BridgeError> {
        log::info!("restarting worker {}", self.supervisor.identifier());
        self.shutdown().await;
        let replacement = KernelBridge::start(self.config.clone()).await?;
        *self = replacement;
        Ok(())
    }
}

async fn await_ready(
    lines: &mut mpsc::Receiver<String>,
    window: Duration,
) -> Result<(), BridgeError> {
    let deadline = Instant::now() + window;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(BridgeError::StartupTimeout {
                waited_secs: window.as_secs(),
            });
        }
        match tokio::time::timeout(remaining, lines.recv()).await {
            Ok(Some(line)) => match InboundLine::parse(&line) {
                Ok(InboundLine::Ready) => return Ok(()),
                Ok(_) => log::debug!("pre-ready worker output: {line}"),
                Err(_) => log::debug!("pre-ready non-protocol line: {line}"),
            },
            // Worker exited before signalling ready.
            Ok(None) => {
                return Err(BridgeError::StartupTimeout {
                    waited_secs: window.as_secs(),
                })
            }
            Err(_) => {
                return Err(BridgeError::StartupTimeout {
                    waited_secs: window.as_secs(),
                })
            }
        }
    }
}
