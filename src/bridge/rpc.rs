//! Asynchronous request/response layer over the worker's line streams.
//!
//! Callers register a oneshot waiter keyed by a fresh request id *before* the
//! request line is written, then await the waiter under their own deadline. A
//! router task consumes the supervisor's stdout stream and resolves waiters
//! exactly once; when the stream ends (the worker exited) every outstanding
//! waiter fails with `ProcessUnavailable` instead of dangling until its
//! individual timeout.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::bridge::protocol::{InboundLine, KernelRequest};
use crate::bridge::supervisor::ProcessSupervisor;
use crate::error::BridgeError;

type Waiter = oneshot::Sender<Result<Value, BridgeError>>;

/// Presents the line-oriented worker process as an async RPC service.
#[derive(Debug)]
pub struct RpcClient {
    supervisor: Arc<ProcessSupervisor>,
    pending: Arc<DashMap<String, Waiter>>,
    next_id: AtomicU64,
    available: Arc<AtomicBool>,
}

impl RpcClient {
    /// Build a client over an already-spawned supervisor and its stdout
    /// line stream (readiness line already consumed by the handshake).
    pub fn new(supervisor: Arc<ProcessSupervisor>, lines: mpsc::Receiver<String>) -> Self {
        let pending: Arc<DashMap<String, Waiter>> = Arc::new(DashMap::new());
        let available = Arc::new(AtomicBool::new(true));

        tokio::spawn(route_lines(lines, pending.clone(), available.clone()));

        Self {
            supervisor,
            pending,
            next_id: AtomicU64::new(1),
            available,
        }
    }

    /// Whether calls can currently reach the worker.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst) && self.supervisor.is_alive()
    }

    /// Number of calls currently awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Issue one command and await its response.
    ///
    /// Resolves to the worker's `result` value, a worker-reported
    /// [`BridgeError::Kernel`], [`BridgeError::Timeout`] once `timeout`
    /// elapses (the correlation slot is reclaimed immediately), or
    /// [`BridgeError::ProcessUnavailable`] if the worker dies mid-flight.
    pub async fn call(
        &self,
        command: &str,
        payload: Value,
        timeout: Duration,
    ) -> Result<Value, BridgeError> {
        if !self.is_available() {
            return Err(BridgeError::ProcessUnavailable);
        }

        let request_id = format!("req_{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id.clone(), tx);

        let line = match KernelRequest::new(&request_id, command, payload).to_line() {
            Ok(line) => line,
            Err(e) => {
                self.pending.remove(&request_id);
                return Err(e);
            }
        };
        if let Err(e) = self.supervisor.write_line(line) {
            self.pending.remove(&request_id);
            return Err(e);
        }

        let started = Instant::now();
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            // The router dropped the waiter without resolving it; only
            // possible when the stream tore down mid-resolution.
            Ok(Err(_)) => Err(BridgeError::ProcessUnavailable),
            Err(_) => {
                self.pending.remove(&request_id);
                log::warn!("request {request_id} ({command}) timed out");
                Err(BridgeError::Timeout {
                    request_id,
                    waited_ms: started.elapsed().as_millis() as u64,
                })
            }
        }
    }

    /// Fail every outstanding call with `ProcessUnavailable` and refuse new
    /// ones. Used by bridge shutdown so callers do not wait out their
    /// individual deadlines.
    pub fn poison(&self) {
        self.available.store(false, Ordering::SeqCst);
        fail_all_pending(&self.pending);
    }
}

async fn route_lines(
    mut lines: mpsc::Receiver<String>,
    pending: Arc<DashMap<String, Waiter>>,
    available: Arc<AtomicBool>,
) {
    while let Some(line) = lines.recv().await {
        match InboundLine::parse(&line) {
            Ok(InboundLine::Response(response)) => {
                match pending.remove(&response.request_id) {
                    Some((_, waiter)) => {
                        // Late receivers may already be gone; the response is
                        // simply discarded then.
                        let _ = waiter.send(response.into_result());
                    }
                    None => {
                        log::debug!(
                            "discarding response for unknown request {}",
                            response.request_id
                        );
                    }
                }
            }
            Ok(InboundLine::Ready) => {
                log::debug!("ignoring duplicate readiness signal");
            }
            Ok(InboundLine::Unsolicited(value)) => {
                log::debug!("unsolicited worker output: {value}");
            }
            Err(e) => {
                log::debug!("discarding non-protocol line: {e}");
            }
        }
    }

    available.store(false, Ordering::SeqCst);
    let outstanding = pending.len();
    if outstanding > 0 {
        log::warn!("worker exited with {outstanding} pending call(s)");
    }
    fail_all_pending(&pending);
}

fn fail_all_pending(pending: &DashMap<String, Waiter>) {
    let ids: Vec<String> = pending.iter().map(|entry| entry.key().clone()).collect();
    for id in ids {
        if let Some((_, waiter)) = pending.remove(&id) {
            let _ = waiter.send(Err(BridgeError::ProcessUnavailable));
        }
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use serde_json::json;
    use tempfile::NamedTempFile;

    /// Worker that answers every request with a fixed atom result.
    const ECHO_WORKER: &str = r#"
echo '{"status":"ready"}'
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"request_id":"\([^"]*\)".*/\1/p')
  printf '{"request_id":"%s","result":{"id":"atom_1","element":"H"}}\n' "$id"
done
"#;

    /// Worker that reads requests but never answers.
    const SILENT_WORKER: &str = r#"
echo '{"status":"ready"}'
while IFS= read -r line; do :; done
"#;

    /// Worker that answers three requests in reverse arrival order,
    /// echoing back each request's payload marker.
    const REORDER_WORKER: &str = r#"
echo '{"status":"ready"}'
IFS= read -r l1
IFS= read -r l2
IFS= read -r l3
reply() {
  id=$(printf '%s' "$1" | sed -n 's/.*"request_id":"\([^"]*\)".*/\1/p')
  marker=$(printf '%s' "$1" | sed -n 's/.*"marker":"\([^"]*\)".*/\1/p')
  printf '{"request_id":"%s","result":{"marker":"%s"}}\n' "$id" "$marker"
}
reply "$l3"
reply "$l1"
reply "$l2"
cat >/dev/null
"#;

    /// Worker that answers one request, then dies with work in flight.
    const DYING_WORKER: &str = r#"
echo '{"status":"ready"}'
IFS= read -r line
id=$(printf '%s' "$line" | sed -n 's/.*"request_id":"\([^"]*\)".*/\1/p')
printf '{"request_id":"%s","result":{"ok":true}}\n' "$id"
IFS= read -r line
exit 1
"#;

    /// Worker that answers its first request one second too late.
    const LATE_WORKER: &str = r#"
echo '{"status":"ready"}'
IFS= read -r line
id=$(printf '%s' "$line" | sed -n 's/.*"request_id":"\([^"]*\)".*/\1/p')
sleep 1
printf '{"request_id":"%s","result":{"late":true}}\n' "$id"
cat >/dev/null
"#;

    /// Worker that interleaves noise with real responses.
    const NOISY_WORKER: &str = r#"
echo '{"status":"ready"}'
IFS= read -r line
id=$(printf '%s' "$line" | sed -n 's/.*"request_id":"\([^"]*\)".*/\1/p')
echo 'Reflection warning: something.clj'
echo '{"log":"still warming caches"}'
printf '{"request_id":"unknown_req","result":{}}\n'
printf '{"request_id":"%s","result":{"survived":true}}\n' "$id"
cat >/dev/null
"#;

    async fn start(script: &str) -> (RpcClient, Arc<ProcessSupervisor>, NamedTempFile) {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), script).unwrap();
        let config =
            BridgeConfig::new("/bin/sh").with_args([file.path().to_str().unwrap().to_string()]);
        let (supervisor, mut lines) = ProcessSupervisor::spawn(&config).unwrap();

        let ready = lines.recv().await.unwrap();
        assert!(matches!(
            InboundLine::parse(&ready).unwrap(),
            InboundLine::Ready
        ));

        let supervisor = Arc::new(supervisor);
        let client = RpcClient::new(supervisor.clone(), lines);
        (client, supervisor, file)
    }

    #[tokio::test]
    async fn test_call_returns_matching_result() {
        let (client, supervisor, _script) = start(ECHO_WORKER).await;

        let result = client
            .call("create-atom", json!({"element": "H"}), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result, json!({"id": "atom_1", "element": "H"}));
        assert_eq!(client.pending_count(), 0);

        supervisor.shutdown(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn test_timeout_reclaims_slot() {
        let (client, supervisor, _script) = start(SILENT_WORKER).await;

        let err = client
            .call("create-atom", json!({"element": "O"}), Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Timeout { .. }));
        assert_eq!(client.pending_count(), 0);

        supervisor.shutdown(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn test_late_response_is_discarded_silently() {
        let (client, supervisor, _script) = start(LATE_WORKER).await;

        let err = client
            .call("create-atom", json!({"element": "N"}), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Timeout { .. }));
        assert_eq!(client.pending_count(), 0);

        // The response arrives after the slot was reclaimed; the router
        // drops it and the client stays healthy.
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert!(client.is_available());
        assert_eq!(client.pending_count(), 0);

        supervisor.shutdown(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn test_out_of_order_responses_reach_their_callers() {
        let (client, supervisor, _script) = start(REORDER_WORKER).await;
        let client = Arc::new(client);

        let mut handles = Vec::new();
        for marker in ["alpha", "beta", "gamma"] {
            let client = client.clone();
            handles.push(tokio::spawn(async move {
                let result = client
                    .call("echo-marker", json!({"marker": marker}), Duration::from_secs(5))
                    .await
                    .unwrap();
                (marker, result)
            }));
        }

        for handle in handles {
            let (marker, result) = handle.await.unwrap();
            assert_eq!(result["marker"], marker);
        }
        assert_eq!(client.pending_count(), 0);

        supervisor.shutdown(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn test_worker_death_fails_pending_and_subsequent_calls() {
        let (client, _supervisor, _script) = start(DYING_WORKER).await;

        let first = client
            .call("health-check", json!({}), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(first, json!({"ok": true}));

        // The worker reads this request and exits without answering; the
        // router must fail the call well before its 5s deadline.
        let started = Instant::now();
        let err = client
            .call("health-check", json!({}), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::ProcessUnavailable));
        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(client.pending_count(), 0);

        // Dead worker: fail fast without registering anything.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let err = client
            .call("health-check", json!({}), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::ProcessUnavailable));
    }

    #[tokio::test]
    async fn test_noise_never_surfaces_as_result() {
        let (client, supervisor, _script) = start(NOISY_WORKER).await;

        let result = client
            .call("warmup", json!({}), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result, json!({"survived": true}));

        supervisor.shutdown(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn test_poison_fails_outstanding_calls() {
        let (client, supervisor, _script) = start(SILENT_WORKER).await;
        let client = Arc::new(client);

        let pending_client = client.clone();
        let pending = tokio::spawn(async move {
            pending_client
                .call("never-answered", json!({}), Duration::from_secs(30))
                .await
        });

        // Give the call time to register its waiter.
        tokio::time::sleep(Duration::from_millis(100)).await;
        client.poison();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, BridgeError::ProcessUnavailable));
        assert!(!client.is_available());

        supervisor.shutdown(Duration::from_secs(2)).await;
    }
}
