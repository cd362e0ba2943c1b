//! Error types for the kernel bridge and the society scheduler.
//!
//! Transport-level noise (unparseable lines, unmatched responses) is absorbed
//! and logged where it occurs. Request-level failures are returned to the one
//! caller they concern. Process-level failures abort bridge initialisation.

use thiserror::Error;

/// Errors surfaced by the kernel bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The worker executable could not be located or launched.
    #[error("failed to spawn worker process: {message}")]
    Spawn { message: String },

    /// The worker never emitted its readiness line within the startup window.
    #[error("worker did not signal ready within {waited_secs}s")]
    StartupTimeout { waited_secs: u64 },

    /// A write to the worker's stdin failed.
    #[error("worker I/O error: {message}")]
    Io { message: String },

    /// A call exceeded its deadline. The correlation slot has been reclaimed.
    #[error("request {request_id} timed out after {waited_ms}ms")]
    Timeout { request_id: String, waited_ms: u64 },

    /// The worker process has exited. All pending and subsequent calls fail
    /// with this kind until the bridge is restarted.
    #[error("worker process is not available")]
    ProcessUnavailable,

    /// The worker answered the request with its own error description.
    #[error("worker reported error: {message}")]
    Kernel { message: String },

    /// A protocol line could not be decoded. Absorbed at the router; never
    /// returned from a call.
    #[error("malformed protocol line: {line}")]
    Malformed { line: String },
}

impl BridgeError {
    /// Whether the error is fatal to bridge initialisation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::Spawn { .. } | BridgeError::StartupTimeout { .. }
        )
    }
}

/// A single agent's failure within one scheduler cycle.
///
/// Recorded in the cycle report; never aborts other agents or the loop.
#[derive(Debug, Clone)]
pub struct AgentFailure {
    /// Id of the failing agent.
    pub agent_id: String,
    /// Human-readable failure description.
    pub message: String,
}

impl std::fmt::Display for AgentFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "agent {}: {}", self.agent_id, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(BridgeError::Spawn {
            message: "no such file".into()
        }
        .is_fatal());
        assert!(BridgeError::StartupTimeout { waited_secs: 30 }.is_fatal());
        assert!(!BridgeError::ProcessUnavailable.is_fatal());
        assert!(!BridgeError::Timeout {
            request_id: "req_1".into(),
            waited_ms: 2000
        }
        .is_fatal());
    }

    #[test]
    fn test_display_messages() {
        let err = BridgeError::Kernel {
            message: "unknown command".into(),
        };
        assert_eq!(err.to_string(), "worker reported error: unknown command");

        let failure = AgentFailure {
            agent_id: "chemist_001".into(),
            message: "act failed".into(),
        };
        assert_eq!(failure.to_string(), "agent chemist_001: act failed");
    }
}
