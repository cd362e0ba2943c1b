//! Supervision of the symbolic worker child process.
//!
//! The supervisor exclusively owns the child handle and its standard streams.
//! Three background tasks run for the lifetime of the bridge, independent of
//! scheduler cycles:
//!
//! - a **reader** task forwarding newline-delimited stdout into a channel and
//!   clearing the alive flag on EOF,
//! - a **stderr** task draining diagnostics into the log (never parsed as
//!   protocol),
//! - a **writer** task that is the single consumer of the outbound queue, so
//!   concurrent callers can never interleave partial lines on stdin.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;

use crate::config::BridgeConfig;
use crate::error::BridgeError;

/// Capacity of the inbound line channel between the reader task and the
/// RPC router.
const LINE_CHANNEL_CAPACITY: usize = 256;

/// Owns one worker subprocess and mediates all access to its streams.
#[derive(Debug)]
pub struct ProcessSupervisor {
    command: String,
    args: Vec<String>,
    child: tokio::sync::Mutex<Option<Child>>,
    stdin_tx: parking_lot::Mutex<Option<mpsc::UnboundedSender<String>>>,
    alive: Arc<AtomicBool>,
}

impl ProcessSupervisor {
    /// Spawn the worker described by `config`.
    ///
    /// Returns the supervisor and the receiving end of the stdout line
    /// stream. The first line on that stream is expected to be the worker's
    /// readiness signal; the handshake itself belongs to the layer above.
    pub fn spawn(config: &BridgeConfig) -> Result<(Self, mpsc::Receiver<String>), BridgeError> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| BridgeError::Spawn {
            message: format!("'{}': {e}", config.command),
        })?;

        let stdout = child.stdout.take().ok_or_else(|| BridgeError::Spawn {
            message: "worker stdout was not captured".into(),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| BridgeError::Spawn {
            message: "worker stderr was not captured".into(),
        })?;
        let stdin = child.stdin.take().ok_or_else(|| BridgeError::Spawn {
            message: "worker stdin was not captured".into(),
        })?;

        let alive = Arc::new(AtomicBool::new(true));
        let (line_tx, line_rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);

        let reader_alive = alive.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line_tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        log::warn!("worker stdout read error: {e}");
                        break;
                    }
                }
            }
            reader_alive.store(false, Ordering::SeqCst);
            log::debug!("worker stdout closed");
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                log::warn!("[worker] {line}");
            }
        });

        let (stdin_tx, stdin_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(write_loop(stdin, stdin_rx));

        log::info!(
            "spawned worker process: {} {}",
            config.command,
            config.args.join(" ")
        );

        Ok((
            Self {
                command: config.command.clone(),
                args: config.args.clone(),
                child: tokio::sync::Mutex::new(Some(child)),
                stdin_tx: parking_lot::Mutex::new(Some(stdin_tx)),
                alive,
            },
            line_rx,
        ))
    }

    /// Queue one line (terminator added by the writer task) for the worker's
    /// stdin.
    pub fn write_line(&self, line: String) -> Result<(), BridgeError> {
        let guard = self.stdin_tx.lock();
        let tx = guard.as_ref().ok_or_else(|| BridgeError::Io {
            message: "worker stdin is closed".into(),
        })?;
        tx.send(line).map_err(|_| BridgeError::Io {
            message: "worker stdin is closed".into(),
        })
    }

    /// Whether the worker process is still running, as observed by the
    /// reader task.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Identifier for log lines.
    pub fn identifier(&self) -> String {
        format!("{} {}", self.command, self.args.join(" ")).trim_end().to_string()
    }

    /// Request graceful termination, forcing a kill after `grace`.
    ///
    /// Closing stdin is the termination request; a well-behaved worker exits
    /// on EOF. Calling twice is safe.
    pub async fn shutdown(&self, grace: Duration) {
        // Dropping the sender ends the writer task, which drops stdin.
        self.stdin_tx.lock().take();
        self.alive.store(false, Ordering::SeqCst);

        let mut slot = self.child.lock().await;
        let Some(mut child) = slot.take() else {
            return;
        };

        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                log::info!("worker {} exited: {status}", self.identifier());
            }
            Ok(Err(e)) => {
                log::warn!("worker {} wait failed: {e}", self.identifier());
            }
            Err(_) => {
                log::warn!(
                    "worker {} did not exit within {:?}, killing",
                    self.identifier(),
                    grace
                );
                if let Err(e) = child.kill().await {
                    log::warn!("failed to kill worker: {e}");
                }
            }
        }
    }
}

async fn write_loop(mut stdin: ChildStdin, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = rx.recv().await {
        let write = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        };
        if let Err(e) = write.await {
            log::warn!("worker stdin write failed: {e}");
            break;
        }
    }
    // Receiver loop ends when the supervisor drops the sender; stdin drops
    // here and the worker sees EOF.
}
