//! Liveness heartbeat.
//!
//! A background task touches a file on a fixed interval while the queue
//! transport answers a ping. External healthcheckers watch the file's
//! modification time; a stale file means the worker is down or cut off from
//! the queue.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::queue::Transport;

/// Periodic heartbeat emitter gated on transport health.
pub struct Heartbeat {
    transport: Transport,
    file: PathBuf,
    interval: Duration,
}

impl Heartbeat {
    pub fn new(transport: Transport, file: PathBuf, interval: Duration) -> Self {
        Self {
            transport,
            file,
            interval,
        }
    }

    /// Spawns the emitter as a background task.
    pub fn spawn(self, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => self.beat().await,
                }
            }
        })
    }

    async fn beat(&self) {
        if !self.transport.is_connected().await {
            warn!("queue transport is not connected, skipping heartbeat");
            return;
        }
        match touch(&self.file) {
            Ok(()) => debug!(file = %self.file.display(), "heartbeat emitted"),
            Err(e) => warn!(
                file = %self.file.display(),
                error = %e,
                "failed to touch heartbeat file"
            ),
        }
    }
}

/// Creates the file if missing and refreshes its modification time by
/// rewriting the current timestamp.
fn touch(path: &Path) -> io::Result<()> {
    std::fs::write(path, Utc::now().to_rfc3339())
}
