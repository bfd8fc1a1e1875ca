//! Detecting files that are still being written.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tagdrop_config::ReadinessConfig;
use tokio::time::Instant;

/// Decides whether a file is safe to move.
///
/// Implementations may take a while but must only ever hold up the caller.
#[async_trait]
pub trait Readiness: Send + Sync {
    async fn is_ready(&self, path: &Path) -> bool;
}

/// Polls a file's size until it stops changing.
///
/// A file is ready once its size has been non-zero and unchanged across
/// `stable_polls` consecutive comparisons and it can be opened for reading.
/// Any error along the way (the file briefly disappearing, a sharing
/// violation while a browser still holds it) resets the count. The probe
/// gives up and reports "not ready" once `timeout` has elapsed.
#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    interval: Duration,
    timeout: Duration,
    stable_polls: u32,
}
impl ReadinessProbe {
    pub fn new(interval: Duration, timeout: Duration, stable_polls: u32) -> Self {
        Self {
            interval,
            timeout,
            stable_polls: stable_polls.max(1),
        }
    }

    pub fn from_config(config: &ReadinessConfig) -> Self {
        Self::new(config.interval(), config.timeout(), config.stable_polls)
    }
}
impl Default for ReadinessProbe {
    fn default() -> Self {
        Self::from_config(&ReadinessConfig::default())
    }
}

#[async_trait]
impl Readiness for ReadinessProbe {
    #[tracing::instrument(level = "debug", skip_all, fields(path = %path.display()))]
    async fn is_ready(&self, path: &Path) -> bool {
        // No deadline when the timeout is too large to represent.
        let deadline = Instant::now().checked_add(self.timeout);
        let mut previous: Option<u64> = None;
        let mut stable = 0;
        loop {
            match tokio::fs::metadata(path).await {
                Ok(metadata) if metadata.is_file() => {
                    let size = metadata.len();
                    if size > 0 && previous == Some(size) {
                        stable += 1;
                    } else {
                        stable = 0;
                    }
                    previous = Some(size);
                    if stable >= self.stable_polls {
                        match tokio::fs::File::open(path).await {
                            Ok(_) => return true,
                            Err(e) => {
                                tracing::trace!(error = %e, "Settled but cannot be opened yet");
                                stable = 0;
                            },
                        }
                    }
                },
                Ok(_) => return false,
                Err(e) => {
                    tracing::trace!(error = %e, "Could not read metadata");
                    previous = None;
                    stable = 0;
                },
            }
            if next_poll_too_late(Instant::now(), self.interval, deadline) {
                tracing::debug!(timeout = ?self.timeout, "File did not settle in time");
                return false;
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

fn next_poll_too_late(now: Instant, interval: Duration, deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| now.checked_add(interval).is_none_or(|next| next > deadline))
}
