//! The most recently captured label and when it was captured.
//!
//! A capture (pressing the capture key while looking at a chat window, say)
//! and the arrival of a download are two unrelated signals. [`ContextStore`]
//! bridges them: captures [`set`](ContextStore::set) the label, every
//! incoming file [`get`](ContextStore::get)s it, and the TTL bounds how stale
//! a label may be when it is applied.

use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use time::{OffsetDateTime, UtcOffset};

/// Source of "now".
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

pub type ClockHandle = Arc<dyn Clock>;

/// Wall clock, reported in the local offset detected at construction.
///
/// The offset has to be captured before any other thread is spawned, since
/// reading it later is unsound on some platforms and `time` refuses to.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: UtcOffset,
}
impl SystemClock {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    /// Uses the current local offset, or UTC if it cannot be determined.
    pub fn local() -> Self {
        Self::new(UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC))
    }
}
impl Default for SystemClock {
    fn default() -> Self {
        Self::new(UtcOffset::UTC)
    }
}
impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}
impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn set(&self, now: OffsetDateTime) {
        *lock(&self.now) = now;
    }

    pub fn advance(&self, by: Duration) {
        *lock(&self.now) += by;
    }
}
impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *lock(&self.now)
    }
}

/// A label and the moment it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    pub label: String,
    pub captured_at: OffsetDateTime,
}

#[derive(Debug)]
struct Captured {
    label: String,
    at: OffsetDateTime,
}

/// Concurrency-safe holder of the latest capture.
///
/// The lock is only ever held for the duration of a single read or write.
#[derive(Debug)]
pub struct ContextStore {
    clock: ClockHandle,
    fallback: String,
    current: Mutex<Option<Captured>>,
}
impl ContextStore {
    pub fn new(clock: ClockHandle, fallback: impl Into<String>) -> Self {
        Self {
            clock,
            fallback: fallback.into(),
            current: Mutex::new(None),
        }
    }

    /// Records `label` as captured now, replacing the previous capture.
    ///
    /// Capture times never go backwards: if the clock reports a time earlier
    /// than the stored one, the stored time is kept.
    pub fn set(&self, label: impl Into<String>) {
        let label = label.into();
        let now = self.clock.now();
        let mut current = lock(&self.current);
        let at = match current.as_ref() {
            Some(previous) if previous.at > now => previous.at,
            _ => now,
        };
        tracing::debug!(label = %label, "Context captured");
        *current = Some(Captured { label, at });
    }

    /// Returns the stored label if it was captured no more than `ttl` ago.
    ///
    /// Otherwise (including when nothing was ever captured) returns the
    /// fallback label stamped with the current time.
    pub fn get(&self, ttl: Duration) -> Context {
        let now = self.clock.now();
        let current = lock(&self.current);
        match current.as_ref() {
            Some(captured) if (now - captured.at).whole_nanoseconds() <= ttl.as_nanos() as i128 => Context {
                label: captured.label.clone(),
                captured_at: captured.at,
            },
            _ => Context {
                label: self.fallback.clone(),
                captured_at: now,
            },
        }
    }
}

/// A panic while holding one of these locks cannot leave the value half
/// written, so poisoning is ignored.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
