use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{Duration, Instant};

use crate::protocol::{RoomId, Uid};

/// Which per-room timer a key refers to. At most one timer exists per
/// `(room_id, phase)` at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    Turn,
    Steal,
}

impl std::fmt::Display for TimerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Turn => f.write_str("turn"),
            Self::Steal => f.write_str("steal"),
        }
    }
}

/// Snapshot of the state the timer was armed against. A fired callback
/// revalidates this against freshly-read room state before acting; the
/// in-map copy only fences out superseded generations.
#[derive(Debug, Clone)]
pub struct TimerContext {
    pub room_id: RoomId,
    pub phase: TimerPhase,
    pub question_id: String,
    pub expected_uid: Uid,
}

struct ArmedTimer {
    generation: u64,
    deadline: Instant,
    abort: tokio::task::AbortHandle,
}

struct SchedulerInner {
    timers: DashMap<(RoomId, TimerPhase), ArmedTimer>,
    generations: AtomicU64,
}

/// Per-room, per-phase one-shot timers with stale fencing.
///
/// Arming cancels any prior timer at the same key. Cancellation is
/// best-effort: an already-running callback may lose the abort race, so the
/// fired task first removes its own map entry and only proceeds when its
/// generation is still the current one. Anything else is a stale timer and
/// is dropped silently.
#[derive(Clone)]
pub struct TimerScheduler {
    inner: Arc<SchedulerInner>,
}

impl TimerScheduler {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                timers: DashMap::new(),
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Arm a one-shot timer. When it expires (and has not been superseded or
    /// cancelled), `fire` runs with the context captured here.
    pub fn arm<F, Fut>(&self, context: TimerContext, duration: Duration, fire: F)
    where
        F: FnOnce(TimerContext) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let key = (context.room_id, context.phase);
        let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed);
        let deadline = Instant::now() + duration;

        let inner = Arc::clone(&self.inner);
        let task_context = context.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;

            // Claim our own entry first. If a newer timer took the key (or
            // cancel won the race), this callback is stale and must not run.
            // remove_if holds the shard lock across the generation check, so
            // a concurrent re-arm can never lose its fresh entry here.
            let claimed = inner
                .timers
                .remove_if(&key, |_, entry| entry.generation == generation)
                .is_some();

            if !claimed {
                tracing::debug!(
                    room_id = %task_context.room_id,
                    phase = %task_context.phase,
                    "Stale timer callback dropped before firing"
                );
                return;
            }

            fire(task_context).await;
        });

        let previous = self.inner.timers.insert(
            key,
            ArmedTimer {
                generation,
                deadline,
                abort: handle.abort_handle(),
            },
        );
        if let Some(previous) = previous {
            previous.abort.abort();
        }
    }

    /// Cancel the timer at `(room_id, phase)`, if any.
    pub fn cancel(&self, room_id: &RoomId, phase: TimerPhase) {
        if let Some((_, entry)) = self.inner.timers.remove(&(*room_id, phase)) {
            entry.abort.abort();
        }
    }

    /// Cancel both phase timers for a room.
    pub fn cancel_all(&self, room_id: &RoomId) {
        self.cancel(room_id, TimerPhase::Turn);
        self.cancel(room_id, TimerPhase::Steal);
    }

    /// Seconds until the armed timer at the key expires, if one exists.
    /// Used to tell rejoining clients how much of the phase remains.
    pub fn remaining_secs(&self, room_id: &RoomId, phase: TimerPhase) -> Option<u32> {
        self.inner.timers.get(&(*room_id, phase)).map(|entry| {
            entry
                .deadline
                .saturating_duration_since(Instant::now())
                .as_secs() as u32
        })
    }

    /// Whether a timer is currently armed at the key.
    pub fn is_armed(&self, room_id: &RoomId, phase: TimerPhase) -> bool {
        self.inner.timers.contains_key(&(*room_id, phase))
    }
}

impl Default for TimerScheduler {
    fn default() -> Self {
        Self::new()
    }
}
