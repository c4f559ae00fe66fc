//! Cancellable repeat loops
//!
//! Continuous actions (movement frames, scroll auto-repeat, edge scrolling)
//! run as tasks keyed by a token. Each token occupies a slot, and starting
//! a loop stops the one already holding its slot. A stopped loop finishes the step it is executing
//! and exits at its next sleep, so a gesture is never cut in half.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::domain::core::{Axis, Direction};
use crate::lock;

/// Cancellation signal handed to a running loop
pub struct LoopToken {
    cancelled: watch::Receiver<bool>,
}

impl LoopToken {
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Sleeps for `duration` unless cancelled first
    ///
    /// # Returns
    /// `true` if the loop should continue
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        let cancelled = &mut self.cancelled;
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = cancelled.wait_for(|stop| *stop) => return false,
        }
        !self.is_cancelled()
    }
}

/// Identifies a loop and the slot it occupies
///
/// Loops sharing a slot exclude each other: starting one stops whichever
/// loop held the slot, so two loops never race on the same axis.
pub trait LoopKey: Copy + Eq + Debug {
    type Slot: Copy + Eq + Hash + Debug;

    fn slot(&self) -> Self::Slot;
}

impl LoopKey for Direction {
    type Slot = Axis;

    fn slot(&self) -> Axis {
        self.axis()
    }
}

struct RunningLoop<K> {
    key: K,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl<K> RunningLoop<K> {
    fn cancel(&self) {
        self.stop.send_replace(true);
    }

    fn is_live(&self) -> bool {
        !self.task.is_finished() && !*self.stop.borrow()
    }
}

/// Loops of one handler, at most one per slot
pub struct LoopSet<K: LoopKey> {
    runtime: Handle,
    loops: Mutex<HashMap<K::Slot, RunningLoop<K>>>,
}

impl<K: LoopKey> LoopSet<K> {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            loops: Mutex::new(HashMap::new()),
        }
    }

    /// Starts the loop built by `make` under `key`
    ///
    /// The loop occupying the same slot is cancelled before the new one is
    /// spawned; both happen under the set's lock.
    pub fn start<F, Fut>(&self, key: K, make: F)
    where
        F: FnOnce(LoopToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut loops = lock(&self.loops);
        loops.retain(|_, running| !running.task.is_finished());
        if let Some(previous) = loops.remove(&key.slot()) {
            previous.cancel();
            debug!(key = ?previous.key, replaced_by = ?key, "loop replaced");
        }

        let (stop, cancelled) = watch::channel(false);
        let task = self.runtime.spawn(make(LoopToken { cancelled }));
        loops.insert(key.slot(), RunningLoop { key, stop, task });
        debug!(?key, "loop started");
    }

    /// Stops the loop started under `key`; false if that loop is not the
    /// one holding its slot
    pub fn stop(&self, key: &K) -> bool {
        let mut loops = lock(&self.loops);
        if loops.get(&key.slot()).is_none_or(|running| running.key != *key) {
            return false;
        }
        match loops.remove(&key.slot()) {
            Some(running) => {
                running.cancel();
                debug!(?key, "loop stopped");
                !running.task.is_finished()
            }
            None => false,
        }
    }

    pub fn stop_all(&self) {
        let stopped: Vec<_> = lock(&self.loops).drain().collect();
        for (_, running) in stopped {
            running.cancel();
            debug!(key = ?running.key, "loop stopped");
        }
    }

    pub fn is_running(&self, key: &K) -> bool {
        lock(&self.loops)
            .get(&key.slot())
            .is_some_and(|running| running.key == *key && running.is_live())
    }

    /// Keys with a live loop
    pub fn running(&self) -> Vec<K> {
        lock(&self.loops)
            .values()
            .filter(|running| running.is_live())
            .map(|running| running.key)
            .collect()
    }
}

impl<K: LoopKey> Drop for LoopSet<K> {
    fn drop(&mut self) {
        for running in lock(&self.loops).values() {
            running.cancel();
        }
    }
}

/// Runs `action` now, again after `first_delay`, then every `period()`
///
/// Delays count from the start of the previous action. The loop ends when
/// the token is cancelled or `action` reports failure.
pub async fn repeat_until_cancelled<F, Fut, P>(
    mut token: LoopToken,
    first_delay: Duration,
    period: P,
    mut action: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
    P: Fn() -> Duration,
{
    let mut delay = first_delay;
    loop {
        if token.is_cancelled() {
            return;
        }
        let started = Instant::now();
        if !action().await {
            return;
        }
        if !token.sleep(delay.saturating_sub(started.elapsed())).await {
            return;
        }
        delay = period();
    }
}
