//! Recording host
//!
//! Implements both host capabilities by recording every call. Failures and
//! delays can be scripted so the test suites can drive error paths.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::gesture::backend::{
    BackendError, GestureDescription, PointerEvent, PointerInjector, StrokeDispatcher,
};
use crate::lock;

/// One recorded host call
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Dispatch(GestureDescription),
    CancelStroke,
    Inject(PointerEvent),
}

#[derive(Debug, Default)]
pub struct RecordingHost {
    calls: Mutex<Vec<HostCall>>,
    /// Every call fails while set
    failing: AtomicBool,
    /// Number of upcoming calls that fail
    fail_next: AtomicUsize,
    /// Simulated completion time of each call
    delay: Mutex<Duration>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes the next `count` calls fail
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = delay;
    }

    pub fn calls(&self) -> Vec<HostCall> {
        lock(&self.calls).clone()
    }

    /// Gestures passed to `dispatch`, in order
    pub fn dispatched(&self) -> Vec<GestureDescription> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                HostCall::Dispatch(gesture) => Some(gesture.clone()),
                _ => None,
            })
            .collect()
    }

    /// Pointer events passed to `inject`, in order
    pub fn injected(&self) -> Vec<PointerEvent> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                HostCall::Inject(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, call: HostCall) -> Result<(), BackendError> {
        let delay = *lock(&self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        lock(&self.calls).push(call);

        let scheduled_failure = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if self.failing.load(Ordering::SeqCst) || scheduled_failure {
            return Err(BackendError::Rejected("recording host failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StrokeDispatcher for RecordingHost {
    async fn dispatch(&self, gesture: GestureDescription) -> Result<(), BackendError> {
        self.record(HostCall::Dispatch(gesture)).await
    }

    async fn cancel(&self) -> Result<(), BackendError> {
        self.record(HostCall::CancelStroke).await
    }
}

#[async_trait]
impl PointerInjector for RecordingHost {
    async fn inject(&self, event: PointerEvent) -> Result<(), BackendError> {
        self.record(HostCall::Inject(event)).await
    }
}
