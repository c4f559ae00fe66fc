//! Activation-key hold detection
//!
//! A key-down arms a timer. Releasing before it fires is a short press;
//! still holding when it fires is a long press, which runs the activation
//! callback exactly once. The release that follows a long press is reported
//! separately so it never triggers anything on its own.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::debug;

use crate::lock;

/// How long the activation key must be held to toggle its overlay
pub const ACTIVATION_HOLD: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HoldState {
    Idle,
    Pending { generation: u64 },
    Activated,
}

/// What a key-up of the activation key means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Released before the hold elapsed
    ShortPress,
    /// Released after the long press already fired
    AfterActivation,
    /// No press was being tracked
    Untracked,
}

pub struct ActivationTracker {
    state: Arc<Mutex<HoldState>>,
    generation: Mutex<u64>,
}

impl Default for ActivationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivationTracker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HoldState::Idle)),
            generation: Mutex::new(0),
        }
    }

    /// Handles a key-down; `on_long_press` runs if the key is still held
    /// after [`ACTIVATION_HOLD`]
    ///
    /// # Returns
    /// `false` if a press is already being tracked (host auto-repeat)
    pub fn press<F>(&self, runtime: &Handle, on_long_press: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let generation = {
            let mut state = lock(&self.state);
            if *state != HoldState::Idle {
                return false;
            }
            let mut counter = lock(&self.generation);
            *counter += 1;
            *state = HoldState::Pending {
                generation: *counter,
            };
            *counter
        };

        let state = self.state.clone();
        runtime.spawn(async move {
            tokio::time::sleep(ACTIVATION_HOLD).await;
            {
                let mut current = lock(&state);
                if *current != (HoldState::Pending { generation }) {
                    return;
                }
                *current = HoldState::Activated;
            }
            debug!(generation, "activation key long press");
            on_long_press();
        });
        true
    }

    /// Handles the key-up
    pub fn release(&self) -> Release {
        let mut state = lock(&self.state);
        let previous = std::mem::replace(&mut *state, HoldState::Idle);
        match previous {
            HoldState::Pending { .. } => Release::ShortPress,
            HoldState::Activated => Release::AfterActivation,
            HoldState::Idle => Release::Untracked,
        }
    }

    /// Forgets any tracked press; a pending timer fires into nothing
    pub fn reset(&self) {
        *lock(&self.state) = HoldState::Idle;
    }

    pub fn is_pressed(&self) -> bool {
        *lock(&self.state) != HoldState::Idle
    }
}
