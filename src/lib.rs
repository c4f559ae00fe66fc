//! tactile-pad
//!
//! Drives a touchscreen from a remote control, D-pad or numeric keypad.
//! Key events are translated into synthesized pointer gestures through two
//! mutually exclusive navigation modes: a recursive 3x3 grid and a freely
//! movable cursor.

use std::sync::{Mutex, MutexGuard};

pub mod app;
pub mod config;
pub mod domain;
pub mod gesture;
pub mod input;
pub mod platform;

/// Locks `mutex`, recovering the data if a panicking thread poisoned it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
