//! Key-event state machines
//!
//! The action handlers turn raw key events into navigator, state manager and
//! gesture manager calls. Activation-key holds and continuous actions are
//! tracked here as well.

use thiserror::Error;

use crate::config::Settings;
use crate::domain::core::Rotation;
use crate::domain::keyboard::{Key, remap_for_rotation};

pub mod activation;
pub mod cursor_handler;
pub mod grid_handler;
pub mod repeat;

pub use cursor_handler::CursorActionHandler;
pub use grid_handler::GridActionHandler;

/// Errors raised while processing a key event
///
/// Any of them cancels the handler's loops and tap session, and the event
/// is reported as not consumed.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Gesture backend refused the {0}")]
    GestureRejected(&'static str),
}

/// Applies the screen rotation to directional and keypad keys when enabled
pub(crate) fn oriented_key(key: Key, rotation: Rotation, settings: &Settings) -> Key {
    if settings.rotate_with_screen {
        remap_for_rotation(key, rotation)
    } else {
        key
    }
}
