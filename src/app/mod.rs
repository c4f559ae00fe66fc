//! Application orchestration layer
//!
//! Mode exclusivity, the grid and cursor state owners, and the controller
//! that wires them to the gesture layer and the key handlers, plus the key
//! script replay used by the CLI.

pub mod controller;
pub mod cursor_state;
pub mod grid_state;
pub mod mode;
pub mod script;

pub use controller::{HostCapabilities, InputController};
pub use mode::{Activation, ModeCoordinator, OverlayMode};
pub use script::{ReplaySummary, ScriptError, ScriptStep, parse_script, replay};
