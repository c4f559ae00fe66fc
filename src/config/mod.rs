//! Configuration module for tactile-pad
//!
//! Holds the settings snapshot shared by every component and the helpers
//! that keep user-supplied values inside their supported ranges.

pub mod settings;

pub use settings::{ControlScheme, EdgeBehavior, GestureStyle, Settings, SettingsError};
