use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::cursor::CursorPhysics;
use crate::domain::core::ScreenDimensions;
use crate::domain::keyboard::{VK_DIVIDE, VK_MULTIPLY};

/// How directional and keypad keys are split between moving and scrolling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlScheme {
    /// Arrows move the cursor, keypad 2/4/6/8 scroll
    #[default]
    Standard,
    /// Arrows scroll, keypad 2/4/6/8 move the cursor
    Swapped,
    /// Arrows move or scroll depending on the scroll-mode toggle
    ToggleMoveScroll,
    /// Keypad 2/4/6/8 move or scroll depending on the toggle; arrows pass through
    ToggleNumpad,
}

impl ControlScheme {
    pub fn is_toggle(&self) -> bool {
        matches!(self, ControlScheme::ToggleMoveScroll | ControlScheme::ToggleNumpad)
    }
}

/// How a synthetic swipe ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureStyle {
    /// Finger rests at the end point before lifting, content stops where it is
    #[default]
    Fixed,
    /// Finger lifts while moving, content keeps flinging
    Inertia,
}

/// What happens when the free cursor reaches a screen edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeBehavior {
    #[default]
    None,
    Wrap,
    AutoScroll,
}

/// Read-only settings snapshot consumed by the engine
///
/// A snapshot is taken at each decision point, so a change applies from
/// the next key event on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub grid_levels: u8,
    pub overlay_opacity: f32,
    pub persist_overlay: bool,
    pub cursor_speed: u8,
    pub acceleration: u8,
    pub acceleration_threshold_ms: u64,
    pub cursor_size: u8,
    /// `None` disables grid activation
    pub grid_activation_key: Option<u32>,
    /// `None` disables cursor activation
    pub cursor_activation_key: Option<u32>,
    pub control_scheme: ControlScheme,
    pub wrap_around: bool,
    pub gesture_style: GestureStyle,
    pub gesture_duration_ms: u64,
    pub scroll_multiplier: f32,
    pub natural_scrolling: bool,
    /// Keys an overlay does not use reach the focused app
    pub passthrough: bool,
    pub privileged_enabled: bool,
    pub edge_behavior: EdgeBehavior,
    /// Rotate arrow and keypad semantics with the screen
    pub rotate_with_screen: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            grid_levels: 3,
            overlay_opacity: 0.6,
            persist_overlay: false,
            cursor_speed: 3,
            acceleration: 3,
            acceleration_threshold_ms: 300,
            cursor_size: 3,
            grid_activation_key: Some(VK_MULTIPLY),
            cursor_activation_key: Some(VK_DIVIDE),
            control_scheme: ControlScheme::Standard,
            wrap_around: false,
            gesture_style: GestureStyle::Fixed,
            gesture_duration_ms: 300,
            scroll_multiplier: 0.5,
            natural_scrolling: false,
            passthrough: true,
            privileged_enabled: false,
            edge_behavior: EdgeBehavior::None,
            rotate_with_screen: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid settings document: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Settings {
    pub const MIN_GRID_LEVELS: u8 = 2;
    pub const MAX_GRID_LEVELS: u8 = 4;
    pub const MIN_LEVEL: u8 = 1;
    pub const MAX_LEVEL: u8 = 5;
    pub const MIN_ACCELERATION_THRESHOLD_MS: u64 = 100;
    pub const MAX_ACCELERATION_THRESHOLD_MS: u64 = 500;
    pub const MIN_GESTURE_DURATION_MS: u64 = 100;
    pub const MAX_GESTURE_DURATION_MS: u64 = 500;
    pub const MIN_SCROLL_MULTIPLIER: f32 = 0.3;
    pub const MAX_SCROLL_MULTIPLIER: f32 = 0.7;

    /// Parses a TOML document; missing fields keep their defaults
    pub fn from_toml_str(document: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(document)?;
        Ok(settings.sanitized())
    }

    /// Loads and sanitises a TOML settings file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let document = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&document)
    }

    /// Returns a copy with every numeric field clamped into its range
    pub fn sanitized(&self) -> Self {
        let opacity = if self.overlay_opacity.is_finite() {
            self.overlay_opacity.clamp(0.0, 1.0)
        } else {
            Self::default().overlay_opacity
        };
        let scroll_multiplier = if self.scroll_multiplier.is_finite() {
            self.scroll_multiplier
                .clamp(Self::MIN_SCROLL_MULTIPLIER, Self::MAX_SCROLL_MULTIPLIER)
        } else {
            Self::default().scroll_multiplier
        };

        Self {
            grid_levels: self
                .grid_levels
                .clamp(Self::MIN_GRID_LEVELS, Self::MAX_GRID_LEVELS),
            overlay_opacity: opacity,
            cursor_speed: Self::sanitize_level(self.cursor_speed),
            acceleration: Self::sanitize_level(self.acceleration),
            acceleration_threshold_ms: self.acceleration_threshold_ms.clamp(
                Self::MIN_ACCELERATION_THRESHOLD_MS,
                Self::MAX_ACCELERATION_THRESHOLD_MS,
            ),
            cursor_size: Self::sanitize_level(self.cursor_size),
            gesture_duration_ms: self
                .gesture_duration_ms
                .clamp(Self::MIN_GESTURE_DURATION_MS, Self::MAX_GESTURE_DURATION_MS),
            scroll_multiplier,
            ..self.clone()
        }
    }

    pub fn sanitize_level(value: u8) -> u8 {
        value.clamp(Self::MIN_LEVEL, Self::MAX_LEVEL)
    }

    pub fn gesture_duration(&self) -> Duration {
        Duration::from_millis(self.gesture_duration_ms)
    }

    /// Wrap-around applies with either the flag or the wrap edge behaviour
    pub fn wraps_at_edges(&self) -> bool {
        self.wrap_around || self.edge_behavior == EdgeBehavior::Wrap
    }

    /// Speed curve for the given screen
    pub fn cursor_physics(&self, screen: ScreenDimensions) -> CursorPhysics {
        CursorPhysics {
            speed: self.cursor_speed,
            acceleration: self.acceleration,
            acceleration_threshold_ms: self.acceleration_threshold_ms,
            screen,
        }
    }
}
