//! Overlay mode exclusivity
//!
//! At most one of the grid and the free cursor is active at a time.

use std::sync::Mutex;

use tracing::{debug, info};

use crate::lock;

/// Which overlay currently owns the keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayMode {
    #[default]
    None,
    Grid,
    Cursor,
}

/// Outcome of a mode request, decided under a single lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Granted,
    ToggledOff,
    Refused { active: OverlayMode },
}

#[derive(Debug, Default)]
pub struct ModeCoordinator {
    active: Mutex<OverlayMode>,
}

impl ModeCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests `mode`
    ///
    /// # Returns
    /// * `true` when the mode was granted, or when it was already active and
    ///   has been toggled off
    /// * `false` when a different mode is active; nothing changes
    pub fn request_activation(&self, mode: OverlayMode) -> bool {
        !matches!(self.request(mode), Activation::Refused { .. })
    }

    /// Requests `mode` and reports what happened to it
    pub fn request(&self, mode: OverlayMode) -> Activation {
        let mut active = lock(&self.active);
        match *active {
            OverlayMode::None => {
                info!(?mode, "overlay mode activated");
                *active = mode;
                Activation::Granted
            }
            current if current == mode => {
                info!(?mode, "overlay mode toggled off");
                *active = OverlayMode::None;
                Activation::ToggledOff
            }
            current => {
                debug!(requested = ?mode, ?current, "overlay mode request refused");
                Activation::Refused { active: current }
            }
        }
    }

    /// Clears the active mode, but only if it is `mode`
    pub fn deactivate(&self, mode: OverlayMode) {
        let mut active = lock(&self.active);
        if *active == mode && mode != OverlayMode::None {
            info!(?mode, "overlay mode deactivated");
            *active = OverlayMode::None;
        }
    }

    pub fn active(&self) -> OverlayMode {
        *lock(&self.active)
    }

    pub fn is_active(&self, mode: OverlayMode) -> bool {
        self.active() == mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_when_idle() {
        let coordinator = ModeCoordinator::new();
        assert!(coordinator.request_activation(OverlayMode::Grid));
        assert_eq!(coordinator.active(), OverlayMode::Grid);
    }

    #[test]
    fn conflicting_mode_is_refused() {
        let coordinator = ModeCoordinator::new();
        assert!(coordinator.request_activation(OverlayMode::Grid));
        assert!(!coordinator.request_activation(OverlayMode::Cursor));
        assert_eq!(coordinator.active(), OverlayMode::Grid);
    }

    #[test]
    fn conflicting_mode_stays_refused_until_released() {
        let coordinator = ModeCoordinator::new();
        assert!(coordinator.request_activation(OverlayMode::Grid));
        for _ in 0..2 {
            assert_eq!(
                coordinator.request(OverlayMode::Cursor),
                Activation::Refused {
                    active: OverlayMode::Grid
                }
            );
        }
        assert!(!coordinator.request_activation(OverlayMode::Cursor));
        assert_eq!(coordinator.active(), OverlayMode::Grid);

        coordinator.deactivate(OverlayMode::Grid);
        assert_eq!(coordinator.request(OverlayMode::Cursor), Activation::Granted);
    }

    #[test]
    fn same_mode_toggles_off() {
        let coordinator = ModeCoordinator::new();
        assert!(coordinator.request_activation(OverlayMode::Cursor));
        assert_eq!(coordinator.request(OverlayMode::Cursor), Activation::ToggledOff);
        assert_eq!(coordinator.active(), OverlayMode::None);
        assert!(coordinator.request_activation(OverlayMode::Grid));
    }

    #[test]
    fn deactivate_only_clears_matching_mode() {
        let coordinator = ModeCoordinator::new();
        coordinator.request_activation(OverlayMode::Grid);
        coordinator.deactivate(OverlayMode::Cursor);
        assert!(coordinator.is_active(OverlayMode::Grid));
        coordinator.deactivate(OverlayMode::Grid);
        assert!(coordinator.is_active(OverlayMode::None));
    }
}
