//! Free cursor state management

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::debug;

use crate::app::mode::{ModeCoordinator, OverlayMode};
use crate::config::Settings;
use crate::domain::core::{DisplayInfo, Direction, Point};
use crate::domain::cursor::{CursorState, EdgeContact, apply_movement};
use crate::lock;

/// Called with the new cursor after every mutation; `None` means hidden
pub type CursorObserver = Arc<dyn Fn(Option<&CursorState>) + Send + Sync>;

/// Result of one movement step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorStep {
    pub from: Point,
    pub to: Point,
    pub edges: EdgeContact,
}

pub struct CursorStateManager {
    cursor: Mutex<Option<CursorState>>,
    settings: watch::Receiver<Settings>,
    display: watch::Receiver<DisplayInfo>,
    coordinator: Arc<ModeCoordinator>,
    observer: Mutex<Option<CursorObserver>>,
}

impl CursorStateManager {
    pub fn new(
        settings: watch::Receiver<Settings>,
        display: watch::Receiver<DisplayInfo>,
        coordinator: Arc<ModeCoordinator>,
    ) -> Self {
        Self {
            cursor: Mutex::new(None),
            settings,
            display,
            coordinator,
            observer: Mutex::new(None),
        }
    }

    pub fn set_observer(&self, observer: CursorObserver) {
        *lock(&self.observer) = Some(observer);
    }

    pub fn current(&self) -> Option<CursorState> {
        *lock(&self.cursor)
    }

    pub fn is_visible(&self) -> bool {
        lock(&self.cursor).is_some()
    }

    pub fn position(&self) -> Option<Point> {
        self.current().map(|cursor| cursor.position)
    }

    /// Replaces the state with `update` applied to it, then notifies
    fn mutate<F>(&self, update: F) -> Option<CursorState>
    where
        F: FnOnce(Option<CursorState>) -> Option<CursorState>,
    {
        let next = {
            let mut cursor = lock(&self.cursor);
            *cursor = update(*cursor);
            *cursor
        };
        let observer = lock(&self.observer).clone();
        if let Some(observer) = observer {
            observer(next.as_ref());
        }
        next
    }

    /// Shows the cursor at the screen center
    pub fn show_cursor(&self) {
        let screen = self.display.borrow().dimensions;
        self.mutate(|_| Some(CursorState::centered(screen)));
        debug!("cursor shown");
    }

    /// Hides the cursor and releases the cursor mode
    pub fn hide_cursor(&self) {
        self.mutate(|_| None);
        self.coordinator.deactivate(OverlayMode::Cursor);
        debug!("cursor hidden");
    }

    /// Moves a visible cursor back to the center of the current screen
    pub fn recenter(&self) {
        if !self.is_visible() {
            return;
        }
        let center = self.display.borrow().dimensions.center();
        self.mutate(|cursor| {
            cursor.map(|state| CursorState {
                position: center,
                ..state
            })
        });
    }

    /// Moves the cursor by a raw delta, wrapping or clamping at the edges
    ///
    /// Returns `None` while the cursor is hidden.
    pub fn apply_movement(&self, delta: (f32, f32)) -> Option<CursorStep> {
        let screen = self.display.borrow().dimensions;
        let wrap = self.settings.borrow().wraps_at_edges();

        let mut step = None;
        self.mutate(|cursor| {
            cursor.map(|state| {
                let (to, edges) = apply_movement(state.position, delta, screen, wrap);
                step = Some(CursorStep {
                    from: state.position,
                    to,
                    edges,
                });
                CursorState {
                    position: to,
                    ..state
                }
            })
        });
        step
    }

    /// One movement frame for the held `directions`
    pub fn step(&self, directions: &[Direction], time_held_ms: u64) -> Option<CursorStep> {
        let screen = self.display.borrow().dimensions;
        let delta = self
            .settings
            .borrow()
            .cursor_physics(screen)
            .combined_movement(directions, time_held_ms);
        self.apply_movement(delta)
    }

    /// Flips scroll mode
    ///
    /// Only under a toggle control scheme and while the cursor is visible.
    /// Entering scroll mode releases the hold.
    ///
    /// # Returns
    /// The new scroll mode, or `None` if the toggle does not apply
    pub fn toggle_scroll_mode(&self) -> Option<bool> {
        if !self.settings.borrow().control_scheme.is_toggle() || !self.is_visible() {
            return None;
        }
        let next = self.mutate(|cursor| {
            cursor.map(|state| {
                let in_scroll_mode = !state.in_scroll_mode;
                CursorState {
                    in_scroll_mode,
                    is_hold_active: state.is_hold_active && !in_scroll_mode,
                    ..state
                }
            })
        });
        let mode = next.map(|state| state.in_scroll_mode);
        debug!(scroll_mode = ?mode, "cursor scroll mode toggled");
        mode
    }

    /// Sets the sticky hold; entering hold leaves scroll mode
    pub fn update_hold_state(&self, active: bool) {
        self.mutate(|cursor| {
            cursor.map(|state| CursorState {
                is_hold_active: active,
                in_scroll_mode: state.in_scroll_mode && !active,
                ..state
            })
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControlScheme;
    use crate::domain::core::ScreenDimensions;

    fn manager(settings: Settings) -> (CursorStateManager, Arc<ModeCoordinator>) {
        let (_settings_tx, settings_rx) = watch::channel(settings);
        let (_display_tx, display_rx) = watch::channel(DisplayInfo::new(
            ScreenDimensions::new(1000, 500),
            Default::default(),
        ));
        let coordinator = Arc::new(ModeCoordinator::new());
        (
            CursorStateManager::new(settings_rx, display_rx, coordinator.clone()),
            coordinator,
        )
    }

    #[test]
    fn show_centers_and_hide_clears() {
        let (cursor, coordinator) = manager(Settings::default());
        coordinator.request_activation(OverlayMode::Cursor);
        cursor.show_cursor();
        assert_eq!(cursor.position(), Some(Point::new(500.0, 250.0)));

        cursor.hide_cursor();
        assert!(!cursor.is_visible());
        assert_eq!(coordinator.active(), OverlayMode::None);
    }

    #[test]
    fn movement_while_hidden_is_ignored() {
        let (cursor, _) = manager(Settings::default());
        assert_eq!(cursor.apply_movement((5.0, 5.0)), None);
    }

    #[test]
    fn clamps_and_reports_edge() {
        let (cursor, _) = manager(Settings::default());
        cursor.show_cursor();
        let step = cursor.apply_movement((600.0, 0.0)).unwrap();
        assert_eq!(step.to, Point::new(1000.0, 250.0));
        assert_eq!(step.edges.horizontal, Some(Direction::Right));
    }

    #[test]
    fn wraps_when_enabled() {
        let (cursor, _) = manager(Settings {
            wrap_around: true,
            ..Settings::default()
        });
        cursor.show_cursor();
        let step = cursor.apply_movement((600.0, 0.0)).unwrap();
        assert_eq!(step.to, Point::new(0.0, 250.0));
        assert!(step.edges.is_empty());
    }

    #[test]
    fn scroll_toggle_requires_toggle_scheme() {
        let (cursor, _) = manager(Settings::default());
        cursor.show_cursor();
        assert_eq!(cursor.toggle_scroll_mode(), None);

        let (cursor, _) = manager(Settings {
            control_scheme: ControlScheme::ToggleMoveScroll,
            ..Settings::default()
        });
        assert_eq!(cursor.toggle_scroll_mode(), None);
        cursor.show_cursor();
        assert_eq!(cursor.toggle_scroll_mode(), Some(true));
        assert_eq!(cursor.toggle_scroll_mode(), Some(false));
    }

    #[test]
    fn scroll_and_hold_exclude_each_other() {
        let (cursor, _) = manager(Settings {
            control_scheme: ControlScheme::ToggleNumpad,
            ..Settings::default()
        });
        cursor.show_cursor();
        cursor.update_hold_state(true);
        cursor.toggle_scroll_mode();
        let state = cursor.current().unwrap();
        assert!(state.in_scroll_mode && !state.is_hold_active);

        cursor.update_hold_state(true);
        let state = cursor.current().unwrap();
        assert!(!state.in_scroll_mode && state.is_hold_active);
    }

    #[test]
    fn diagonal_step_matches_single_axis() {
        let (cursor, _) = manager(Settings::default());
        cursor.show_cursor();
        let single = cursor.step(&[Direction::Right], 0).unwrap();
        cursor.recenter();
        let diagonal = cursor.step(&[Direction::Up, Direction::Right], 0).unwrap();

        let single_len = single.from.distance_to(single.to);
        let diagonal_len = diagonal.from.distance_to(diagonal.to);
        assert!((single_len - diagonal_len).abs() < 1e-3);
    }
}
