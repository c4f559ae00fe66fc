//! Input controller
//!
//! Wires the coordinator, both state managers, the gesture manager and both
//! action handlers together. Owns the settings and display feeds; every
//! other component only holds a receiver and reads a snapshot at each
//! decision point.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::info;

use crate::app::cursor_state::{CursorObserver, CursorStateManager};
use crate::app::grid_state::{GridObserver, GridStateManager};
use crate::app::mode::ModeCoordinator;
use crate::config::Settings;
use crate::domain::core::DisplayInfo;
use crate::domain::keyboard::KeyEvent;
use crate::gesture::{GestureManager, PrivilegedHost, StrokeDispatcher};
use crate::input::{CursorActionHandler, GridActionHandler};

/// Host capabilities the engine drives
pub struct HostCapabilities {
    /// OS gesture dispatch, always available
    pub dispatcher: Arc<dyn StrokeDispatcher>,
    /// Privileged pointer injection, when the host offers it
    pub privileged: Option<PrivilegedHost>,
}

pub struct InputController {
    settings: watch::Sender<Settings>,
    display: watch::Sender<DisplayInfo>,
    coordinator: Arc<ModeCoordinator>,
    grid: Arc<GridStateManager>,
    cursor: Arc<CursorStateManager>,
    gestures: Arc<GestureManager>,
    grid_handler: Arc<GridActionHandler>,
    cursor_handler: Arc<CursorActionHandler>,
}

impl InputController {
    /// Builds the engine on `runtime`
    ///
    /// # Arguments
    /// * `runtime` - Runtime that runs timers, loops and gestures
    /// * `settings` - Initial settings, sanitised before use
    /// * `screen` - Initial screen snapshot
    /// * `host` - Gesture capabilities of the host
    pub fn new(
        runtime: Handle,
        settings: Settings,
        screen: DisplayInfo,
        host: HostCapabilities,
    ) -> Self {
        let (settings_tx, settings_rx) = watch::channel(settings.sanitized());
        let (display_tx, display_rx) = watch::channel(screen);

        let coordinator = Arc::new(ModeCoordinator::new());
        let gestures = GestureManager::new(
            &runtime,
            settings_rx.clone(),
            display_rx.clone(),
            host.dispatcher,
            host.privileged,
        );
        let grid = Arc::new(GridStateManager::new(
            settings_rx.clone(),
            display_rx.clone(),
            gestures.clone(),
            coordinator.clone(),
        ));
        let cursor = Arc::new(CursorStateManager::new(
            settings_rx.clone(),
            display_rx.clone(),
            coordinator.clone(),
        ));
        let grid_handler = GridActionHandler::new(
            runtime.clone(),
            settings_rx.clone(),
            display_rx.clone(),
            coordinator.clone(),
            grid.clone(),
            gestures.clone(),
        );
        let cursor_handler = CursorActionHandler::new(
            runtime,
            settings_rx,
            display_rx,
            coordinator.clone(),
            cursor.clone(),
            gestures.clone(),
        );

        info!(
            width = screen.dimensions.width(),
            height = screen.dimensions.height(),
            rotation = ?screen.rotation,
            "input controller ready"
        );

        Self {
            settings: settings_tx,
            display: display_tx,
            coordinator,
            grid,
            cursor,
            gestures,
            grid_handler,
            cursor_handler,
        }
    }

    /// Routes a key event, grid handler first
    ///
    /// # Returns
    /// `true` if the event was consumed and must not reach the focused app
    pub fn handle_key_event(&self, event: KeyEvent) -> bool {
        self.grid_handler.handle_key_event(event) || self.cursor_handler.handle_key_event(event)
    }

    /// Publishes a new settings snapshot
    pub fn apply_settings(&self, settings: Settings) {
        let settings = settings.sanitized();
        let previous = self.settings.send_replace(settings.clone());
        if previous == settings {
            return;
        }

        info!("settings updated");
        self.gestures.on_settings_changed();
        if previous.grid_levels != settings.grid_levels {
            self.grid.reset_to_main_grid(true);
        }
    }

    /// Publishes a new screen snapshot and re-anchors both overlays
    pub fn update_display(&self, screen: DisplayInfo) {
        let previous = self.display.send_replace(screen);
        if previous == screen {
            return;
        }

        info!(
            width = screen.dimensions.width(),
            height = screen.dimensions.height(),
            rotation = ?screen.rotation,
            "display changed"
        );
        self.grid.reset_to_main_grid(true);
        self.cursor.recenter();
    }

    /// Cancels every loop and tap session and hides both overlays
    pub fn shutdown(&self) {
        self.grid_handler.dismiss();
        self.cursor_handler.dismiss();
        info!("input controller shut down");
    }

    pub fn set_grid_observer(&self, observer: GridObserver) {
        self.grid.set_observer(observer);
    }

    pub fn set_cursor_observer(&self, observer: CursorObserver) {
        self.cursor.set_observer(observer);
    }

    pub fn settings(&self) -> Settings {
        self.settings.borrow().clone()
    }

    pub fn display(&self) -> DisplayInfo {
        *self.display.borrow()
    }

    pub fn coordinator(&self) -> &ModeCoordinator {
        &self.coordinator
    }

    pub fn grid(&self) -> &GridStateManager {
        &self.grid
    }

    pub fn cursor(&self) -> &CursorStateManager {
        &self.cursor
    }

    pub fn gestures(&self) -> &Arc<GestureManager> {
        &self.gestures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::app::mode::OverlayMode;
    use crate::domain::core::{Point, Rotation, ScreenDimensions};
    use crate::domain::keyboard::{VK_DIVIDE, VK_MULTIPLY, VK_NUMPAD0, VK_RIGHT};
    use crate::gesture::{PrivilegedConnection, ServiceStatus, StrategyKind};
    use crate::input::activation::ACTIVATION_HOLD;
    use crate::platform::recording::RecordingHost;

    fn controller(settings: Settings) -> (InputController, Arc<RecordingHost>) {
        let host = Arc::new(RecordingHost::new());
        let controller = InputController::new(
            Handle::current(),
            settings,
            DisplayInfo::new(ScreenDimensions::new(300, 300), Rotation::Rotation0),
            HostCapabilities {
                dispatcher: host.clone(),
                privileged: None,
            },
        );
        (controller, host)
    }

    async fn long_press(controller: &InputController, code: u32) {
        controller.handle_key_event(KeyEvent::down(code));
        tokio::time::sleep(ACTIVATION_HOLD + Duration::from_millis(10)).await;
        controller.handle_key_event(KeyEvent::up(code));
    }

    fn press(controller: &InputController, code: u32) -> bool {
        let down = controller.handle_key_event(KeyEvent::down(code));
        let up = controller.handle_key_event(KeyEvent::up(code));
        down && up
    }

    fn digit(n: u32) -> u32 {
        VK_NUMPAD0 + n
    }

    #[tokio::test(start_paused = true)]
    async fn two_level_grid_taps_and_hides() {
        let (controller, host) = controller(Settings {
            grid_levels: 2,
            persist_overlay: false,
            ..Settings::default()
        });

        long_press(&controller, VK_MULTIPLY).await;
        assert_eq!(controller.coordinator().active(), OverlayMode::Grid);

        assert!(press(&controller, digit(5)));
        assert!(press(&controller, digit(5)));
        assert!(!controller.grid().is_visible());
        assert_eq!(controller.coordinator().active(), OverlayMode::None);

        controller.gestures().flush().await;
        let gestures = host.dispatched();
        assert_eq!(gestures.len(), 2);
        assert_eq!(gestures[0].strokes[0].path, vec![Point::new(150.0, 150.0)]);
        assert!(!gestures[1].strokes[0].will_continue);

        // Hidden grid lets digits through again
        assert!(!press(&controller, digit(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn two_level_grid_persists_after_tap() {
        let (controller, host) = controller(Settings {
            grid_levels: 2,
            persist_overlay: true,
            ..Settings::default()
        });

        long_press(&controller, VK_MULTIPLY).await;
        press(&controller, digit(5));
        press(&controller, digit(5));

        let grid = controller.grid().current().unwrap();
        assert_eq!(grid.level(), 1);
        assert_eq!(controller.coordinator().active(), OverlayMode::Grid);
        controller.gestures().flush().await;
        assert_eq!(host.dispatched().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn modes_exclude_each_other() {
        let (controller, _host) = controller(Settings::default());
        long_press(&controller, VK_MULTIPLY).await;
        long_press(&controller, VK_DIVIDE).await;

        assert_eq!(controller.coordinator().active(), OverlayMode::Grid);
        assert!(!controller.cursor().is_visible());

        // Grid off, then the cursor can come up
        long_press(&controller, VK_MULTIPLY).await;
        long_press(&controller, VK_DIVIDE).await;
        assert_eq!(controller.coordinator().active(), OverlayMode::Cursor);
        assert!(controller.cursor().is_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn display_change_recenters_and_resets() {
        let (controller, _host) = controller(Settings::default());
        long_press(&controller, VK_DIVIDE).await;
        controller.handle_key_event(KeyEvent::down(VK_RIGHT));
        tokio::time::sleep(Duration::from_millis(50)).await;
        controller.handle_key_event(KeyEvent::up(VK_RIGHT));

        controller.update_display(DisplayInfo::new(
            ScreenDimensions::new(800, 600),
            Rotation::Rotation90,
        ));
        assert_eq!(controller.cursor().position(), Some(Point::new(400.0, 300.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn level_change_resets_visible_grid() {
        let (controller, _host) = controller(Settings::default());
        long_press(&controller, VK_MULTIPLY).await;
        press(&controller, digit(1));
        assert_eq!(controller.grid().current().unwrap().max_levels(), 3);

        controller.apply_settings(Settings {
            grid_levels: 4,
            ..Settings::default()
        });
        let grid = controller.grid().current().unwrap();
        assert_eq!((grid.level(), grid.max_levels()), (1, 4));
    }

    #[tokio::test(start_paused = true)]
    async fn settings_are_sanitized_on_publish() {
        let (controller, _host) = controller(Settings::default());
        controller.apply_settings(Settings {
            scroll_multiplier: 3.0,
            grid_levels: 12,
            ..Settings::default()
        });
        let settings = controller.settings();
        assert_eq!(settings.scroll_multiplier, Settings::MAX_SCROLL_MULTIPLIER);
        assert_eq!(settings.grid_levels, Settings::MAX_GRID_LEVELS);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_activation_key_never_matches() {
        let (controller, _host) = controller(Settings {
            grid_activation_key: None,
            ..Settings::default()
        });
        long_press(&controller, VK_MULTIPLY).await;
        assert_eq!(controller.coordinator().active(), OverlayMode::None);
    }

    #[tokio::test(start_paused = true)]
    async fn privileged_opt_in_switches_strategy() {
        let host = Arc::new(RecordingHost::new());
        let connection = Arc::new(PrivilegedConnection::new());
        connection.set_status(ServiceStatus::Ready);
        let controller = InputController::new(
            Handle::current(),
            Settings::default(),
            DisplayInfo::default(),
            HostCapabilities {
                dispatcher: host.clone(),
                privileged: Some(PrivilegedHost {
                    connection,
                    injector: host.clone(),
                }),
            },
        );
        assert_eq!(controller.gestures().active_kind(), StrategyKind::Standard);

        controller.apply_settings(Settings {
            privileged_enabled: true,
            ..Settings::default()
        });
        assert_eq!(controller.gestures().active_kind(), StrategyKind::Privileged);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_hides_everything() {
        let (controller, host) = controller(Settings::default());
        long_press(&controller, VK_DIVIDE).await;
        controller.handle_key_event(KeyEvent::down(digit(5)));
        controller.shutdown();

        assert_eq!(controller.coordinator().active(), OverlayMode::None);
        assert!(!controller.cursor().is_visible());
        assert!(!controller.gestures().is_tap_active());
        controller.gestures().flush().await;
        assert_eq!(host.dispatched().len(), 1);
    }
}
