//! Grid mode key handling
//!
//! Digits descend or tap, arrows scroll at the focused cell with
//! auto-repeat, page keys zoom, and center/enter press a contact that stays
//! down until the key is released.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::app::grid_state::{GridStateManager, NumberKeyOutcome};
use crate::app::mode::{Activation, ModeCoordinator, OverlayMode};
use crate::config::Settings;
use crate::domain::core::{DisplayInfo, Direction};
use crate::domain::keyboard::{Key, KeyAction, KeyEvent};
use crate::gesture::GestureManager;
use crate::input::activation::{ActivationTracker, Release};
use crate::input::repeat::{LoopSet, repeat_until_cancelled};
use crate::input::{InputError, oriented_key};
use crate::lock;

/// Delay before a held scroll key starts repeating
pub const SCROLL_REPEAT_INITIAL_DELAY: Duration = Duration::from_millis(400);
/// Gap added to the gesture duration between repeated scrolls
pub const SCROLL_REPEAT_GAP: Duration = Duration::from_millis(50);

/// Meaning of a key while the grid is visible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GridRole {
    Select(u8),
    Scroll(Direction),
    Zoom { is_zoom_in: bool },
    Tap,
    Dismiss,
    Unused,
}

fn grid_role(key: Key) -> GridRole {
    if let Some(direction) = key.arrow_direction() {
        return GridRole::Scroll(direction);
    }
    match key {
        Key::Digit(n @ 1..=9) => GridRole::Select(n),
        Key::PageUp => GridRole::Zoom { is_zoom_in: true },
        Key::PageDown => GridRole::Zoom { is_zoom_in: false },
        Key::Center | Key::Enter => GridRole::Tap,
        Key::Back => GridRole::Dismiss,
        _ => GridRole::Unused,
    }
}

pub struct GridActionHandler {
    runtime: Handle,
    settings: watch::Receiver<Settings>,
    display: watch::Receiver<DisplayInfo>,
    coordinator: Arc<ModeCoordinator>,
    grid: Arc<GridStateManager>,
    gestures: Arc<GestureManager>,
    activation: ActivationTracker,
    loops: LoopSet<Direction>,
    /// Role each held key had when it went down, by key code
    held: Mutex<HashMap<u32, GridRole>>,
}

impl GridActionHandler {
    pub fn new(
        runtime: Handle,
        settings: watch::Receiver<Settings>,
        display: watch::Receiver<DisplayInfo>,
        coordinator: Arc<ModeCoordinator>,
        grid: Arc<GridStateManager>,
        gestures: Arc<GestureManager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            loops: LoopSet::new(runtime.clone()),
            runtime,
            settings,
            display,
            coordinator,
            grid,
            gestures,
            activation: ActivationTracker::new(),
            held: Mutex::new(HashMap::new()),
        })
    }

    /// Processes one key event
    ///
    /// # Returns
    /// `true` if the event was consumed and must not reach the focused app
    pub fn handle_key_event(self: &Arc<Self>, event: KeyEvent) -> bool {
        let settings = self.settings.borrow().clone();

        if settings.grid_activation_key == Some(event.code) {
            return self.handle_activation_key(event);
        }
        // The cursor handler decides about its own activation key
        if settings.cursor_activation_key == Some(event.code) {
            return false;
        }
        if !self.grid.is_visible() && !lock(&self.held).contains_key(&event.code) {
            return false;
        }

        match self.process_key(event, &settings) {
            Ok(consumed) => consumed,
            Err(err) => {
                warn!(%err, code = event.code, "grid key processing failed");
                self.cancel_all();
                false
            }
        }
    }

    fn handle_activation_key(self: &Arc<Self>, event: KeyEvent) -> bool {
        match event.action {
            KeyAction::Down => {
                let handler = Arc::downgrade(self);
                if !self.activation.press(&self.runtime, move || {
                    if let Some(handler) = handler.upgrade() {
                        handler.on_long_press();
                    }
                }) {
                    debug!("activation key repeat swallowed");
                }
            }
            KeyAction::Up => match self.activation.release() {
                Release::ShortPress => {
                    if self.grid.is_visible() {
                        self.grid.reset_to_main_grid(false);
                    }
                }
                Release::AfterActivation | Release::Untracked => {}
            },
        }
        true
    }

    fn on_long_press(&self) {
        match self.coordinator.request(OverlayMode::Grid) {
            Activation::Granted => {
                self.grid.show_grid();
            }
            Activation::ToggledOff => {
                self.cancel_all();
                self.grid.hide_grid();
            }
            Activation::Refused { active } => {
                debug!(?active, "grid activation refused, another mode is active");
            }
        }
    }

    fn process_key(self: &Arc<Self>, event: KeyEvent, settings: &Settings) -> Result<bool, InputError> {
        let unused = !settings.passthrough;

        match event.action {
            KeyAction::Down => {
                if let Some(role) = lock(&self.held).get(&event.code).copied() {
                    // Auto-repeat of a key we already act on
                    return Ok(role != GridRole::Unused || unused);
                }
                let rotation = self.display.borrow().rotation;
                let role = grid_role(oriented_key(event.key(), rotation, settings));
                lock(&self.held).insert(event.code, role);
                self.key_down(role).map(|used| used || unused)
            }
            KeyAction::Up => {
                let Some(role) = lock(&self.held).remove(&event.code) else {
                    return Ok(unused);
                };
                self.key_up(role);
                Ok(role != GridRole::Unused || unused)
            }
        }
    }

    fn key_down(self: &Arc<Self>, role: GridRole) -> Result<bool, InputError> {
        match role {
            GridRole::Select(n) => match self.grid.handle_number_key(n) {
                NumberKeyOutcome::TapFailed => Err(InputError::GestureRejected("grid tap")),
                NumberKeyOutcome::Tapped if !self.grid.is_visible() => {
                    self.loops.stop_all();
                    Ok(true)
                }
                _ => Ok(true),
            },
            GridRole::Scroll(direction) => {
                self.start_scroll(direction);
                Ok(true)
            }
            GridRole::Zoom { is_zoom_in } => {
                self.spawn_zoom(is_zoom_in);
                Ok(true)
            }
            GridRole::Tap => {
                let focus = self.grid.focus_coordinates();
                if self.gestures.start_tap(focus) {
                    Ok(true)
                } else {
                    Err(InputError::GestureRejected("tap press"))
                }
            }
            GridRole::Dismiss => {
                self.dismiss();
                Ok(true)
            }
            GridRole::Unused => Ok(false),
        }
    }

    fn key_up(&self, role: GridRole) {
        match role {
            GridRole::Scroll(direction) => {
                self.loops.stop(&direction);
            }
            GridRole::Tap => {
                let focus = self.grid.focus_coordinates();
                // A session closed by a failure is already gone
                self.gestures.end_tap(focus);
            }
            GridRole::Select(_) | GridRole::Zoom { .. } | GridRole::Dismiss | GridRole::Unused => {}
        }
    }

    fn start_scroll(self: &Arc<Self>, direction: Direction) {
        let handler = Arc::downgrade(self);
        let settings = self.settings.clone();
        self.loops.start(direction, move |token| {
            repeat_until_cancelled(
                token,
                SCROLL_REPEAT_INITIAL_DELAY,
                move || settings.borrow().gesture_duration() + SCROLL_REPEAT_GAP,
                move || scroll_once(handler.clone(), direction),
            )
        });
    }

    fn spawn_zoom(self: &Arc<Self>, is_zoom_in: bool) {
        let handler = Arc::downgrade(self);
        let focus = self.grid.focus_coordinates();
        let gestures = self.gestures.clone();
        self.runtime.spawn(async move {
            if !gestures.perform_zoom(is_zoom_in, focus.x, focus.y).await {
                if let Some(handler) = handler.upgrade() {
                    handler.fail("zoom");
                }
            }
        });
    }

    fn fail(&self, what: &'static str) {
        warn!(err = %InputError::GestureRejected(what), "grid gesture failed");
        self.cancel_all();
    }

    /// Hides the grid and releases its mode
    pub fn dismiss(&self) {
        self.cancel_all();
        self.activation.reset();
        self.grid.hide_grid();
    }

    /// Stops every loop and drops an open tap session
    pub fn cancel_all(&self) {
        self.loops.stop_all();
        self.gestures.cancel_tap();
    }
}

async fn scroll_once(handler: Weak<GridActionHandler>, direction: Direction) -> bool {
    let Some(handler) = handler.upgrade() else {
        return false;
    };
    let focus = handler.grid.focus_coordinates();
    if handler
        .gestures
        .perform_scroll(direction, focus.x, focus.y)
        .await
    {
        true
    } else {
        handler.fail("scroll");
        false
    }
}
