//! Free cursor key handling
//!
//! Directional keys move or scroll depending on the control scheme. Held
//! movement keys form a set that one frame loop turns into a combined
//! vector every frame. The action key presses a contact at the cursor that
//! follows the cursor as a drag until the key is released.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::app::cursor_state::CursorStateManager;
use crate::app::mode::{Activation, ModeCoordinator, OverlayMode};
use crate::config::{ControlScheme, EdgeBehavior, Settings};
use crate::domain::core::{Axis, DisplayInfo, Direction, Point};
use crate::domain::cursor::{EdgeContact, FRAME_INTERVAL_MS};
use crate::domain::keyboard::{Key, KeyAction, KeyEvent};
use crate::gesture::GestureManager;
use crate::input::activation::{ActivationTracker, Release};
use crate::input::grid_handler::{SCROLL_REPEAT_GAP, SCROLL_REPEAT_INITIAL_DELAY};
use crate::input::repeat::{LoopKey, LoopSet, LoopToken, repeat_until_cancelled};
use crate::input::{InputError, oriented_key};
use crate::lock;

/// Period of edge auto-scroll while the cursor pushes against an edge
pub const EDGE_SCROLL_INTERVAL: Duration = Duration::from_millis(400);
/// Double action press that latches the contact down; currently disabled
pub const HOLD_TOGGLE_ENABLED: bool = false;
/// Maximum gap between the two releases of a hold double press
pub const HOLD_TOGGLE_WINDOW: Duration = Duration::from_millis(300);

const MOVEMENT_FRAME: Duration = Duration::from_millis(FRAME_INTERVAL_MS);
const EDGES: [Direction; 4] = [
    Direction::Up,
    Direction::Down,
    Direction::Left,
    Direction::Right,
];

/// Meaning of a key while the cursor is visible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorRole {
    Move(Direction),
    Scroll(Direction),
    Zoom { is_zoom_in: bool },
    Action,
    Dismiss,
    Unused,
}

/// Maps an (already oriented) key to its role under `scheme`
pub fn cursor_role(key: Key, scheme: ControlScheme, in_scroll_mode: bool) -> CursorRole {
    let move_or_scroll = |direction| {
        if in_scroll_mode {
            CursorRole::Scroll(direction)
        } else {
            CursorRole::Move(direction)
        }
    };

    if let Some(direction) = key.arrow_direction() {
        return match scheme {
            ControlScheme::Standard => CursorRole::Move(direction),
            ControlScheme::Swapped => CursorRole::Scroll(direction),
            ControlScheme::ToggleMoveScroll => move_or_scroll(direction),
            ControlScheme::ToggleNumpad => CursorRole::Unused,
        };
    }

    if let Some(direction) = key.keypad_direction() {
        return match scheme {
            ControlScheme::Standard => CursorRole::Scroll(direction),
            ControlScheme::Swapped => CursorRole::Move(direction),
            ControlScheme::ToggleMoveScroll => CursorRole::Unused,
            ControlScheme::ToggleNumpad => move_or_scroll(direction),
        };
    }

    match key {
        Key::Digit(1) | Key::PageDown => CursorRole::Zoom { is_zoom_in: false },
        Key::Digit(3) | Key::PageUp => CursorRole::Zoom { is_zoom_in: true },
        Key::Digit(5) | Key::Center | Key::Enter => CursorRole::Action,
        Key::Back => CursorRole::Dismiss,
        _ => CursorRole::Unused,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CursorLoop {
    Movement,
    Scroll(Direction),
    EdgeScroll(Direction),
}

/// Key scrolls and edge scrolls each allow one loop per axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CursorSlot {
    Movement,
    Scroll(Axis),
    EdgeScroll(Axis),
}

impl LoopKey for CursorLoop {
    type Slot = CursorSlot;

    fn slot(&self) -> CursorSlot {
        match self {
            CursorLoop::Movement => CursorSlot::Movement,
            CursorLoop::Scroll(direction) => CursorSlot::Scroll(direction.axis()),
            CursorLoop::EdgeScroll(direction) => CursorSlot::EdgeScroll(direction.axis()),
        }
    }
}

/// Held movement keys
#[derive(Debug, Default)]
struct MovementKeys {
    directions: Vec<Direction>,
    /// When the current uninterrupted movement began, for acceleration
    started: Option<Instant>,
    /// A frame loop is running for this set
    loop_active: bool,
}

pub struct CursorActionHandler {
    runtime: Handle,
    settings: watch::Receiver<Settings>,
    display: watch::Receiver<DisplayInfo>,
    coordinator: Arc<ModeCoordinator>,
    cursor: Arc<CursorStateManager>,
    gestures: Arc<GestureManager>,
    activation: ActivationTracker,
    loops: LoopSet<CursorLoop>,
    held: Mutex<HashMap<u32, CursorRole>>,
    movement: Mutex<MovementKeys>,
    last_action_release: Mutex<Option<Instant>>,
}

impl CursorActionHandler {
    pub fn new(
        runtime: Handle,
        settings: watch::Receiver<Settings>,
        display: watch::Receiver<DisplayInfo>,
        coordinator: Arc<ModeCoordinator>,
        cursor: Arc<CursorStateManager>,
        gestures: Arc<GestureManager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            loops: LoopSet::new(runtime.clone()),
            runtime,
            settings,
            display,
            coordinator,
            cursor,
            gestures,
            activation: ActivationTracker::new(),
            held: Mutex::new(HashMap::new()),
            movement: Mutex::new(MovementKeys::default()),
            last_action_release: Mutex::new(None),
        })
    }

    /// Processes one key event
    ///
    /// # Returns
    /// `true` if the event was consumed and must not reach the focused app
    pub fn handle_key_event(self: &Arc<Self>, event: KeyEvent) -> bool {
        let settings = self.settings.borrow().clone();

        if settings.cursor_activation_key == Some(event.code) {
            return self.handle_activation_key(event);
        }
        if !self.cursor.is_visible() && !lock(&self.held).contains_key(&event.code) {
            return false;
        }

        match self.process_key(event, &settings) {
            Ok(consumed) => consumed,
            Err(err) => {
                warn!(%err, code = event.code, "cursor key processing failed");
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
            KeyAction::Up => {
                if self.activation.release() == Release::ShortPress {
                    if let Some(scroll_mode) = self.cursor.toggle_scroll_mode() {
                        debug!(scroll_mode, "short press toggled scroll mode");
                    }
                }
            }
        }
        true
    }

    fn on_long_press(&self) {
        match self.coordinator.request(OverlayMode::Cursor) {
            Activation::Granted => {
                self.cursor.show_cursor();
            }
            Activation::ToggledOff => {
                self.cancel_all();
                self.cursor.hide_cursor();
            }
            Activation::Refused { active } => {
                debug!(?active, "cursor activation refused, another mode is active");
            }
        }
    }

    fn process_key(self: &Arc<Self>, event: KeyEvent, settings: &Settings) -> Result<bool, InputError> {
        let unused = !settings.passthrough;

        match event.action {
            KeyAction::Down => {
                if let Some(role) = lock(&self.held).get(&event.code).copied() {
                    return Ok(role != CursorRole::Unused || unused);
                }
                let rotation = self.display.borrow().rotation;
                let key = oriented_key(event.key(), rotation, settings);
                let in_scroll_mode = self
                    .cursor
                    .current()
                    .is_some_and(|state| state.in_scroll_mode);
                let role = cursor_role(key, settings.control_scheme, in_scroll_mode);
                lock(&self.held).insert(event.code, role);
                self.key_down(role).map(|used| used || unused)
            }
            KeyAction::Up => {
                let Some(role) = lock(&self.held).remove(&event.code) else {
                    return Ok(unused);
                };
                self.key_up(role);
                Ok(role != CursorRole::Unused || unused)
            }
        }
    }

    fn key_down(self: &Arc<Self>, role: CursorRole) -> Result<bool, InputError> {
        match role {
            CursorRole::Move(direction) => {
                self.press_direction(direction);
                Ok(true)
            }
            CursorRole::Scroll(direction) => {
                self.start_scroll(direction);
                Ok(true)
            }
            CursorRole::Zoom { is_zoom_in } => {
                self.spawn_zoom(is_zoom_in);
                Ok(true)
            }
            CursorRole::Action => self.action_down(),
            CursorRole::Dismiss => {
                self.dismiss();
                Ok(true)
            }
            CursorRole::Unused => Ok(false),
        }
    }

    fn key_up(&self, role: CursorRole) {
        match role {
            CursorRole::Move(direction) => self.release_direction(direction),
            CursorRole::Scroll(direction) => {
                self.loops.stop(&CursorLoop::Scroll(direction));
            }
            CursorRole::Action => self.action_up(),
            CursorRole::Zoom { .. } | CursorRole::Dismiss | CursorRole::Unused => {}
        }
    }

    fn press_direction(self: &Arc<Self>, direction: Direction) {
        let start_loop = {
            let mut movement = lock(&self.movement);
            if !movement.directions.contains(&direction) {
                movement.directions.push(direction);
            }
            if movement.started.is_none() {
                movement.started = Some(Instant::now());
            }
            !std::mem::replace(&mut movement.loop_active, true)
        };

        if start_loop {
            let handler = Arc::downgrade(self);
            self.loops
                .start(CursorLoop::Movement, move |token| movement_loop(handler, token));
        }
    }

    fn release_direction(&self, direction: Direction) {
        let stopped = {
            let mut movement = lock(&self.movement);
            movement.directions.retain(|held| *held != direction);
            if movement.directions.is_empty() {
                movement.started = None;
            }
            movement.directions.is_empty()
        };
        if stopped {
            self.stop_edge_scrolls();
        }
    }

    /// Applies one movement frame
    ///
    /// The step is taken under the movement lock, so a key-up processed
    /// before this frame always wins.
    ///
    /// # Returns
    /// `false` once the loop should end
    fn movement_frame(self: &Arc<Self>) -> bool {
        let step = {
            let mut movement = lock(&self.movement);
            if movement.directions.is_empty() {
                movement.loop_active = false;
                return false;
            }
            let held_ms = movement
                .started
                .map(|started| started.elapsed().as_millis() as u64)
                .unwrap_or(0);
            match self.cursor.step(&movement.directions, held_ms) {
                Some(step) => step,
                None => {
                    *movement = MovementKeys::default();
                    return false;
                }
            }
        };

        if step.from != step.to
            && self.gestures.is_tap_active()
            && !self.gestures.drag_tap(step.from, step.to)
        {
            self.fail("drag");
            return false;
        }

        self.update_edge_scroll(step.edges);
        true
    }

    fn update_edge_scroll(self: &Arc<Self>, edges: EdgeContact) {
        let auto_scroll = self.settings.borrow().edge_behavior == EdgeBehavior::AutoScroll;
        let pushing = if auto_scroll {
            edges.directions()
        } else {
            Vec::new()
        };

        for direction in EDGES {
            let key = CursorLoop::EdgeScroll(direction);
            let running = self.loops.is_running(&key);
            if pushing.contains(&direction) && !running {
                debug!(?direction, "edge auto-scroll started");
                let handler = Arc::downgrade(self);
                self.loops.start(key, move |token| {
                    repeat_until_cancelled(
                        token,
                        EDGE_SCROLL_INTERVAL,
                        || EDGE_SCROLL_INTERVAL,
                        move || edge_scroll_once(handler.clone(), direction),
                    )
                });
            } else if !pushing.contains(&direction) && running {
                self.loops.stop(&key);
            }
        }
    }

    fn stop_edge_scrolls(&self) {
        for direction in EDGES {
            self.loops.stop(&CursorLoop::EdgeScroll(direction));
        }
    }

    /// Scroll origin for an edge: the screen middle on the scroll axis and
    /// the cursor on the other axis
    fn edge_origin(&self, direction: Direction) -> Option<Point> {
        let position = self.cursor.position()?;
        let center = self.display.borrow().dimensions.center();
        Some(if direction.is_horizontal() {
            Point::new(center.x, position.y)
        } else {
            Point::new(position.x, center.y)
        })
    }

    fn start_scroll(self: &Arc<Self>, direction: Direction) {
        let handler = Arc::downgrade(self);
        let settings = self.settings.clone();
        self.loops.start(CursorLoop::Scroll(direction), move |token| {
            repeat_until_cancelled(
                token,
                SCROLL_REPEAT_INITIAL_DELAY,
                move || settings.borrow().gesture_duration() + SCROLL_REPEAT_GAP,
                move || scroll_once(handler.clone(), direction),
            )
        });
    }

    fn spawn_zoom(self: &Arc<Self>, is_zoom_in: bool) {
        let Some(position) = self.cursor.position() else {
            return;
        };
        let handler = Arc::downgrade(self);
        let gestures = self.gestures.clone();
        self.runtime.spawn(async move {
            if !gestures.perform_zoom(is_zoom_in, position.x, position.y).await {
                if let Some(handler) = handler.upgrade() {
                    handler.fail("zoom");
                }
            }
        });
    }

    fn action_down(&self) -> Result<bool, InputError> {
        let Some(state) = self.cursor.current() else {
            return Ok(false);
        };

        if state.is_hold_active {
            // A latched contact is released by the next press
            self.cursor.update_hold_state(false);
            self.gestures.end_tap(state.position);
            return Ok(true);
        }

        if self.gestures.start_tap(state.position) {
            Ok(true)
        } else {
            Err(InputError::GestureRejected("tap press"))
        }
    }

    fn action_up(&self) {
        let Some(state) = self.cursor.current() else {
            self.gestures.cancel_tap();
            return;
        };

        let now = Instant::now();
        let previous = lock(&self.last_action_release).replace(now);
        if HOLD_TOGGLE_ENABLED
            && self.gestures.is_tap_active()
            && previous.is_some_and(|at| now.duration_since(at) <= HOLD_TOGGLE_WINDOW)
        {
            debug!("hold latched, contact stays down");
            self.cursor.update_hold_state(true);
            return;
        }

        if !state.is_hold_active {
            self.gestures.end_tap(state.position);
        }
    }

    fn fail(&self, what: &'static str) {
        warn!(err = %InputError::GestureRejected(what), "cursor gesture failed");
        self.cancel_all();
    }

    /// Hides the cursor and releases its mode
    pub fn dismiss(&self) {
        self.cancel_all();
        self.activation.reset();
        self.cursor.hide_cursor();
    }

    /// Stops every loop, forgets held movement and drops the tap session
    pub fn cancel_all(&self) {
        *lock(&self.movement) = MovementKeys::default();
        self.loops.stop_all();
        self.gestures.cancel_tap();
        if self.cursor.current().is_some_and(|state| state.is_hold_active) {
            self.cursor.update_hold_state(false);
        }
    }
}

async fn movement_loop(handler: Weak<CursorActionHandler>, mut token: LoopToken) {
    loop {
        let Some(strong) = handler.upgrade() else {
            return;
        };
        if !strong.movement_frame() {
            return;
        }
        drop(strong);

        if !token.sleep(MOVEMENT_FRAME).await {
            return;
        }
    }
}

async fn scroll_once(handler: Weak<CursorActionHandler>, direction: Direction) -> bool {
    let Some(handler) = handler.upgrade() else {
        return false;
    };
    let Some(position) = handler.cursor.position() else {
        return false;
    };
    if handler
        .gestures
        .perform_scroll(direction, position.x, position.y)
        .await
    {
        true
    } else {
        handler.fail("scroll");
        false
    }
}

async fn edge_scroll_once(handler: Weak<CursorActionHandler>, direction: Direction) -> bool {
    let Some(handler) = handler.upgrade() else {
        return false;
    };
    let Some(origin) = handler.edge_origin(direction) else {
        return false;
    };
    if handler.gestures.perform_edge_scroll(direction, origin).await {
        true
    } else {
        handler.fail("edge scroll");
        false
    }
}
