//! Gesture backend contract
//!
//! The engine never talks to the host directly. It asks a [`GestureBackend`]
//! for scrolls, pinches and tap sessions, and the two strategies translate
//! those into whatever the host capability understands: stroke descriptions
//! for OS gesture dispatch, or raw pointer events for privileged injection.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::GestureStyle;
use crate::domain::core::{Direction, Point};

/// Time a `Fixed` swipe rests at its end point before lifting
pub const FIXED_HOLD: Duration = Duration::from_millis(150);
/// Duration of the initial press of a tap session
pub const TAP_PRESS_DURATION: Duration = Duration::from_millis(10);
/// Duration of one drag step inside a tap session
pub const DRAG_STEP_DURATION: Duration = Duration::from_millis(16);
/// Frame interval used when a stroke is replayed as discrete pointer moves
pub const INJECTION_FRAME: Duration = Duration::from_millis(16);

/// Backend failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("Privileged input service is not ready")]
    ServiceNotReady,

    #[error("Host rejected the gesture: {0}")]
    Rejected(String),

    #[error("No tap session is open")]
    NoSession,
}

/// Duration and ending of a swipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrokeTiming {
    pub duration: Duration,
    pub style: GestureStyle,
}

impl StrokeTiming {
    pub fn new(duration: Duration, style: GestureStyle) -> Self {
        Self { duration, style }
    }

    /// How long the contact rests at the end point before release
    pub fn hold_at_end(&self) -> Duration {
        match self.style {
            GestureStyle::Fixed => FIXED_HOLD,
            GestureStyle::Inertia => Duration::ZERO,
        }
    }

    /// Duration of the whole stroke including the end hold
    pub fn total(&self) -> Duration {
        self.duration + self.hold_at_end()
    }
}

/// Straight path of one finger
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FingerPath {
    pub start: Point,
    pub end: Point,
}

impl FingerPath {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }
}

/// Executes gesture primitives on the host
///
/// Both strategies honour the same contract: swipes last
/// `timing.duration`, `Fixed` swipes rest [`FIXED_HOLD`] at the end, and a
/// tap session keeps one contact pressed from `start_tap` until `end_tap` or
/// `cancel_tap`.
#[async_trait]
pub trait GestureBackend: Send + Sync {
    async fn perform_scroll(
        &self,
        direction: Direction,
        start: Point,
        end: Point,
        timing: StrokeTiming,
    ) -> Result<(), BackendError>;

    async fn perform_zoom(
        &self,
        is_zoom_in: bool,
        fingers: [FingerPath; 2],
        timing: StrokeTiming,
    ) -> Result<(), BackendError>;

    /// Presses a contact without releasing it
    async fn start_tap(&self, point: Point) -> Result<(), BackendError>;

    /// Moves the pressed contact
    async fn drag_tap(&self, from: Point, to: Point) -> Result<(), BackendError>;

    /// Moves the pressed contact to `point` and releases it
    async fn end_tap(&self, point: Point) -> Result<(), BackendError>;

    /// Drops the pressed contact without a deliberate release
    async fn cancel_tap(&self) -> Result<(), BackendError>;
}

/// One finger stroke of an OS-dispatched gesture
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub path: Vec<Point>,
    /// Delay from the start of the gesture
    pub start_offset: Duration,
    pub duration: Duration,
    /// The contact stays down after this stroke
    pub will_continue: bool,
    /// This stroke continues the previous stroke of the same contact
    pub continues_previous: bool,
}

/// Gesture handed to the host dispatcher in one call
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GestureDescription {
    pub strokes: Vec<Stroke>,
}

/// Host capability behind the standard strategy
#[async_trait]
pub trait StrokeDispatcher: Send + Sync {
    /// Dispatches a gesture and resolves once the host has completed it
    async fn dispatch(&self, gesture: GestureDescription) -> Result<(), BackendError>;

    /// Abandons a continued stroke that is still pressed
    async fn cancel(&self) -> Result<(), BackendError>;
}

/// Raw pointer actions for privileged injection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAction {
    Down,
    Move,
    /// Secondary pointer `n` goes down
    PointerDown(usize),
    /// Secondary pointer `n` goes up
    PointerUp(usize),
    Up,
    Cancel,
}

/// One injected pointer event
#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    pub action: PointerAction,
    /// Positions of every pointer currently down, by pointer index
    pub pointers: Vec<Point>,
    /// Time since the gesture's first `Down`
    pub event_time: Duration,
}

/// Host capability behind the privileged strategy
#[async_trait]
pub trait PointerInjector: Send + Sync {
    async fn inject(&self, event: PointerEvent) -> Result<(), BackendError>;
}
