//! Gesture manager
//!
//! Chooses between the standard and privileged strategies, turns logical
//! requests (scroll here, zoom there, press, drag, release) into concrete
//! geometry and forwards them to the active backend.
//!
//! Tap sessions are stateful. Their commands go through a single queue
//! served by one worker task, so the backend always sees press, drags and
//! release in the order the key handlers issued them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::domain::core::{DisplayInfo, Direction, Point};
use crate::gesture::backend::{
    DRAG_STEP_DURATION, GestureBackend, PointerInjector, StrokeDispatcher, StrokeTiming,
    TAP_PRESS_DURATION,
};
use crate::gesture::geometry::{EDGE_SCROLL_FRACTION, pinch_paths, scroll_vector};
use crate::gesture::privileged::{PrivilegedBackend, PrivilegedConnection};
use crate::gesture::standard::StandardBackend;
use crate::gesture::visualization::{GestureKind, GestureVisualizer};
use crate::lock;

/// Quiet period after a privileged status change before re-selecting
pub const STRATEGY_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Standard,
    Privileged,
}

/// Privileged injection is used only when the service is ready and the
/// user opted in; otherwise the standard strategy applies.
pub fn select_strategy(privileged_ready: bool, opted_in: bool) -> StrategyKind {
    if privileged_ready && opted_in {
        StrategyKind::Privileged
    } else {
        StrategyKind::Standard
    }
}

/// The two interchangeable execution strategies
#[derive(Clone)]
pub enum GestureStrategy {
    Standard(Arc<StandardBackend>),
    Privileged(Arc<PrivilegedBackend>),
}

impl GestureStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            GestureStrategy::Standard(_) => StrategyKind::Standard,
            GestureStrategy::Privileged(_) => StrategyKind::Privileged,
        }
    }

    pub fn backend(&self) -> &dyn GestureBackend {
        match self {
            GestureStrategy::Standard(backend) => backend.as_ref(),
            GestureStrategy::Privileged(backend) => backend.as_ref(),
        }
    }
}

impl std::fmt::Debug for GestureStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GestureStrategy::{:?}", self.kind())
    }
}

/// Host side of the privileged strategy
pub struct PrivilegedHost {
    pub connection: Arc<PrivilegedConnection>,
    pub injector: Arc<dyn PointerInjector>,
}

#[derive(Debug, Clone)]
enum TapSession {
    Idle,
    Pressed {
        id: u64,
        strategy: GestureStrategy,
        position: Point,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TapOp {
    Start(Point),
    Drag(Point, Point),
    End(Point),
    Cancel,
}

enum TapCommand {
    Op {
        session: u64,
        strategy: GestureStrategy,
        op: TapOp,
    },
    Flush(oneshot::Sender<()>),
}

pub struct GestureManager {
    settings: watch::Receiver<Settings>,
    display: watch::Receiver<DisplayInfo>,
    standard: Arc<StandardBackend>,
    privileged: Option<Arc<PrivilegedBackend>>,
    active: Mutex<StrategyKind>,
    session: Arc<Mutex<TapSession>>,
    next_session: AtomicU64,
    commands: mpsc::UnboundedSender<TapCommand>,
    visualizer: GestureVisualizer,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl GestureManager {
    /// Creates the manager and starts its tap worker (and, with a privileged
    /// host, the status watcher) on `runtime`
    pub fn new(
        runtime: &Handle,
        settings: watch::Receiver<Settings>,
        display: watch::Receiver<DisplayInfo>,
        dispatcher: Arc<dyn StrokeDispatcher>,
        privileged: Option<PrivilegedHost>,
    ) -> Arc<Self> {
        let (commands, queue) = mpsc::unbounded_channel();
        let session = Arc::new(Mutex::new(TapSession::Idle));
        let connection = privileged.as_ref().map(|host| host.connection.clone());

        let manager = Arc::new(Self {
            settings,
            display,
            standard: Arc::new(StandardBackend::new(dispatcher)),
            privileged: privileged
                .map(|host| Arc::new(PrivilegedBackend::new(host.connection, host.injector))),
            active: Mutex::new(StrategyKind::Standard),
            session: session.clone(),
            next_session: AtomicU64::new(1),
            commands,
            visualizer: GestureVisualizer::new(),
            tasks: Mutex::new(Vec::new()),
        });

        manager.evaluate_strategy();

        let mut tasks = vec![runtime.spawn(run_tap_worker(queue, session))];
        if let Some(connection) = connection {
            tasks.push(runtime.spawn(watch_privileged_status(
                Arc::downgrade(&manager),
                connection.subscribe(),
            )));
        }
        *lock(&manager.tasks) = tasks;

        manager
    }

    /// Re-selects the strategy from the current service status and settings
    pub fn evaluate_strategy(&self) -> StrategyKind {
        let opted_in = self.settings.borrow().privileged_enabled && self.privileged.is_some();
        let ready = self
            .privileged
            .as_ref()
            .is_some_and(|backend| backend.connection().is_ready());
        let kind = select_strategy(ready, opted_in);

        let mut active = lock(&self.active);
        if *active != kind {
            info!(from = ?*active, to = ?kind, "gesture strategy changed");
        }
        *active = kind;
        kind
    }

    /// Called by the controller whenever a new settings snapshot is published
    pub fn on_settings_changed(&self) {
        self.evaluate_strategy();
    }

    pub fn active_kind(&self) -> StrategyKind {
        *lock(&self.active)
    }

    pub fn active_strategy(&self) -> GestureStrategy {
        match (self.active_kind(), &self.privileged) {
            (StrategyKind::Privileged, Some(backend)) => GestureStrategy::Privileged(backend.clone()),
            _ => GestureStrategy::Standard(self.standard.clone()),
        }
    }

    pub fn visualizer(&self) -> &GestureVisualizer {
        &self.visualizer
    }

    /// Scrolls in `direction` starting at `(start_x, start_y)`
    pub async fn perform_scroll(&self, direction: Direction, start_x: f32, start_y: f32) -> bool {
        let fraction = self.settings.borrow().scroll_multiplier;
        self.scroll_by_fraction(direction, Point::new(start_x, start_y), fraction)
            .await
    }

    /// Short scroll used while the cursor pushes against a screen edge
    pub async fn perform_edge_scroll(&self, direction: Direction, origin: Point) -> bool {
        self.scroll_by_fraction(direction, origin, EDGE_SCROLL_FRACTION)
            .await
    }

    async fn scroll_by_fraction(&self, direction: Direction, origin: Point, fraction: f32) -> bool {
        let settings = self.settings.borrow().clone();
        let screen = self.display.borrow().dimensions;
        let (start, end) =
            scroll_vector(direction, origin, screen, fraction, settings.natural_scrolling);
        let timing = StrokeTiming::new(settings.gesture_duration(), settings.gesture_style);
        let strategy = self.active_strategy();

        self.visualizer
            .emit(GestureKind::Scroll, vec![start, end], timing.total());

        match strategy
            .backend()
            .perform_scroll(direction, start, end, timing)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, ?direction, strategy = ?strategy.kind(), "scroll failed");
                false
            }
        }
    }

    /// Pinch-zooms around `(center_x, center_y)`
    pub async fn perform_zoom(&self, is_zoom_in: bool, center_x: f32, center_y: f32) -> bool {
        let settings = self.settings.borrow().clone();
        let screen = self.display.borrow().dimensions;
        let fingers = pinch_paths(is_zoom_in, Point::new(center_x, center_y), screen);
        let timing = StrokeTiming::new(settings.gesture_duration(), settings.gesture_style);
        let strategy = self.active_strategy();

        for finger in &fingers {
            self.visualizer
                .emit(GestureKind::Zoom, vec![finger.start, finger.end], timing.total());
        }

        match strategy
            .backend()
            .perform_zoom(is_zoom_in, fingers, timing)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, is_zoom_in, strategy = ?strategy.kind(), "zoom failed");
                false
            }
        }
    }

    fn enqueue(&self, session: u64, strategy: GestureStrategy, op: TapOp) -> bool {
        self.commands
            .send(TapCommand::Op {
                session,
                strategy,
                op,
            })
            .is_ok()
    }

    /// Opens a tap session by pressing at `point`
    ///
    /// A session that is still open is cancelled first; the new press always
    /// wins. Returns false only if the worker is gone.
    pub fn start_tap(&self, point: Point) -> bool {
        let strategy = self.active_strategy();
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);

        let mut session = lock(&self.session);
        if let TapSession::Pressed {
            id: open,
            strategy: open_strategy,
            ..
        } = &*session
        {
            warn!(session = open, "tap session already open, replacing it");
            self.enqueue(*open, open_strategy.clone(), TapOp::Cancel);
        }

        let queued = self.enqueue(id, strategy.clone(), TapOp::Start(point));
        *session = if queued {
            TapSession::Pressed {
                id,
                strategy,
                position: point,
            }
        } else {
            TapSession::Idle
        };
        drop(session);

        debug!(session = id, ?point, "tap session started");
        self.visualizer
            .emit(GestureKind::TapDown, vec![point], TAP_PRESS_DURATION);
        queued
    }

    /// Moves the pressed contact; false when no session is open
    pub fn drag_tap(&self, from: Point, to: Point) -> bool {
        let mut session = lock(&self.session);
        let TapSession::Pressed {
            id,
            strategy,
            position,
        } = &mut *session
        else {
            return false;
        };

        let queued = self.enqueue(*id, strategy.clone(), TapOp::Drag(from, to));
        *position = to;
        drop(session);

        self.visualizer
            .emit(GestureKind::Drag, vec![from, to], DRAG_STEP_DURATION);
        queued
    }

    /// Releases the contact at `point`; false when no session is open
    pub fn end_tap(&self, point: Point) -> bool {
        let mut session = lock(&self.session);
        let TapSession::Pressed { id, strategy, .. } =
            std::mem::replace(&mut *session, TapSession::Idle)
        else {
            return false;
        };
        let queued = self.enqueue(id, strategy, TapOp::End(point));
        drop(session);

        debug!(session = id, ?point, "tap session ended");
        self.visualizer
            .emit(GestureKind::TapUp, vec![point], DRAG_STEP_DURATION);
        queued
    }

    /// Drops the contact without a deliberate release; false when idle
    pub fn cancel_tap(&self) -> bool {
        let mut session = lock(&self.session);
        let TapSession::Pressed { id, strategy, .. } =
            std::mem::replace(&mut *session, TapSession::Idle)
        else {
            return false;
        };
        debug!(session = id, "tap session cancelled");
        self.enqueue(id, strategy, TapOp::Cancel)
    }

    /// Press and release at the same point
    pub fn tap(&self, point: Point) -> bool {
        self.start_tap(point) && self.end_tap(point)
    }

    pub fn is_tap_active(&self) -> bool {
        matches!(*lock(&self.session), TapSession::Pressed { .. })
    }

    /// Position of the pressed contact, if any
    pub fn tap_position(&self) -> Option<Point> {
        match &*lock(&self.session) {
            TapSession::Pressed { position, .. } => Some(*position),
            TapSession::Idle => None,
        }
    }

    /// Resolves once every tap command queued so far reached the backend
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.commands.send(TapCommand::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    /// Flushes the tap queue, then stops the worker and status watcher
    ///
    /// Taps requested afterwards are refused.
    pub async fn close(&self) {
        self.flush().await;
        let tasks: Vec<JoinHandle<()>> = lock(&self.tasks).drain(..).collect();
        for task in tasks {
            task.abort();
            let _ = task.await;
        }
        debug!("gesture manager closed");
    }
}

impl Drop for GestureManager {
    fn drop(&mut self) {
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
    }
}

/// Serves tap commands in order
///
/// A failed press, drag or release cancels the contact on the backend and
/// closes the session, and the rest of that session's queued commands are
/// skipped.
async fn run_tap_worker(
    mut queue: mpsc::UnboundedReceiver<TapCommand>,
    session: Arc<Mutex<TapSession>>,
) {
    let mut failed: Option<u64> = None;

    while let Some(command) = queue.recv().await {
        let (id, strategy, op) = match command {
            TapCommand::Flush(done) => {
                let _ = done.send(());
                continue;
            }
            TapCommand::Op {
                session,
                strategy,
                op,
            } => (session, strategy, op),
        };

        if failed == Some(id) {
            debug!(session = id, ?op, "skipping step of failed tap session");
            continue;
        }

        let backend = strategy.backend();
        let result = match op {
            TapOp::Start(point) => backend.start_tap(point).await,
            TapOp::Drag(from, to) => backend.drag_tap(from, to).await,
            TapOp::End(point) => backend.end_tap(point).await,
            TapOp::Cancel => backend.cancel_tap().await,
        };

        let Err(err) = result else {
            continue;
        };

        if op == TapOp::Cancel {
            warn!(%err, session = id, "tap cancel failed");
            continue;
        }

        warn!(%err, session = id, ?op, "tap step failed, cancelling contact");
        if let Err(cancel_err) = backend.cancel_tap().await {
            debug!(%cancel_err, session = id, "implicit cancel failed");
        }
        failed = Some(id);

        let mut current = lock(&session);
        if matches!(&*current, TapSession::Pressed { id: open, .. } if *open == id) {
            *current = TapSession::Idle;
        }
    }
}

/// Re-selects the strategy after the privileged status settles
async fn watch_privileged_status(
    manager: std::sync::Weak<GestureManager>,
    mut status: watch::Receiver<crate::gesture::privileged::ServiceStatus>,
) {
    loop {
        if status.changed().await.is_err() {
            return;
        }

        // Every further change restarts the quiet period
        loop {
            tokio::select! {
                _ = tokio::time::sleep(STRATEGY_DEBOUNCE) => break,
                changed = status.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }

        let Some(manager) = manager.upgrade() else {
            return;
        };
        manager.evaluate_strategy();
    }
}
