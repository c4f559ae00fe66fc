//! Privileged strategy: raw pointer injection
//!
//! Requires an external privileged service. The connection to that service
//! is an explicitly owned component: the host creates it, reports status
//! changes into it and shuts it down; the backend and the gesture manager
//! only hold a handle.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::domain::core::{Direction, Point};
use crate::gesture::backend::{
    BackendError, FingerPath, GestureBackend, INJECTION_FRAME, PointerAction, PointerEvent,
    PointerInjector, StrokeTiming,
};
use crate::lock;

/// State of the privileged service connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceStatus {
    #[default]
    Disconnected,
    Connecting,
    Ready,
}

/// Handle on the privileged input service
#[derive(Debug)]
pub struct PrivilegedConnection {
    status: watch::Sender<ServiceStatus>,
}

impl Default for PrivilegedConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl PrivilegedConnection {
    pub fn new() -> Self {
        let (status, _) = watch::channel(ServiceStatus::Disconnected);
        Self { status }
    }

    /// Reports a status change from the host
    pub fn set_status(&self, status: ServiceStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            info!(?previous, ?status, "privileged service status changed");
        }
    }

    pub fn status(&self) -> ServiceStatus {
        *self.status.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.status() == ServiceStatus::Ready
    }

    /// Receiver notified on every status change
    pub fn subscribe(&self) -> watch::Receiver<ServiceStatus> {
        self.status.subscribe()
    }

    /// Marks the connection closed; further injections fail
    pub fn shutdown(&self) {
        self.set_status(ServiceStatus::Disconnected);
    }
}

/// Pressed contact of an open tap session
#[derive(Debug, Clone, Copy)]
struct Contact {
    position: Point,
    down_at: Instant,
}

pub struct PrivilegedBackend {
    connection: Arc<PrivilegedConnection>,
    injector: Arc<dyn PointerInjector>,
    contact: Mutex<Option<Contact>>,
}

impl PrivilegedBackend {
    pub fn new(connection: Arc<PrivilegedConnection>, injector: Arc<dyn PointerInjector>) -> Self {
        Self {
            connection,
            injector,
            contact: Mutex::new(None),
        }
    }

    pub fn connection(&self) -> &Arc<PrivilegedConnection> {
        &self.connection
    }

    fn ensure_ready(&self) -> Result<(), BackendError> {
        if self.connection.is_ready() {
            Ok(())
        } else {
            Err(BackendError::ServiceNotReady)
        }
    }

    async fn send(
        &self,
        action: PointerAction,
        pointers: Vec<Point>,
        started: Instant,
    ) -> Result<(), BackendError> {
        self.ensure_ready()?;
        self.injector
            .inject(PointerEvent {
                action,
                pointers,
                event_time: started.elapsed(),
            })
            .await
    }

    /// Replays straight finger paths as timed pointer events
    ///
    /// The first finger goes down with `Down`, further fingers with
    /// `PointerDown`; they lift in reverse order.
    async fn replay(&self, fingers: &[FingerPath], timing: StrokeTiming) -> Result<(), BackendError> {
        let started = Instant::now();
        let starts: Vec<Point> = fingers.iter().map(|f| f.start).collect();
        let ends: Vec<Point> = fingers.iter().map(|f| f.end).collect();

        self.send(PointerAction::Down, starts[..1].to_vec(), started)
            .await?;
        for index in 1..fingers.len() {
            self.send(PointerAction::PointerDown(index), starts[..=index].to_vec(), started)
                .await?;
        }

        let frames = (timing.duration.as_millis() / INJECTION_FRAME.as_millis()).max(1) as u32;
        for frame in 1..=frames {
            tokio::time::sleep(timing.duration / frames).await;
            let t = frame as f32 / frames as f32;
            let positions = fingers.iter().map(|f| f.start.lerp(f.end, t)).collect();
            self.send(PointerAction::Move, positions, started).await?;
        }

        let hold = timing.hold_at_end();
        if !hold.is_zero() {
            tokio::time::sleep(hold).await;
            self.send(PointerAction::Move, ends.clone(), started).await?;
        }

        for index in (1..fingers.len()).rev() {
            self.send(PointerAction::PointerUp(index), ends[..=index].to_vec(), started)
                .await?;
        }
        self.send(PointerAction::Up, ends[..1].to_vec(), started).await
    }

    fn session_contact(&self) -> Result<Contact, BackendError> {
        lock(&self.contact).ok_or(BackendError::NoSession)
    }
}

#[async_trait]
impl GestureBackend for PrivilegedBackend {
    async fn perform_scroll(
        &self,
        direction: Direction,
        start: Point,
        end: Point,
        timing: StrokeTiming,
    ) -> Result<(), BackendError> {
        self.ensure_ready()?;
        debug!(?direction, ?start, ?end, "injecting scroll");
        let result = self.replay(&[FingerPath::new(start, end)], timing).await;
        if result.is_err() {
            let _ = self.send(PointerAction::Cancel, vec![end], Instant::now()).await;
        }
        result
    }

    async fn perform_zoom(
        &self,
        is_zoom_in: bool,
        fingers: [FingerPath; 2],
        timing: StrokeTiming,
    ) -> Result<(), BackendError> {
        self.ensure_ready()?;
        debug!(is_zoom_in, "injecting pinch");
        let result = self.replay(&fingers, timing).await;
        if result.is_err() {
            let ends = fingers.iter().map(|f| f.end).collect();
            let _ = self.send(PointerAction::Cancel, ends, Instant::now()).await;
        }
        result
    }

    async fn start_tap(&self, point: Point) -> Result<(), BackendError> {
        let down_at = Instant::now();
        self.send(PointerAction::Down, vec![point], down_at).await?;
        *lock(&self.contact) = Some(Contact {
            position: point,
            down_at,
        });
        Ok(())
    }

    async fn drag_tap(&self, _from: Point, to: Point) -> Result<(), BackendError> {
        let contact = self.session_contact()?;
        self.send(PointerAction::Move, vec![to], contact.down_at)
            .await?;
        if let Some(current) = lock(&self.contact).as_mut() {
            current.position = to;
        }
        Ok(())
    }

    async fn end_tap(&self, point: Point) -> Result<(), BackendError> {
        let contact = self.session_contact()?;
        let moved = if contact.position != point {
            self.send(PointerAction::Move, vec![point], contact.down_at)
                .await
        } else {
            Ok(())
        };
        let result = match moved {
            Ok(()) => self.send(PointerAction::Up, vec![point], contact.down_at).await,
            Err(err) => Err(err),
        };
        lock(&self.contact).take();
        result
    }

    async fn cancel_tap(&self) -> Result<(), BackendError> {
        let contact = lock(&self.contact).take();
        match contact {
            Some(contact) => {
                self.send(PointerAction::Cancel, vec![contact.position], contact.down_at)
                    .await
            }
            None => Ok(()),
        }
    }
}
