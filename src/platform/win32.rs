//! Win32 touch injection host
//!
//! Executes gestures by injecting synthetic touch contacts with
//! `InjectTouchInput`. Serves both strategies: stroke descriptions are
//! replayed as timed frames and pointer events are injected as they come.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, warn};
use windows::Win32::Foundation::{POINT, RECT};
use windows::Win32::UI::Input::Pointer::{
    InitializeTouchInjection, InjectTouchInput, POINTER_FLAG_CANCELED, POINTER_FLAG_DOWN,
    POINTER_FLAG_INCONTACT, POINTER_FLAG_INRANGE, POINTER_FLAG_UP, POINTER_FLAG_UPDATE,
    POINTER_FLAGS, POINTER_INFO, POINTER_TOUCH_INFO, TOUCH_FEEDBACK_DEFAULT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetSystemMetrics, PT_TOUCH, SM_CXSCREEN, SM_CYSCREEN, TOUCH_MASK_CONTACTAREA,
    TOUCH_MASK_PRESSURE,
};

use crate::domain::core::{DisplayInfo, Rotation, ScreenDimensions};
use crate::gesture::backend::{
    BackendError, GestureDescription, PointerEvent, PointerInjector, StrokeDispatcher,
};
use crate::lock;
use crate::platform::touch::{
    ContactPhase, ContactSample, plan_gesture, pointer_samples, pressed_after,
};

/// Most contacts a gesture uses at once
const MAX_CONTACTS: u32 = 2;
/// Half the side of the reported contact area, in pixels
const CONTACT_RADIUS: i32 = 2;
const CONTACT_PRESSURE: u32 = 32000;

/// Reads the primary monitor size
///
/// # Returns
/// Display information with rotation 0; the host reports rotation changes
/// separately
pub fn primary_display() -> DisplayInfo {
    let (width, height) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
    DisplayInfo::new(
        ScreenDimensions::new(width.max(1) as u32, height.max(1) as u32),
        Rotation::Rotation0,
    )
}

fn injection_error(err: windows::core::Error) -> BackendError {
    BackendError::Rejected(err.message().to_string())
}

fn pointer_flags(phase: ContactPhase) -> POINTER_FLAGS {
    match phase {
        ContactPhase::Down => POINTER_FLAG_DOWN | POINTER_FLAG_INRANGE | POINTER_FLAG_INCONTACT,
        ContactPhase::Update => {
            POINTER_FLAG_UPDATE | POINTER_FLAG_INRANGE | POINTER_FLAG_INCONTACT
        }
        ContactPhase::Up => POINTER_FLAG_UP,
        ContactPhase::Cancel => POINTER_FLAG_UP | POINTER_FLAG_CANCELED,
    }
}

/// Converts a contact sample to the Win32 touch structure
fn touch_info(sample: &ContactSample) -> POINTER_TOUCH_INFO {
    let x = sample.point.x.round() as i32;
    let y = sample.point.y.round() as i32;
    POINTER_TOUCH_INFO {
        pointerInfo: POINTER_INFO {
            pointerType: PT_TOUCH,
            pointerId: sample.id,
            pointerFlags: pointer_flags(sample.phase),
            ptPixelLocation: POINT { x, y },
            ..Default::default()
        },
        touchMask: TOUCH_MASK_CONTACTAREA | TOUCH_MASK_PRESSURE,
        rcContact: RECT {
            left: x - CONTACT_RADIUS,
            top: y - CONTACT_RADIUS,
            right: x + CONTACT_RADIUS,
            bottom: y + CONTACT_RADIUS,
        },
        pressure: CONTACT_PRESSURE,
        ..Default::default()
    }
}

fn inject_contacts(samples: &[ContactSample]) -> Result<(), BackendError> {
    if samples.is_empty() {
        return Ok(());
    }
    let contacts: Vec<POINTER_TOUCH_INFO> = samples.iter().map(touch_info).collect();
    unsafe { InjectTouchInput(&contacts) }.map_err(injection_error)
}

/// Touch injection host for the primary display
#[derive(Debug)]
pub struct TouchInjectionHost {
    /// Contact a previous gesture left pressed, at its last position
    pressed: Mutex<Option<ContactSample>>,
}

impl TouchInjectionHost {
    /// Enables touch injection for this process
    ///
    /// # Returns
    /// The host, or `BackendError::Rejected` when the system refuses
    /// injection (no touch support, insufficient rights)
    pub fn initialize() -> Result<Self, BackendError> {
        unsafe { InitializeTouchInjection(MAX_CONTACTS, TOUCH_FEEDBACK_DEFAULT) }
            .map_err(injection_error)?;
        debug!(max_contacts = MAX_CONTACTS, "touch injection initialized");
        Ok(Self {
            pressed: Mutex::new(None),
        })
    }
}

#[async_trait]
impl StrokeDispatcher for TouchInjectionHost {
    async fn dispatch(&self, gesture: GestureDescription) -> Result<(), BackendError> {
        let previous = *lock(&self.pressed);
        let frames = plan_gesture(&gesture, previous.map(|contact| contact.id));
        let started = Instant::now();

        for frame in &frames {
            tokio::time::sleep_until(started + frame.at).await;
            if let Err(err) = inject_contacts(&frame.contacts) {
                warn!(error = %err, "touch frame rejected");
                *lock(&self.pressed) = None;
                return Err(err);
            }
        }

        // A carried contact the gesture never touched is still down
        let touched = |id: u32| frames.iter().any(|f| f.contacts.iter().any(|c| c.id == id));
        let held = pressed_after(&frames).or(previous.filter(|contact| !touched(contact.id)));
        *lock(&self.pressed) = held;
        Ok(())
    }

    async fn cancel(&self) -> Result<(), BackendError> {
        let Some(contact) = lock(&self.pressed).take() else {
            return Ok(());
        };
        debug!(id = contact.id, "cancelling pressed contact");
        inject_contacts(&[ContactSample {
            phase: ContactPhase::Cancel,
            ..contact
        }])
    }
}

#[async_trait]
impl PointerInjector for TouchInjectionHost {
    async fn inject(&self, event: PointerEvent) -> Result<(), BackendError> {
        inject_contacts(&pointer_samples(&event))
    }
}
