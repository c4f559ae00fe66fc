//! Touch frame planning
//!
//! Hosts that only understand raw touch contacts (Win32 touch injection)
//! cannot take a [`GestureDescription`] as a whole. This module flattens
//! stroke descriptions and pointer events into timed frames of contact
//! samples that such a host replays one by one.

use std::time::Duration;

use crate::domain::core::Point;
use crate::gesture::backend::{
    GestureDescription, INJECTION_FRAME, PointerAction, PointerEvent, Stroke,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactPhase {
    Down,
    Update,
    Up,
    Cancel,
}

/// Position and phase of one contact within a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactSample {
    pub id: u32,
    pub point: Point,
    pub phase: ContactPhase,
}

/// Contacts to inject together at `at` after the gesture start
#[derive(Debug, Clone, PartialEq)]
pub struct TouchFrame {
    pub at: Duration,
    pub contacts: Vec<ContactSample>,
}

/// Strokes of one finger, in order
#[derive(Debug)]
struct Contact<'a> {
    id: u32,
    /// Continues a contact left pressed by an earlier gesture
    carried: bool,
    segments: Vec<&'a Stroke>,
}

impl Contact<'_> {
    fn start(&self) -> Duration {
        self.segments
            .first()
            .map(|s| s.start_offset)
            .unwrap_or_default()
    }

    fn end(&self) -> Duration {
        self.segments
            .iter()
            .map(|s| s.start_offset + s.duration)
            .max()
            .unwrap_or_default()
    }

    fn stays_pressed(&self) -> bool {
        self.segments.last().is_some_and(|s| s.will_continue)
    }

    fn position_at(&self, at: Duration) -> Point {
        let segment = self
            .segments
            .iter()
            .rev()
            .find(|s| s.start_offset <= at)
            .or(self.segments.first());
        match segment {
            Some(segment) => sample_path(&segment.path, progress(segment, at)),
            None => Point::default(),
        }
    }
}

fn progress(stroke: &Stroke, at: Duration) -> f32 {
    if stroke.duration.is_zero() {
        return 1.0;
    }
    let elapsed = at.saturating_sub(stroke.start_offset);
    (elapsed.as_secs_f32() / stroke.duration.as_secs_f32()).clamp(0.0, 1.0)
}

/// Position along an evenly timed polyline
fn sample_path(path: &[Point], t: f32) -> Point {
    match path {
        [] => Point::default(),
        [only] => *only,
        _ => {
            let scaled = t * (path.len() - 1) as f32;
            let index = (scaled.floor() as usize).min(path.len() - 2);
            path[index].lerp(path[index + 1], scaled - index as f32)
        }
    }
}

fn frame_index(at: Duration, round_up: bool) -> u64 {
    let frame = INJECTION_FRAME.as_micros().max(1);
    let micros = at.as_micros();
    let index = if round_up {
        micros.div_ceil(frame)
    } else {
        micros / frame
    };
    index as u64
}

fn group_contacts(gesture: &GestureDescription, carried: Option<u32>) -> Vec<Contact<'_>> {
    let mut contacts: Vec<Contact<'_>> = Vec::new();
    let mut next_id = 0;
    for stroke in &gesture.strokes {
        if stroke.continues_previous {
            if let Some(contact) = contacts.last_mut() {
                contact.segments.push(stroke);
                continue;
            }
            if let Some(id) = carried {
                contacts.push(Contact {
                    id,
                    carried: true,
                    segments: vec![stroke],
                });
                continue;
            }
        }
        if carried == Some(next_id) {
            next_id += 1;
        }
        contacts.push(Contact {
            id: next_id,
            carried: false,
            segments: vec![stroke],
        });
        next_id += 1;
    }
    contacts
}

/// Flattens a stroke description into touch frames
///
/// `carried` is the id of a contact still pressed from an earlier gesture; a
/// leading continued stroke then moves that contact instead of pressing a
/// new one. New contacts never reuse that id.
pub fn plan_gesture(gesture: &GestureDescription, carried: Option<u32>) -> Vec<TouchFrame> {
    let contacts = group_contacts(gesture, carried);
    let mut frames: Vec<TouchFrame> = Vec::new();

    for contact in &contacts {
        let first = frame_index(contact.start(), false);
        let mut last = frame_index(contact.end(), true).max(first);
        let presses = !contact.carried;
        let releases = !contact.stays_pressed();
        if presses && releases && last == first {
            last += 1;
        }

        for index in first..=last {
            let at = INJECTION_FRAME * index as u32;
            let sample_at = at.clamp(contact.start(), contact.end());
            let phase = if index == first && presses {
                ContactPhase::Down
            } else if index == last && releases {
                ContactPhase::Up
            } else {
                ContactPhase::Update
            };
            let sample = ContactSample {
                id: contact.id,
                point: contact.position_at(sample_at),
                phase,
            };
            match frames.iter_mut().find(|frame| frame.at == at) {
                Some(frame) => frame.contacts.push(sample),
                None => frames.push(TouchFrame {
                    at,
                    contacts: vec![sample],
                }),
            }
        }
    }

    frames.sort_by_key(|frame| frame.at);
    frames
}

/// The contact `frames` leave pressed, at its last sampled position
pub fn pressed_after(frames: &[TouchFrame]) -> Option<ContactSample> {
    let mut latest: Vec<ContactSample> = Vec::new();
    for sample in frames.iter().flat_map(|frame| frame.contacts.iter()) {
        match latest.iter_mut().find(|seen| seen.id == sample.id) {
            Some(seen) => *seen = *sample,
            None => latest.push(*sample),
        }
    }
    latest
        .into_iter()
        .rev()
        .find(|sample| matches!(sample.phase, ContactPhase::Down | ContactPhase::Update))
}

/// Contact samples for one injected pointer event
pub fn pointer_samples(event: &PointerEvent) -> Vec<ContactSample> {
    event
        .pointers
        .iter()
        .enumerate()
        .map(|(index, point)| {
            let phase = match event.action {
                PointerAction::Down => ContactPhase::Down,
                PointerAction::Move => ContactPhase::Update,
                PointerAction::PointerDown(n) if n == index => ContactPhase::Down,
                PointerAction::PointerUp(n) if n == index => ContactPhase::Up,
                PointerAction::PointerDown(_) | PointerAction::PointerUp(_) => {
                    ContactPhase::Update
                }
                PointerAction::Up => ContactPhase::Up,
                PointerAction::Cancel => ContactPhase::Cancel,
            };
            ContactSample {
                id: index as u32,
                point: *point,
                phase,
            }
        })
        .collect()
}
