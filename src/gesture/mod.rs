//! Gesture synthesis
//!
//! Geometry of scrolls and pinches, the backend contract with its two
//! strategies, and the manager that selects between them.

pub mod backend;
pub mod geometry;
pub mod manager;
pub mod privileged;
pub mod standard;
pub mod visualization;

pub use backend::{BackendError, GestureBackend, PointerInjector, StrokeDispatcher};
pub use manager::{GestureManager, PrivilegedHost, StrategyKind};
pub use privileged::{PrivilegedConnection, ServiceStatus};
