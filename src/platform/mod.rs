//! Host implementations of the gesture capabilities
//!
//! - `recording`: scripted host, built for unit tests only
//! - [`tracing_host`]: dry-run host that logs every gesture
//! - [`touch`]: stroke-to-touch-frame planning shared by contact hosts
//! - `win32`: touch injection on Windows

#[cfg(test)]
pub mod recording;
pub mod touch;
pub mod tracing_host;
#[cfg(windows)]
pub mod win32;
