//! Domain logic and core data structures
//!
//! This module contains pure logic that is independent of the host input
//! stack and of the async runtime.

pub mod core;
pub mod cursor;
pub mod grid;
pub mod keyboard;
