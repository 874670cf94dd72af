//! Low-level input navigation

pub mod cursor;

pub use cursor::{Checkpoint, Cursor};
