//! Storage layer
//!
//! Durable key-value persistence for the kiosk state.
//!
//! ## Keys
//!
//! - `slideData`: the ordered array of content records
//! - `coverData`: legacy singleton cover
//! - `timerSettings`: rotation and idle timer durations
//! - `path`: last visited top-level view
//!
//! Values are whole JSON documents; every save replaces the value as a unit.

pub mod error;
pub mod persistence;

pub use error::{StorageError, StorageResult};
pub use persistence::{FileBackend, KvBackend, MemoryBackend};

/// Key holding the content record collection
pub const KEY_SLIDES: &str = "slideData";
/// Key holding the legacy singleton cover
pub const KEY_COVER: &str = "coverData";
/// Key holding timer settings
pub const KEY_TIMERS: &str = "timerSettings";
/// Key holding the last visited top-level view
pub const KEY_PATH: &str = "path";
