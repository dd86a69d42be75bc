//! Signage Core Library
//!
//! This crate provides the core functionality for signage, an unattended
//! kiosk that rotates equipment slides and cover pages and lets an operator
//! edit them behind an idle-timed settings screen.
//!
//! # Architecture
//!
//! - **Store**: one JSON document per key, rewritten as a unit on every save
//! - **State machines**: slide rotation and idle timeout take time as input
//!   and never read the clock themselves
//!
//! # Quick Start
//!
//! ```text
//! let mut store = ContentStore::open(Config::load()?)?;
//!
//! // Add an item
//! let order = store.add_record(ContentRecord::item("Rig 7"))?;
//!
//! // Rotate it
//! let mut slider = SlideRotationEngine::default();
//! slider.init(&store.load(), Instant::now());
//! ```
//!
//! # Modules
//!
//! - `store`: Content store (main entry point)
//! - `models`: Records, timer settings and view modes
//! - `images`: Image attachment sessions and storage
//! - `slider`: Slide rotation engine
//! - `order`: Display-order editor
//! - `idle`: Idle timeout controller
//! - `forms`: Record and timer forms
//! - `navigation`: Screens and their idle policy
//! - `kiosk`: The running kiosk
//! - `storage`: Key-value persistence
//! - `config`: Application configuration

pub mod config;
pub mod forms;
pub mod idle;
pub mod images;
pub mod kiosk;
pub mod models;
pub mod navigation;
pub mod order;
pub mod slider;
pub mod storage;
pub mod store;

pub use config::Config;
pub use forms::{FormError, RecordForm, TimerForm};
pub use idle::{ActivityKind, IdleState, IdleTimeoutController};
pub use images::{FsImageStorage, ImageAttachment, ImageCandidate, ImageError, ImagePolicy};
pub use kiosk::{Kiosk, Session};
pub use models::{ContentRecord, RecordKind, RecordPatch, TimerSettings, ViewMode};
pub use navigation::{ExitDecision, Screen};
pub use order::OrderEditor;
pub use slider::{Slide, SlideRotationEngine, SlideText};
pub use storage::{StorageError, StorageResult};
pub use store::ContentStore;
