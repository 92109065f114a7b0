//! Real-time windowing and annotation tracking for a streaming signal viewer.
//!
//! A [`Viewer`] keeps a scrolling plot window over a scope's rolling buffer,
//! ages trigger events and user annotations through buffer time and window
//! time, and appends completed annotations to a log file from a background
//! writer.

pub mod config;
pub mod coords;
pub mod drivers;
pub mod engine;
pub mod interaction;
pub mod markers;
pub mod recorder;
pub mod types;
pub mod update_loop;
pub mod viewer;
pub mod window;

pub use config::ViewerConfig;
pub use drivers::ViewerError;
pub use engine::spawn_viewer;
pub use interaction::{ClickOutcome, InteractionController, MouseButton};
pub use markers::{EventKind, Marker, MarkerStore, TimedMarker};
pub use recorder::{AnnotationRecord, DrainReport, PersistenceWorker};
pub use types::{ViewerCommand, ViewerMessage};
pub use update_loop::{UpdateLoop, DEFAULT_TICK_PERIOD};
pub use viewer::Viewer;
pub use window::{WindowController, WindowParameters};
