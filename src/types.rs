// src/types.rs
use std::path::PathBuf;

use crate::interaction::MouseButton;
use crate::update_loop::TickStats;

// Commands sent to the engine thread
#[derive(Clone, Debug)]
pub enum ViewerCommand {
    /// Click at plot time (seconds from the left edge of the window).
    Click { plot_time: f64, button: MouseButton },
    SetWindowDuration(f64),
    SetAmplitudeScale(f64),
    SetSelectedChannels(Vec<usize>),
    SetShowEvents(bool),
    SetLabel(String),
    StartRecording(PathBuf),
    StopRecording,
    Snapshot(PathBuf),
    Shutdown,
}

// Messages sent back by the engine thread
#[derive(Clone, Debug)]
pub enum ViewerMessage {
    Log(String),
    RecordingStatus(bool),
    AnnotationAdded { onset: Option<f64>, duration: f64 },
    PersistenceError(String),
    SnapshotWritten(PathBuf),
    TickStats(TickStats),
    Stopped { written: usize, failed: usize },
}
