// src/recorder.rs
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, warn};

use crate::drivers::ViewerError;

/// One line of the annotation log. Immutable once enqueued.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationRecord {
    /// Absolute timestamp of the annotation's first sample.
    pub onset: f64,
    pub duration: f64,
    pub label: String,
}

impl fmt::Display for AnnotationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.onset, self.duration, self.label)
    }
}

/// A label is written as the last field of a log line, so it must be
/// non-empty, single-line and trimmed.
pub fn validate_label(label: &str) -> Result<(), ViewerError> {
    if label.is_empty() || label.trim() != label || label.chars().any(char::is_control) {
        return Err(ViewerError::InvalidLabel(label.to_owned()));
    }
    Ok(())
}

/// A record that could not be written.
#[derive(Clone, Debug)]
pub struct PersistenceFailure {
    pub record: AnnotationRecord,
    pub message: String,
}

/// Totals returned when the writer shuts down.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub written: usize,
    pub failed: usize,
}

enum WriterMessage {
    Record(AnnotationRecord),
    Shutdown,
}

/// Cloneable enqueue side of a [`PersistenceWorker`]. Never blocks.
#[derive(Clone)]
pub struct RecordSender {
    tx: Sender<WriterMessage>,
}

impl RecordSender {
    pub fn enqueue(&self, record: AnnotationRecord) {
        if self.tx.send(WriterMessage::Record(record)).is_err() {
            warn!("annotation writer is gone; record dropped");
        }
    }
}

/// Appends annotation records to a log file from a dedicated thread.
///
/// Records are written in the order they were enqueued. Without a target
/// file every enqueue is a no-op.
pub struct PersistenceWorker {
    target: Option<PathBuf>,
    queue_tx: Option<Sender<WriterMessage>>,
    queue_rx: Option<Receiver<WriterMessage>>,
    handle: Option<JoinHandle<DrainReport>>,
    errors_tx: Sender<PersistenceFailure>,
    errors_rx: Receiver<PersistenceFailure>,
}

impl PersistenceWorker {
    /// Worker with no target: annotations are tracked but not persisted.
    pub fn new() -> Self {
        let (errors_tx, errors_rx) = unbounded();
        Self {
            target: None,
            queue_tx: None,
            queue_rx: None,
            handle: None,
            errors_tx,
            errors_rx,
        }
    }

    /// Worker that will append to `path`. Records enqueued before `start()`
    /// wait in the queue.
    pub fn with_target(path: impl Into<PathBuf>) -> Self {
        let mut worker = Self::new();
        worker.set_target(path);
        worker
    }

    /// Point the worker at a new file. A running writer is drained and
    /// closed first; the error channel is kept.
    pub fn set_target(&mut self, path: impl Into<PathBuf>) -> DrainReport {
        let report = self.stop();
        let (queue_tx, queue_rx) = unbounded();
        self.target = Some(path.into());
        self.queue_tx = Some(queue_tx);
        self.queue_rx = Some(queue_rx);
        report
    }

    pub fn target(&self) -> Option<&Path> {
        self.target.as_deref()
    }

    /// True while enqueued records will reach a file.
    pub fn has_target(&self) -> bool {
        self.queue_tx.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Failures reported by the writer thread, one per failed record.
    pub fn errors(&self) -> Receiver<PersistenceFailure> {
        self.errors_rx.clone()
    }

    pub fn sender(&self) -> Option<RecordSender> {
        self.queue_tx.clone().map(|tx| RecordSender { tx })
    }

    pub fn enqueue(&self, record: AnnotationRecord) {
        match &self.queue_tx {
            Some(tx) => {
                if tx.send(WriterMessage::Record(record)).is_err() {
                    warn!("annotation writer is gone; record dropped");
                }
            }
            None => debug!("no annotation target; not persisting {record}"),
        }
    }

    /// Open the target in append mode and start draining the queue.
    pub fn start(&mut self) -> Result<(), ViewerError> {
        if self.handle.is_some() {
            return Ok(());
        }
        let (Some(path), Some(queue_rx)) = (self.target.clone(), self.queue_rx.take()) else {
            return Ok(());
        };
        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => file,
            Err(err) => {
                self.queue_rx = Some(queue_rx);
                return Err(err.into());
            }
        };
        let errors_tx = self.errors_tx.clone();
        let handle = thread::Builder::new()
            .name("annotation-writer".into())
            .spawn(move || drain(file, queue_rx, errors_tx))?;
        info!("annotation log opened: {}", path.display());
        self.handle = Some(handle);
        Ok(())
    }

    /// Write everything still queued, close the file and release the target.
    /// Idempotent; returns what the writer managed to do.
    pub fn stop(&mut self) -> DrainReport {
        let report = match (self.queue_tx.take(), self.handle.take()) {
            (Some(tx), Some(handle)) => {
                let _ = tx.send(WriterMessage::Shutdown);
                drop(tx);
                match handle.join() {
                    Ok(report) => report,
                    Err(_) => {
                        error!("annotation writer panicked");
                        DrainReport::default()
                    }
                }
            }
            (Some(_), None) => {
                let pending = self.queue_rx.as_ref().map(|rx| rx.len()).unwrap_or(0);
                if pending > 0 {
                    warn!("annotation writer never started; {pending} records discarded");
                }
                DrainReport::default()
            }
            _ => DrainReport::default(),
        };
        if let Some(path) = self.target.take() {
            info!(
                "annotation log closed: {} ({} written, {} failed)",
                path.display(),
                report.written,
                report.failed
            );
        }
        self.queue_rx = None;
        report
    }
}

impl Default for PersistenceWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PersistenceWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

// Blocks on the queue until shutdown; a failed write is reported and the
// loop carries on with the next record.
fn drain(
    mut file: File,
    queue_rx: Receiver<WriterMessage>,
    errors_tx: Sender<PersistenceFailure>,
) -> DrainReport {
    let mut report = DrainReport::default();
    while let Ok(message) = queue_rx.recv() {
        let record = match message {
            WriterMessage::Record(record) => record,
            WriterMessage::Shutdown => break,
        };
        let line = format!("{record}\n");
        match file.write_all(line.as_bytes()).and_then(|_| file.flush()) {
            Ok(()) => report.written += 1,
            Err(err) => {
                report.failed += 1;
                error!("failed to write annotation '{record}': {err}");
                let _ = errors_tx.send(PersistenceFailure {
                    record,
                    message: err.to_string(),
                });
            }
        }
    }
    report
}
