// src/engine.rs
use std::io;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{select, Receiver, Sender};
use log::{error, info};

use crate::drivers::{PlotStyle, SceneSurface, Scope};
use crate::interaction::ClickOutcome;
use crate::markers::TimedMarker;
use crate::types::*;
use crate::viewer::Viewer;

/// Run `viewer` on its own thread until `Shutdown` arrives or the command
/// channel closes. The viewer is handed back when the thread ends.
pub fn spawn_viewer<S>(
    mut viewer: Viewer<S, SceneSurface>,
    tx: Sender<ViewerMessage>,
    rx_cmd: Receiver<ViewerCommand>,
) -> io::Result<JoinHandle<Viewer<S, SceneSurface>>>
where
    S: Scope + Send + 'static,
{
    thread::Builder::new().name("viewer-engine".into()).spawn(move || {
        let style = PlotStyle::default();
        let ticks = viewer.ticks();
        let failures = viewer.persistence_errors();
        let mut reported_drops = 0;

        match viewer.start() {
            Ok(()) => log_to(&tx, "viewer engine ready"),
            Err(err) => {
                error!("update loop failed to start: {err}");
                tx.send(ViewerMessage::Log(format!("update loop failed to start: {err}"))).ok();
            }
        }

        loop {
            select! {
                recv(rx_cmd) -> cmd => match cmd {
                    Ok(ViewerCommand::Shutdown) | Err(_) => break,
                    Ok(cmd) => handle_command(&mut viewer, cmd, &tx, &style),
                },
                recv(ticks) -> _ => {
                    viewer.tick();
                    let stats = viewer.tick_stats();
                    if stats.dropped > reported_drops {
                        reported_drops = stats.dropped;
                        tx.send(ViewerMessage::TickStats(stats)).ok();
                    }
                },
                recv(failures) -> failure => {
                    if let Ok(failure) = failure {
                        tx.send(ViewerMessage::PersistenceError(format!(
                            "{}: {}",
                            failure.record, failure.message
                        )))
                        .ok();
                    }
                },
            }
        }

        // Loop first so no tick runs against a closed log.
        let report = viewer.shutdown();
        for failure in failures.try_iter() {
            tx.send(ViewerMessage::PersistenceError(format!(
                "{}: {}",
                failure.record, failure.message
            )))
            .ok();
        }
        tx.send(ViewerMessage::TickStats(viewer.tick_stats())).ok();
        tx.send(ViewerMessage::Stopped {
            written: report.written,
            failed: report.failed,
        })
        .ok();
        info!("viewer engine stopped");
        viewer
    })
}

fn handle_command<S: Scope>(
    viewer: &mut Viewer<S, SceneSurface>,
    cmd: ViewerCommand,
    tx: &Sender<ViewerMessage>,
    style: &PlotStyle,
) {
    match cmd {
        ViewerCommand::Click { plot_time, button } => {
            if let ClickOutcome::Completed { annotation, record } = viewer.click(plot_time, button) {
                let duration = viewer
                    .markers()
                    .annotations()
                    .find(|a| a.id() == annotation)
                    .map(|a| a.duration())
                    .unwrap_or_default();
                tx.send(ViewerMessage::AnnotationAdded {
                    onset: record.map(|r| r.onset),
                    duration,
                })
                .ok();
            }
        }
        ViewerCommand::SetWindowDuration(seconds) => {
            report_result(tx, viewer.set_window_duration(seconds), "window duration")
        }
        ViewerCommand::SetAmplitudeScale(scale) => {
            report_result(tx, viewer.set_amplitude_scale(scale), "amplitude scale")
        }
        ViewerCommand::SetSelectedChannels(channels) => {
            report_result(tx, viewer.set_selected_channels(channels), "channel selection")
        }
        ViewerCommand::SetShowEvents(show) => viewer.set_show_events(show),
        ViewerCommand::SetLabel(label) => report_result(tx, viewer.set_label(&label), "annotation label"),
        ViewerCommand::StartRecording(path) => match viewer.start_recording(&path) {
            Ok(_) => {
                log_to(tx, &format!("recording annotations to {}", path.display()));
                tx.send(ViewerMessage::RecordingStatus(true)).ok();
            }
            Err(err) => {
                log_to(tx, &format!("could not start recording: {err}"));
                tx.send(ViewerMessage::RecordingStatus(false)).ok();
            }
        },
        ViewerCommand::StopRecording => {
            let report = viewer.stop_recording();
            log_to(
                tx,
                &format!("recording stopped ({} written, {} failed)", report.written, report.failed),
            );
            tx.send(ViewerMessage::RecordingStatus(false)).ok();
        }
        ViewerCommand::Snapshot(path) => match viewer.write_snapshot(&path, style) {
            Ok(()) => {
                tx.send(ViewerMessage::SnapshotWritten(path)).ok();
            }
            Err(err) => log_to(tx, &format!("snapshot failed: {err}")),
        },
        // Handled by the loop.
        ViewerCommand::Shutdown => {}
    }
}

fn report_result(tx: &Sender<ViewerMessage>, result: Result<(), crate::drivers::ViewerError>, what: &str) {
    match result {
        Ok(()) => log_to(tx, &format!("{what} updated")),
        Err(err) => log_to(tx, &format!("{what} rejected: {err}")),
    }
}

fn log_to(tx: &Sender<ViewerMessage>, line: &str) {
    info!("{line}");
    tx.send(ViewerMessage::Log(line.to_owned())).ok();
}
