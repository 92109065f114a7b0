use std::thread;
use std::time::Duration;

use crossbeam_channel::unbounded;

use stream_viewer::drivers::{make_batch, ManualSource, SceneSurface, StreamScope};
use stream_viewer::{
    spawn_viewer, AnnotationRecord, DrainReport, MouseButton, PersistenceWorker, TimedMarker,
    Viewer, ViewerCommand, ViewerMessage, WindowParameters,
};

fn primed_viewer() -> Viewer<StreamScope<ManualSource>, SceneSurface> {
    let mut source = ManualSource::new(10.0, vec!["C3".into(), "C4".into()]);
    let mut trigger = vec![0.0; 300];
    trigger[250] = 3.0;
    source.push(make_batch(100.0, 10.0, vec![vec![1.0; 300], vec![-1.0; 300]], trigger));
    let scope = StreamScope::new(source, 30.0).unwrap();
    let params = WindowParameters {
        window_duration: 10.0,
        buffer_duration: 30.0,
        amplitude_scale: 20.0,
        selected_channels: vec![0, 1],
        show_events: true,
    };
    let mut viewer =
        Viewer::new(scope, SceneSurface::new(), params, Duration::from_millis(5), "bad").unwrap();
    // Take the data in before the engine starts so clicks see a full buffer.
    assert_eq!(viewer.tick().new_samples, 300);
    viewer
}

#[test]
fn engine_records_annotations_and_shuts_down_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("annotations.txt");
    let png_path = dir.path().join("window.png");

    let (tx_cmd, rx_cmd) = unbounded();
    let (tx_msg, rx_msg) = unbounded();
    let engine = spawn_viewer(primed_viewer(), tx_msg, rx_cmd).unwrap();

    tx_cmd.send(ViewerCommand::StartRecording(log_path.clone())).unwrap();
    tx_cmd
        .send(ViewerCommand::Click { plot_time: 7.0, button: MouseButton::Primary })
        .unwrap();
    tx_cmd
        .send(ViewerCommand::Click { plot_time: 5.0, button: MouseButton::Secondary })
        .unwrap();
    tx_cmd
        .send(ViewerCommand::Click { plot_time: 3.0, button: MouseButton::Primary })
        .unwrap();
    tx_cmd.send(ViewerCommand::SetWindowDuration(40.0)).unwrap();
    tx_cmd.send(ViewerCommand::Snapshot(png_path.clone())).unwrap();
    thread::sleep(Duration::from_millis(30));
    tx_cmd.send(ViewerCommand::Shutdown).unwrap();
    let viewer = engine.join().unwrap();

    let messages: Vec<ViewerMessage> = rx_msg.try_iter().collect();
    assert!(messages
        .iter()
        .any(|m| matches!(m, ViewerMessage::RecordingStatus(true))));
    assert!(messages
        .iter()
        .any(|m| matches!(m, ViewerMessage::Log(line) if line.contains("rejected"))));
    assert!(messages
        .iter()
        .any(|m| matches!(m, ViewerMessage::SnapshotWritten(p) if *p == png_path)));
    let added: Vec<_> = messages
        .iter()
        .filter_map(|m| match m {
            ViewerMessage::AnnotationAdded { onset, duration } => Some((*onset, *duration)),
            _ => None,
        })
        .collect();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].1, 4.0);
    assert!((added[0].0.unwrap() - 123.0).abs() < 1e-6);
    assert!(matches!(
        messages.last(),
        Some(ViewerMessage::Stopped { written: 1, failed: 0 })
    ));

    // The rejected window change left the 10 s window in place.
    assert_eq!(viewer.window().params().window_duration, 10.0);
    assert!(!viewer.is_recording());
    assert_eq!(viewer.markers().events().count(), 1);
    let annotation = viewer.markers().annotations().next().unwrap();
    assert_eq!(annotation.buffer_age(), 23.0);

    let contents = std::fs::read_to_string(&log_path).unwrap();
    let line = contents.lines().next().unwrap();
    let fields: Vec<&str> = line.split(' ').collect();
    assert!((fields[0].parse::<f64>().unwrap() - 123.0).abs() < 1e-6);
    assert_eq!(&fields[1..], &["4", "bad"]);

    let png = std::fs::read(&png_path).unwrap();
    assert_eq!(&png[1..4], b"PNG");
}

#[test]
fn dropping_the_command_channel_stops_the_engine() {
    let (tx_cmd, rx_cmd) = unbounded::<ViewerCommand>();
    let (tx_msg, rx_msg) = unbounded();
    let engine = spawn_viewer(primed_viewer(), tx_msg, rx_cmd).unwrap();
    drop(tx_cmd);
    let viewer = engine.join().unwrap();
    assert!(viewer.tick_stats().completed >= 1);
    assert!(rx_msg
        .try_iter()
        .any(|m| matches!(m, ViewerMessage::Stopped { written: 0, failed: 0 })));
}

#[test]
fn concurrent_producers_are_written_in_enqueue_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("annotations.txt");
    let mut worker = PersistenceWorker::with_target(&path);
    worker.start().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|producer| {
            let sender = worker.sender().unwrap();
            thread::spawn(move || {
                for i in 0..50 {
                    sender.enqueue(AnnotationRecord {
                        onset: i as f64,
                        duration: 1.0,
                        label: format!("p{producer}"),
                    });
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(worker.stop(), DrainReport { written: 200, failed: 0 });

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 200);
    // Each producer's own records keep their relative order.
    for producer in 0..4 {
        let label = format!("p{producer}");
        let onsets: Vec<f64> = contents
            .lines()
            .filter(|line| line.ends_with(&label))
            .map(|line| line.split(' ').next().unwrap().parse().unwrap())
            .collect();
        let expected: Vec<f64> = (0..50).map(|i| i as f64).collect();
        assert_eq!(onsets, expected);
    }
}
