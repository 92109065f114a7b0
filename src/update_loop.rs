//! Fixed-period driver of the viewer.
//!
//! A timer thread signals ticks on a channel; the viewer's own thread runs
//! them. At most one tick is ever pending or executing: a tick that comes due
//! while the previous one has not finished is skipped and counted.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, tick, unbounded, Receiver, Sender};
use log::{debug, info, warn};

use crate::coords;
use crate::drivers::{RenderSurface, Scope, ViewerError};
use crate::interaction::InteractionController;
use crate::markers::{EventKind, MarkerStore};
use crate::window::WindowController;

pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(20);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
}

/// What one tick did.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TickOutcome {
    pub new_samples: usize,
    pub elapsed: f64,
    pub events_added: usize,
    pub culled: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    pub completed: u64,
    pub idle: u64,
    pub dropped: u64,
}

/// Everything a tick reads or mutates, borrowed from the viewer.
pub struct TickContext<'a> {
    pub scope: &'a mut dyn Scope,
    pub window: &'a WindowController,
    pub store: &'a mut MarkerStore,
    pub interaction: &'a mut InteractionController,
    pub surface: &'a mut dyn RenderSurface,
}

struct TickTimer {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

pub struct UpdateLoop {
    period: Duration,
    timer: Option<TickTimer>,
    tick_tx: Sender<Instant>,
    tick_rx: Receiver<Instant>,
    in_flight: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
    completed: u64,
    idle: u64,
}

impl UpdateLoop {
    pub fn new(period: Duration) -> Self {
        let (tick_tx, tick_rx) = unbounded();
        Self {
            period,
            timer: None,
            tick_tx,
            tick_rx,
            in_flight: Arc::new(AtomicBool::new(false)),
            dropped: Arc::new(AtomicU64::new(0)),
            completed: 0,
            idle: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn state(&self) -> LoopState {
        if self.timer.is_some() {
            LoopState::Running
        } else {
            LoopState::Stopped
        }
    }

    /// Tick signals to wait on. Each received signal should be followed by
    /// one call to [`UpdateLoop::tick`].
    pub fn ticks(&self) -> Receiver<Instant> {
        self.tick_rx.clone()
    }

    pub fn stats(&self) -> TickStats {
        TickStats {
            completed: self.completed,
            idle: self.idle,
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    pub fn start(&mut self) -> Result<(), ViewerError> {
        if self.timer.is_some() {
            return Ok(());
        }
        if self.period.is_zero() {
            return Err(ViewerError::InvalidTickPeriod);
        }
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ticker = tick(self.period);
        let tick_tx = self.tick_tx.clone();
        let in_flight = Arc::clone(&self.in_flight);
        let dropped = Arc::clone(&self.dropped);
        let handle = thread::Builder::new()
            .name("update-loop-timer".into())
            .spawn(move || loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> msg => {
                        let Ok(due) = msg else { break };
                        if in_flight.swap(true, Ordering::AcqRel) {
                            let total = dropped.fetch_add(1, Ordering::Relaxed) + 1;
                            debug!("tick skipped, previous still running ({total} dropped)");
                        } else if tick_tx.send(due).is_err() {
                            break;
                        }
                    }
                }
            })?;
        info!("update loop started ({} ms period)", self.period.as_millis());
        self.timer = Some(TickTimer { stop_tx, handle });
        Ok(())
    }

    /// Cancel the timer. Idempotent. A signal already delivered is
    /// discarded.
    pub fn stop(&mut self) {
        let Some(timer) = self.timer.take() else {
            return;
        };
        let _ = timer.stop_tx.send(());
        if timer.handle.join().is_err() {
            warn!("update loop timer panicked");
        }
        while self.tick_rx.try_recv().is_ok() {}
        self.in_flight.store(false, Ordering::Release);
        info!("update loop stopped after {} ticks", self.completed);
    }

    /// Run one tick.
    pub fn tick(&mut self, ctx: TickContext<'_>) -> TickOutcome {
        let outcome = run_tick(ctx);
        if outcome.new_samples == 0 {
            self.idle += 1;
        }
        self.completed += 1;
        self.in_flight.store(false, Ordering::Release);
        outcome
    }
}

impl Drop for UpdateLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_tick(ctx: TickContext<'_>) -> TickOutcome {
    let TickContext {
        scope,
        window,
        store,
        interaction,
        surface,
    } = ctx;
    let count = scope.new_sample_count();
    if count == 0 {
        return TickOutcome::default();
    }
    let sample_rate = scope.sample_rate();
    let elapsed = coords::elapsed_seconds(count, sample_rate);
    store.advance_all(elapsed);
    interaction.advance(elapsed, window.buffer_plot_offset(), surface);

    let triggers = scope.trigger_channel_tail(count);
    let n = triggers.len();
    let buffer_duration = scope.buffer_duration();
    let mut events_added = 0;
    for (k, &value) in triggers.iter().enumerate() {
        if value != 0.0 {
            let age = coords::arrival_age(k, n, buffer_duration, sample_rate);
            store.add_event(EventKind::Trigger, value, age);
            events_added += 1;
        }
    }

    let culled = store.cull_expired(surface);
    store.sync_visibility(window.params(), surface);

    let channels = &window.params().selected_channels;
    let tails = scope.buffer_tail(channels, window.window_samples());
    for ((&channel, offset), samples) in channels.iter().zip(window.channel_offsets()).zip(tails) {
        let shifted: Vec<f32> = samples.iter().map(|v| v + *offset as f32).collect();
        surface.set_waveform(channel, &shifted);
    }

    TickOutcome {
        new_samples: count,
        elapsed,
        events_added,
        culled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{make_batch, ManualSource, SceneSurface, StreamScope};
    use crate::markers::TimedMarker;
    use crate::window::WindowParameters;

    struct Rig {
        scope: StreamScope<ManualSource>,
        window: WindowController,
        store: MarkerStore,
        interaction: InteractionController,
        surface: SceneSurface,
    }

    impl Rig {
        // 10 Hz, 3 s buffer, 1 s window, two channels.
        fn new() -> Self {
            let source = ManualSource::new(10.0, vec!["C1".into(), "C2".into()]);
            let scope = StreamScope::new(source, 3.0).unwrap();
            let params = WindowParameters {
                window_duration: 1.0,
                buffer_duration: 3.0,
                amplitude_scale: 100.0,
                selected_channels: vec![1, 0],
                show_events: true,
            };
            let window = WindowController::new(params, 10.0, 2).unwrap();
            let store = MarkerStore::new(window.buffer_plot_offset());
            Self {
                scope,
                window,
                store,
                interaction: InteractionController::new("bad"),
                surface: SceneSurface::new(),
            }
        }

        fn feed(&mut self, n: usize, trigger_at: Option<usize>) {
            let mut trigger = vec![0.0; n];
            if let Some(k) = trigger_at {
                trigger[k] = 7.0;
            }
            let batch = make_batch(0.0, 10.0, vec![vec![1.0; n], vec![2.0; n]], trigger);
            self.scope.source_mut().push(batch);
        }

        fn tick(&mut self, update_loop: &mut UpdateLoop) -> TickOutcome {
            update_loop.tick(TickContext {
                scope: &mut self.scope,
                window: &self.window,
                store: &mut self.store,
                interaction: &mut self.interaction,
                surface: &mut self.surface,
            })
        }
    }

    #[test]
    fn empty_tick_is_a_noop() {
        let mut rig = Rig::new();
        let mut update_loop = UpdateLoop::new(DEFAULT_TICK_PERIOD);
        let outcome = rig.tick(&mut update_loop);
        assert_eq!(outcome, TickOutcome::default());
        assert_eq!(update_loop.stats(), TickStats { completed: 1, idle: 1, dropped: 0 });
        assert_eq!(rig.surface.stats().waveform_refreshes, 0);
    }

    #[test]
    fn trigger_becomes_event_and_ages_out() {
        let mut rig = Rig::new();
        let mut update_loop = UpdateLoop::new(DEFAULT_TICK_PERIOD);
        rig.feed(5, Some(4));
        let outcome = rig.tick(&mut update_loop);
        assert_eq!(outcome.new_samples, 5);
        assert_eq!(outcome.events_added, 1);
        let event = rig.store.events().next().unwrap();
        assert!((event.buffer_age() - 2.9).abs() < 1e-9);
        assert!((event.plot_age() - 0.9).abs() < 1e-9);
        assert!(event.visible());
        assert_eq!(rig.surface.lines().len(), 1);

        // One second later it has scrolled out of the window but is still buffered.
        rig.feed(10, None);
        rig.tick(&mut update_loop);
        assert!(rig.surface.lines().is_empty());
        assert_eq!(rig.store.len(), 1);

        // Two more seconds push it out of the buffer.
        rig.feed(19, None);
        rig.tick(&mut update_loop);
        assert_eq!(rig.store.len(), 1);
        rig.feed(1, None);
        let outcome = rig.tick(&mut update_loop);
        assert_eq!(outcome.culled, 1);
        assert!(rig.store.is_empty());
        let stats = rig.surface.stats();
        assert_eq!(stats.lines_added, stats.lines_removed);
        assert_eq!(stats.orphan_calls, 0);
    }

    #[test]
    fn waveforms_are_stacked_by_selection_order() {
        let mut rig = Rig::new();
        let mut update_loop = UpdateLoop::new(DEFAULT_TICK_PERIOD);
        rig.feed(15, None);
        rig.tick(&mut update_loop);
        // Window holds 10 samples; channel 1 is drawn first, channel 0 one scale below.
        assert_eq!(rig.surface.waveform(1).unwrap(), &[2.0; 10][..]);
        assert_eq!(rig.surface.waveform(0).unwrap(), &[-99.0; 10][..]);
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let mut update_loop = UpdateLoop::new(Duration::from_millis(5));
        assert_eq!(update_loop.state(), LoopState::Stopped);
        update_loop.start().unwrap();
        update_loop.start().unwrap();
        assert_eq!(update_loop.state(), LoopState::Running);
        let ticks = update_loop.ticks();
        assert!(ticks.recv_timeout(Duration::from_secs(2)).is_ok());
        update_loop.stop();
        update_loop.stop();
        assert_eq!(update_loop.state(), LoopState::Stopped);
    }

    #[test]
    fn overdue_ticks_are_dropped_not_queued() {
        let mut rig = Rig::new();
        let mut update_loop = UpdateLoop::new(Duration::from_millis(2));
        update_loop.start().unwrap();
        let ticks = update_loop.ticks();
        assert!(ticks.recv_timeout(Duration::from_secs(2)).is_ok());
        // Hold the tick long enough for several periods to pass.
        thread::sleep(Duration::from_millis(60));
        assert!(ticks.is_empty());
        rig.tick(&mut update_loop);
        update_loop.stop();
        assert!(update_loop.stats().dropped > 0);
        assert_eq!(update_loop.stats().completed, 1);
    }
}
