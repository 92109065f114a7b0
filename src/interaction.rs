//! Two-click annotation gesture.
//!
//! The first click arms the gesture and drops a provisional line that scrolls
//! with the data. The second click turns the span between the two points into
//! an annotation and queues its record for the log.

use log::{debug, info, warn};

use crate::coords;
use crate::drivers::{LineKind, RenderSurface, Scope, ViewerError};
use crate::markers::{MarkerId, MarkerStore};
use crate::recorder::{validate_label, AnnotationRecord, PersistenceWorker};

pub const DEFAULT_LABEL: &str = "bad";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GestureState {
    Idle,
    /// First click captured; `buffer_age` keeps aging until the second one.
    ArmedAt { line_id: MarkerId, buffer_age: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub enum ClickOutcome {
    Ignored,
    Armed { buffer_age: f64 },
    /// `record` is `None` only when the scope had no data to stamp it with.
    Completed {
        annotation: MarkerId,
        record: Option<AnnotationRecord>,
    },
}

/// Everything a click reads or mutates, borrowed from the viewer.
pub struct ClickContext<'a> {
    pub store: &'a mut MarkerStore,
    pub persistence: &'a PersistenceWorker,
    pub scope: &'a dyn Scope,
    pub surface: &'a mut dyn RenderSurface,
}

#[derive(Debug)]
pub struct InteractionController {
    state: GestureState,
    label: String,
}

impl InteractionController {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            state: GestureState::Idle,
            label: label.into(),
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, GestureState::ArmedAt { .. })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Rejects labels that would not fit on one log line.
    pub fn set_label(&mut self, label: impl Into<String>) -> Result<(), ViewerError> {
        let label = label.into();
        validate_label(&label)?;
        self.label = label;
        Ok(())
    }

    /// Handle a click at `plot_time` seconds from the left edge of the window.
    pub fn click(&mut self, plot_time: f64, button: MouseButton, ctx: ClickContext<'_>) -> ClickOutcome {
        if button != MouseButton::Primary {
            debug!("ignoring {button:?} click");
            return ClickOutcome::Ignored;
        }
        if !ctx.persistence.has_target() {
            debug!("no recording active; click ignored");
            return ClickOutcome::Ignored;
        }
        if !plot_time.is_finite() {
            warn!("ignoring click at non-finite position {plot_time}");
            return ClickOutcome::Ignored;
        }

        let offset = ctx.store.buffer_plot_offset();
        let buffer_age = coords::to_buffer_age(plot_time, offset);
        match self.state {
            GestureState::Idle => {
                let line_id = ctx.store.allocate_id();
                ctx.surface.add_line(line_id, plot_time, LineKind::Provisional, &self.label);
                self.state = GestureState::ArmedAt { line_id, buffer_age };
                debug!("annotation armed at {plot_time:.3}s");
                ClickOutcome::Armed { buffer_age }
            }
            GestureState::ArmedAt {
                line_id,
                buffer_age: first_age,
            } => {
                self.state = GestureState::Idle;
                ctx.surface.remove_line(line_id);
                self.complete(first_age, buffer_age, ctx)
            }
        }
    }

    fn complete(&self, first_age: f64, second_age: f64, ctx: ClickContext<'_>) -> ClickOutcome {
        let duration = (second_age - first_age).abs();
        let onset_age = first_age.min(second_age);
        let annotation = ctx.store.add_annotation(&self.label, duration, onset_age);

        let newest = ctx.scope.buffered_len().checked_sub(1);
        let Some(newest_timestamp) = newest.and_then(|i| ctx.scope.absolute_timestamp(i)) else {
            warn!("scope buffer is empty; annotation not logged");
            return ClickOutcome::Completed {
                annotation,
                record: None,
            };
        };
        let onset = coords::absolute_time_at(
            onset_age,
            ctx.scope.buffer_duration(),
            ctx.scope.sample_rate(),
            newest_timestamp,
        );
        let record = AnnotationRecord {
            onset,
            duration,
            label: self.label.clone(),
        };
        info!("annotation '{}' at {onset:.3} for {duration:.3}s", self.label);
        ctx.persistence.enqueue(record.clone());
        ClickOutcome::Completed {
            annotation,
            record: Some(record),
        }
    }

    /// Age the provisional line. The gesture is cancelled once the first
    /// click has left the buffer.
    pub fn advance(&mut self, elapsed: f64, buffer_plot_offset: f64, surface: &mut dyn RenderSurface) {
        let GestureState::ArmedAt { line_id, buffer_age } = self.state else {
            return;
        };
        let buffer_age = coords::advance(buffer_age, elapsed);
        if buffer_age < 0.0 {
            debug!("first click left the buffer; gesture cancelled");
            self.cancel(surface);
            return;
        }
        surface.update_line(line_id, coords::to_plot_age(buffer_age, buffer_plot_offset));
        self.state = GestureState::ArmedAt { line_id, buffer_age };
    }

    /// Drop an armed gesture and its provisional line. No-op when idle.
    pub fn cancel(&mut self, surface: &mut dyn RenderSurface) {
        if let GestureState::ArmedAt { line_id, .. } = self.state {
            surface.remove_line(line_id);
            self.state = GestureState::Idle;
        }
    }
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new(DEFAULT_LABEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{make_batch, ManualSource, SceneSurface, StreamScope};
    use crate::markers::TimedMarker;

    // 10 Hz, 30 s buffer filled with timestamps 1000.0, 1000.1, ...
    fn full_scope() -> StreamScope<ManualSource> {
        let mut source = ManualSource::new(10.0, vec!["C1".into()]);
        source.push(make_batch(1000.0, 10.0, vec![vec![0.0; 300]], vec![0.0; 300]));
        let mut scope = StreamScope::new(source, 30.0).unwrap();
        assert_eq!(scope.new_sample_count(), 300);
        scope
    }

    struct Rig {
        scope: StreamScope<ManualSource>,
        store: MarkerStore,
        persistence: PersistenceWorker,
        surface: SceneSurface,
        interaction: InteractionController,
    }

    impl Rig {
        fn recording() -> Self {
            Self {
                scope: full_scope(),
                store: MarkerStore::new(20.0),
                persistence: PersistenceWorker::with_target("unused-annotations.txt"),
                surface: SceneSurface::new(),
                interaction: InteractionController::default(),
            }
        }

        fn click(&mut self, plot_time: f64, button: MouseButton) -> ClickOutcome {
            self.interaction.click(
                plot_time,
                button,
                ClickContext {
                    store: &mut self.store,
                    persistence: &self.persistence,
                    scope: &self.scope,
                    surface: &mut self.surface,
                },
            )
        }
    }

    #[test]
    fn two_clicks_make_an_annotation() {
        let mut rig = Rig::recording();
        assert_eq!(rig.click(7.0, MouseButton::Primary), ClickOutcome::Armed { buffer_age: 27.0 });
        assert_eq!(rig.surface.lines().len(), 1);

        let ClickOutcome::Completed { annotation, record } = rig.click(3.0, MouseButton::Primary)
        else {
            panic!("gesture did not complete");
        };
        assert_eq!(rig.interaction.state(), GestureState::Idle);
        assert!(rig.surface.lines().is_empty());

        let stored = rig.store.annotations().next().unwrap();
        assert_eq!(stored.id(), annotation);
        assert_eq!(stored.duration(), 4.0);
        assert_eq!(stored.buffer_age(), 23.0);
        assert_eq!(stored.plot_age(), 3.0);

        let record = record.unwrap();
        assert!((record.onset - 1023.0).abs() < 1e-6);
        assert_eq!(record.duration, 4.0);
        assert_eq!(record.label, "bad");
    }

    #[test]
    fn clicks_without_recording_or_primary_button_are_ignored() {
        let mut rig = Rig::recording();
        rig.persistence = PersistenceWorker::new();
        assert_eq!(rig.click(3.0, MouseButton::Primary), ClickOutcome::Ignored);

        let mut rig = Rig::recording();
        assert_eq!(rig.click(3.0, MouseButton::Secondary), ClickOutcome::Ignored);
        assert_eq!(rig.click(f64::NAN, MouseButton::Primary), ClickOutcome::Ignored);
        assert_eq!(rig.interaction.state(), GestureState::Idle);
        assert!(rig.store.is_empty());
        assert!(rig.surface.lines().is_empty());
    }

    #[test]
    fn provisional_line_ages_and_is_cancelled_when_evicted() {
        let mut rig = Rig::recording();
        rig.click(-19.0, MouseButton::Primary);
        rig.interaction.advance(0.5, 20.0, &mut rig.surface);
        let line = rig.surface.lines().values().next().unwrap();
        assert!((line.x - -19.5).abs() < 1e-9);
        assert!(rig.interaction.is_armed());

        rig.interaction.advance(0.6, 20.0, &mut rig.surface);
        assert_eq!(rig.interaction.state(), GestureState::Idle);
        assert!(rig.surface.lines().is_empty());
        assert_eq!(rig.surface.stats().orphan_calls, 0);
    }

    #[test]
    fn cancel_leaves_no_partial_annotation() {
        let mut rig = Rig::recording();
        rig.click(4.0, MouseButton::Primary);
        rig.interaction.cancel(&mut rig.surface);
        rig.interaction.cancel(&mut rig.surface);
        assert!(rig.store.is_empty());
        assert!(rig.surface.lines().is_empty());
        assert_eq!(rig.surface.stats().lines_removed, 1);
        // Next click starts a fresh gesture.
        assert!(matches!(rig.click(5.0, MouseButton::Primary), ClickOutcome::Armed { .. }));
    }

    #[test]
    fn onset_before_buffered_data_is_extrapolated() {
        let mut rig = Rig::recording();
        let mut source = ManualSource::new(10.0, vec!["C1".into()]);
        source.push(make_batch(0.0, 10.0, vec![vec![0.0; 20]], vec![0.0; 20]));
        rig.scope = StreamScope::new(source, 30.0).unwrap();
        rig.scope.new_sample_count();
        // Only the newest 2 s hold data (stamped 0.0 ..= 1.9); the onset at
        // buffer age 22 lies 7.9 s before the newest sample.
        rig.click(2.0, MouseButton::Primary);
        let outcome = rig.click(9.0, MouseButton::Primary);
        let ClickOutcome::Completed { record: Some(record), .. } = outcome else {
            panic!("annotation was not logged: {outcome:?}");
        };
        assert!((record.onset - -6.0).abs() < 1e-6);
        assert_eq!(record.duration, 7.0);
        assert_eq!(rig.store.len(), 1);
    }

    #[test]
    fn empty_scope_keeps_annotation_but_skips_the_log() {
        let mut rig = Rig::recording();
        rig.scope = StreamScope::new(ManualSource::new(10.0, vec!["C1".into()]), 30.0).unwrap();
        rig.click(2.0, MouseButton::Primary);
        let outcome = rig.click(4.0, MouseButton::Primary);
        assert!(matches!(outcome, ClickOutcome::Completed { record: None, .. }));
        assert_eq!(rig.store.annotations().count(), 1);
    }

    #[test]
    fn labels_must_fit_on_one_log_line() {
        let mut interaction = InteractionController::default();
        assert!(matches!(
            interaction.set_label("eye\nblink"),
            Err(ViewerError::InvalidLabel(_))
        ));
        assert!(interaction.set_label(" blink").is_err());
        assert!(interaction.set_label("").is_err());
        assert_eq!(interaction.label(), DEFAULT_LABEL);
        interaction.set_label("eye blink").unwrap();
        assert_eq!(interaction.label(), "eye blink");
    }
}
