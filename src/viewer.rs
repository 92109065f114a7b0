// src/viewer.rs
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use log::{info, warn};

use crate::drivers::{render_scene_png, PlotStyle, RenderSurface, SceneSurface, Scope, ViewerError};
use crate::interaction::{ClickContext, ClickOutcome, InteractionController, MouseButton};
use crate::markers::MarkerStore;
use crate::recorder::{validate_label, DrainReport, PersistenceFailure, PersistenceWorker};
use crate::update_loop::{TickContext, TickOutcome, TickStats, UpdateLoop};
use crate::window::{WindowController, WindowParameters};

/// The windowing and annotation core, bound to one scope and one surface.
///
/// Everything here runs on the thread that owns the viewer; only the
/// annotation writer and the tick timer live on their own threads.
pub struct Viewer<S: Scope, R: RenderSurface> {
    scope: S,
    surface: R,
    window: WindowController,
    store: MarkerStore,
    interaction: InteractionController,
    persistence: PersistenceWorker,
    update_loop: UpdateLoop,
}

impl<S: Scope, R: RenderSurface> Viewer<S, R> {
    /// `params.buffer_duration` is replaced by the scope's own.
    pub fn new(
        scope: S,
        mut surface: R,
        mut params: WindowParameters,
        tick_period: Duration,
        label: &str,
    ) -> Result<Self, ViewerError> {
        validate_label(label)?;
        params.buffer_duration = scope.buffer_duration();
        let window = WindowController::new(params, scope.sample_rate(), scope.channel_count())?;
        surface.set_viewport(window.params().window_duration, window.y_range());
        let store = MarkerStore::new(window.buffer_plot_offset());
        Ok(Self {
            scope,
            surface,
            window,
            store,
            interaction: InteractionController::new(label),
            persistence: PersistenceWorker::new(),
            update_loop: UpdateLoop::new(tick_period),
        })
    }

    pub fn scope(&self) -> &S {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut S {
        &mut self.scope
    }

    pub fn surface(&self) -> &R {
        &self.surface
    }

    pub fn window(&self) -> &WindowController {
        &self.window
    }

    pub fn markers(&self) -> &MarkerStore {
        &self.store
    }

    pub fn interaction(&self) -> &InteractionController {
        &self.interaction
    }

    pub fn tick_stats(&self) -> TickStats {
        self.update_loop.stats()
    }

    pub fn ticks(&self) -> Receiver<Instant> {
        self.update_loop.ticks()
    }

    pub fn start(&mut self) -> Result<(), ViewerError> {
        self.update_loop.start()
    }

    pub fn stop(&mut self) {
        self.update_loop.stop();
    }

    pub fn tick(&mut self) -> TickOutcome {
        self.update_loop.tick(TickContext {
            scope: &mut self.scope,
            window: &self.window,
            store: &mut self.store,
            interaction: &mut self.interaction,
            surface: &mut self.surface,
        })
    }

    pub fn click(&mut self, plot_time: f64, button: MouseButton) -> ClickOutcome {
        let outcome = self.interaction.click(
            plot_time,
            button,
            ClickContext {
                store: &mut self.store,
                persistence: &self.persistence,
                scope: &self.scope,
                surface: &mut self.surface,
            },
        );
        if matches!(outcome, ClickOutcome::Completed { .. }) {
            self.store.sync_visibility(self.window.params(), &mut self.surface);
        }
        outcome
    }

    pub fn set_window_duration(&mut self, window_duration: f64) -> Result<(), ViewerError> {
        self.window.set_window_duration(window_duration)?;
        self.interaction.cancel(&mut self.surface);
        self.reconfigure();
        info!("window duration set to {window_duration}s");
        Ok(())
    }

    pub fn set_amplitude_scale(&mut self, amplitude_scale: f64) -> Result<(), ViewerError> {
        self.window.set_amplitude_scale(amplitude_scale)?;
        self.reconfigure();
        Ok(())
    }

    pub fn set_selected_channels(&mut self, channels: Vec<usize>) -> Result<(), ViewerError> {
        let previous = self.window.params().selected_channels.clone();
        self.window.set_selected_channels(channels)?;
        self.interaction.cancel(&mut self.surface);
        for channel in previous {
            if !self.window.params().selected_channels.contains(&channel) {
                self.surface.remove_waveform(channel);
            }
        }
        self.reconfigure();
        Ok(())
    }

    pub fn set_show_events(&mut self, show_events: bool) {
        self.window.set_show_events(show_events);
        self.store.sync_visibility(self.window.params(), &mut self.surface);
    }

    pub fn set_label(&mut self, label: &str) -> Result<(), ViewerError> {
        self.interaction.set_label(label)
    }

    pub fn is_recording(&self) -> bool {
        self.persistence.is_running()
    }

    pub fn recording_target(&self) -> Option<&Path> {
        self.persistence.target()
    }

    /// Append annotations to `path` from now on. A previous recording is
    /// drained and closed first; its report is returned.
    pub fn start_recording(&mut self, path: impl Into<PathBuf>) -> Result<DrainReport, ViewerError> {
        self.interaction.cancel(&mut self.surface);
        let report = self.persistence.set_target(path);
        if let Err(err) = self.persistence.start() {
            self.persistence.stop();
            return Err(err);
        }
        Ok(report)
    }

    pub fn stop_recording(&mut self) -> DrainReport {
        self.interaction.cancel(&mut self.surface);
        self.persistence.stop()
    }

    pub fn persistence_errors(&self) -> Receiver<PersistenceFailure> {
        self.persistence.errors()
    }

    /// Stop ticking, then flush and close the annotation log.
    pub fn shutdown(&mut self) -> DrainReport {
        self.update_loop.stop();
        self.interaction.cancel(&mut self.surface);
        let report = self.persistence.stop();
        if report.failed > 0 {
            warn!("{} annotations could not be written", report.failed);
        }
        report
    }

    fn reconfigure(&mut self) {
        self.store.rebase(
            self.window.params(),
            self.window.buffer_plot_offset(),
            &mut self.surface,
        );
        self.surface
            .set_viewport(self.window.params().window_duration, self.window.y_range());
    }
}

impl<S: Scope> Viewer<S, SceneSurface> {
    pub fn snapshot_png(&self, style: &PlotStyle) -> Result<Vec<u8>, ViewerError> {
        render_scene_png(&self.surface, style)
    }

    pub fn write_snapshot(&self, path: &Path, style: &PlotStyle) -> Result<(), ViewerError> {
        let png = self.snapshot_png(style)?;
        std::fs::write(path, png)?;
        info!("snapshot written to {}", path.display());
        Ok(())
    }
}
