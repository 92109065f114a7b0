use crate::drivers::ViewerError;
use crate::markers::EventKind;

/// What the plot window shows. Every field is explicit state owned by the
/// [`WindowController`]; nothing here is shared globally.
#[derive(Clone, Debug, PartialEq)]
pub struct WindowParameters {
    /// Visible seconds.
    pub window_duration: f64,
    /// Seconds retained by the scope; fixed for the lifetime of a viewer.
    pub buffer_duration: f64,
    /// Vertical spacing between stacked channels, in signal units.
    pub amplitude_scale: f64,
    /// Channels drawn top to bottom.
    pub selected_channels: Vec<usize>,
    /// Whether trigger events are drawn.
    pub show_events: bool,
}

impl WindowParameters {
    /// Seconds of buffer history not currently visible.
    pub fn buffer_plot_offset(&self) -> f64 {
        self.buffer_duration - self.window_duration
    }

    pub fn shows(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::Trigger => self.show_events,
        }
    }

    pub fn validate(&self, channel_count: usize) -> Result<(), ViewerError> {
        if self.buffer_duration <= 0.0 {
            return Err(ViewerError::InvalidBufferDuration(self.buffer_duration));
        }
        if !(self.window_duration > 0.0) {
            return Err(ViewerError::NonPositiveWindow(self.window_duration));
        }
        if self.window_duration > self.buffer_duration {
            return Err(ViewerError::WindowTooLong {
                window: self.window_duration,
                buffer: self.buffer_duration,
            });
        }
        if !(self.amplitude_scale > 0.0) {
            return Err(ViewerError::NonPositiveScale(self.amplitude_scale));
        }
        if self.selected_channels.is_empty() {
            return Err(ViewerError::NoChannelsSelected);
        }
        for (i, &channel) in self.selected_channels.iter().enumerate() {
            if channel >= channel_count {
                return Err(ViewerError::ChannelOutOfRange {
                    channel,
                    available: channel_count,
                });
            }
            if self.selected_channels[..i].contains(&channel) {
                return Err(ViewerError::DuplicateChannel(channel));
            }
        }
        Ok(())
    }
}

/// Owns the window parameters and the quantities derived from them.
///
/// Setters validate a candidate copy first, so a rejected change leaves the
/// previous parameters and derived values untouched.
#[derive(Debug)]
pub struct WindowController {
    params: WindowParameters,
    sample_rate: f64,
    channel_count: usize,
    buffer_plot_offset: f64,
    window_samples: usize,
    channel_offsets: Vec<f64>,
}

impl WindowController {
    pub fn new(
        params: WindowParameters,
        sample_rate: f64,
        channel_count: usize,
    ) -> Result<Self, ViewerError> {
        if sample_rate <= 0.0 {
            return Err(ViewerError::InvalidSampleRate);
        }
        params.validate(channel_count)?;
        let mut controller = Self {
            params,
            sample_rate,
            channel_count,
            buffer_plot_offset: 0.0,
            window_samples: 0,
            channel_offsets: Vec::new(),
        };
        controller.recompute();
        Ok(controller)
    }

    pub fn params(&self) -> &WindowParameters {
        &self.params
    }

    pub fn buffer_plot_offset(&self) -> f64 {
        self.buffer_plot_offset
    }

    /// Samples needed to fill the visible window.
    pub fn window_samples(&self) -> usize {
        self.window_samples
    }

    /// Vertical offset of each selected channel, in selection order.
    pub fn channel_offsets(&self) -> &[f64] {
        &self.channel_offsets
    }

    /// Y axis bounds fitting every stacked channel plus headroom for labels.
    pub fn y_range(&self) -> (f64, f64) {
        let scale = self.params.amplitude_scale;
        let n = self.params.selected_channels.len() as f64;
        (-scale * (n + 1.0), 1.5 * scale)
    }

    pub fn set_window_duration(&mut self, window_duration: f64) -> Result<(), ViewerError> {
        self.apply(WindowParameters {
            window_duration,
            ..self.params.clone()
        })
    }

    pub fn set_amplitude_scale(&mut self, amplitude_scale: f64) -> Result<(), ViewerError> {
        self.apply(WindowParameters {
            amplitude_scale,
            ..self.params.clone()
        })
    }

    pub fn set_selected_channels(&mut self, selected_channels: Vec<usize>) -> Result<(), ViewerError> {
        self.apply(WindowParameters {
            selected_channels,
            ..self.params.clone()
        })
    }

    pub fn set_show_events(&mut self, show_events: bool) {
        self.params.show_events = show_events;
    }

    fn apply(&mut self, candidate: WindowParameters) -> Result<(), ViewerError> {
        candidate.validate(self.channel_count)?;
        self.params = candidate;
        self.recompute();
        Ok(())
    }

    fn recompute(&mut self) {
        self.buffer_plot_offset = self.params.buffer_plot_offset();
        self.window_samples = (self.params.window_duration * self.sample_rate).ceil() as usize;
        let scale = self.params.amplitude_scale;
        self.channel_offsets = (0..self.params.selected_channels.len())
            .map(|k| -(k as f64) * scale)
            .collect();
    }
}
