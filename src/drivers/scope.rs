use log::warn;

use crate::drivers::{SignalBuffer, SignalSource, ViewerError};

/// Acquisition side consumed by the viewer core.
///
/// A scope retains the last `buffer_duration()` seconds of signal. Sample
/// indices count from the oldest retained sample.
pub trait Scope {
    fn sample_rate(&self) -> f64;
    fn buffer_duration(&self) -> f64;
    fn channel_count(&self) -> usize;
    fn channel_label(&self, channel: usize) -> Option<&str>;
    /// Samples appended since the previous call. Pulls pending data from the
    /// underlying stream as a side effect.
    fn new_sample_count(&mut self) -> usize;
    /// Number of samples currently retained.
    fn buffered_len(&self) -> usize;
    /// Newest `count` samples of each requested channel, oldest first.
    fn buffer_tail(&self, channels: &[usize], count: usize) -> Vec<Vec<f32>>;
    fn trigger_channel_tail(&self, count: usize) -> Vec<f32>;
    fn absolute_timestamp(&self, sample_index: usize) -> Option<f64>;
}

/// Scope backed by a rolling buffer fed from a [`SignalSource`].
pub struct StreamScope<S: SignalSource> {
    source: S,
    buffer: SignalBuffer,
    buffer_duration: f64,
    channel_labels: Vec<String>,
}

impl<S: SignalSource> StreamScope<S> {
    pub fn new(source: S, buffer_duration: f64) -> Result<Self, ViewerError> {
        let channel_labels = source.channel_labels().to_vec();
        let buffer = SignalBuffer::with_history_seconds(
            channel_labels.len(),
            source.sample_rate_hz(),
            buffer_duration,
        )?;
        Ok(Self {
            source,
            buffer,
            buffer_duration,
            channel_labels,
        })
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: SignalSource> Scope for StreamScope<S> {
    fn sample_rate(&self) -> f64 {
        self.buffer.sample_rate_hz()
    }

    fn buffer_duration(&self) -> f64 {
        self.buffer_duration
    }

    fn channel_count(&self) -> usize {
        self.buffer.channel_count()
    }

    fn channel_label(&self, channel: usize) -> Option<&str> {
        self.channel_labels.get(channel).map(String::as_str)
    }

    fn new_sample_count(&mut self) -> usize {
        let mut appended = 0;
        loop {
            match self.source.next_batch() {
                Ok(Some(batch)) => match self.buffer.push_batch(&batch) {
                    Ok(n) => appended += n,
                    Err(err) => warn!("dropping malformed batch: {err}"),
                },
                Ok(None) => break,
                Err(err) => {
                    warn!("signal source failed: {err}");
                    break;
                }
            }
        }
        appended
    }

    fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn buffer_tail(&self, channels: &[usize], count: usize) -> Vec<Vec<f32>> {
        channels
            .iter()
            .map(|&channel| self.buffer.tail(channel, count))
            .collect()
    }

    fn trigger_channel_tail(&self, count: usize) -> Vec<f32> {
        self.buffer.trigger_tail(count)
    }

    fn absolute_timestamp(&self, sample_index: usize) -> Option<f64> {
        self.buffer.timestamp(sample_index)
    }
}
