use std::collections::VecDeque;

use crate::drivers::SignalBatch;
use crate::drivers::ViewerError;

/// Rolling buffer that stores the most recent `capacity` samples per channel,
/// together with the trigger channel and each sample's absolute timestamp.
///
/// Index 0 is the oldest retained sample; the newest sample sits at `len() - 1`.
pub struct SignalBuffer {
    per_channel: Vec<VecDeque<f32>>, // channel -> samples
    trigger: VecDeque<f32>,
    timestamps: VecDeque<f64>,
    sample_rate_hz: f64,
    capacity: usize,
}

impl SignalBuffer {
    pub fn with_history_seconds(
        channel_count: usize,
        sample_rate_hz: f64,
        history_seconds: f64,
    ) -> Result<Self, ViewerError> {
        if sample_rate_hz <= 0.0 {
            return Err(ViewerError::InvalidSampleRate);
        }
        if history_seconds <= 0.0 {
            return Err(ViewerError::InvalidBufferDuration(history_seconds));
        }
        let capacity = (sample_rate_hz * history_seconds).ceil() as usize;
        let per_channel = (0..channel_count)
            .map(|_| VecDeque::with_capacity(capacity))
            .collect();
        Ok(Self {
            per_channel,
            trigger: VecDeque::with_capacity(capacity),
            timestamps: VecDeque::with_capacity(capacity),
            sample_rate_hz,
            capacity,
        })
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn channel_count(&self) -> usize {
        self.per_channel.len()
    }

    pub fn len(&self) -> usize {
        self.trigger.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trigger.is_empty()
    }

    /// Append a batch, evicting the oldest samples past capacity.
    /// Returns the number of samples appended.
    pub fn push_batch(&mut self, batch: &SignalBatch) -> Result<usize, ViewerError> {
        batch.validate()?;
        if batch.sample_rate_hz != self.sample_rate_hz {
            return Err(ViewerError::SampleRateMismatch {
                expected: self.sample_rate_hz,
                actual: batch.sample_rate_hz,
            });
        }
        if batch.num_channels() != self.per_channel.len() {
            return Err(ViewerError::ChannelMismatch {
                expected: self.per_channel.len(),
                actual: batch.num_channels(),
            });
        }
        for (channel_queue, new_samples) in self.per_channel.iter_mut().zip(&batch.samples) {
            for &sample in new_samples {
                if channel_queue.len() == self.capacity {
                    channel_queue.pop_front();
                }
                channel_queue.push_back(sample);
            }
        }
        let dt = 1.0 / self.sample_rate_hz;
        for (i, &value) in batch.trigger.iter().enumerate() {
            if self.trigger.len() == self.capacity {
                self.trigger.pop_front();
                self.timestamps.pop_front();
            }
            self.trigger.push_back(value);
            self.timestamps
                .push_back(batch.first_timestamp + i as f64 * dt);
        }
        Ok(batch.len())
    }

    /// Newest `count` samples of one channel, oldest first.
    pub fn tail(&self, channel: usize, count: usize) -> Vec<f32> {
        self.per_channel
            .get(channel)
            .map(|queue| tail_of(queue, count))
            .unwrap_or_default()
    }

    pub fn trigger_tail(&self, count: usize) -> Vec<f32> {
        tail_of(&self.trigger, count)
    }

    pub fn timestamp(&self, index: usize) -> Option<f64> {
        self.timestamps.get(index).copied()
    }
}

fn tail_of<T: Copy>(queue: &VecDeque<T>, count: usize) -> Vec<T> {
    let skip = queue.len().saturating_sub(count);
    queue.iter().skip(skip).copied().collect()
}
