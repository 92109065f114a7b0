use std::collections::VecDeque;
use std::f32::consts::TAU;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::drivers::ViewerError;

/// Single batch of multi-channel samples plus the trigger channel.
#[derive(Clone, Debug)]
pub struct SignalBatch {
    /// Absolute timestamp (seconds) of the first sample in the batch.
    pub first_timestamp: f64,
    pub sample_rate_hz: f64,
    pub samples: Vec<Vec<f32>>, // channels x samples
    pub trigger: Vec<f32>,      // one value per sample, 0 means no event
}

impl SignalBatch {
    pub fn validate(&self) -> Result<(), ViewerError> {
        if self.sample_rate_hz <= 0.0 {
            return Err(ViewerError::InvalidSampleRate);
        }
        let expected = self.trigger.len();
        for channel in &self.samples {
            if channel.len() != expected {
                return Err(ViewerError::SampleCountMismatch {
                    expected,
                    actual: channel.len(),
                });
            }
        }
        Ok(())
    }

    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }

    pub fn len(&self) -> usize {
        self.trigger.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trigger.is_empty()
    }
}

/// Trait representing something that can yield signal batches on demand.
pub trait SignalSource {
    fn sample_rate_hz(&self) -> f64;
    fn channel_labels(&self) -> &[String];
    /// Next pending batch, `None` when nothing new has arrived.
    fn next_batch(&mut self) -> Result<Option<SignalBatch>, ViewerError>;
}

/// In-memory source useful for tests and deterministic playback.
pub struct ManualSource {
    sample_rate_hz: f64,
    channel_labels: Vec<String>,
    queue: VecDeque<SignalBatch>,
}

impl ManualSource {
    pub fn new(sample_rate_hz: f64, channel_labels: Vec<String>) -> Self {
        Self {
            sample_rate_hz,
            channel_labels,
            queue: VecDeque::new(),
        }
    }

    pub fn push(&mut self, batch: SignalBatch) {
        self.queue.push_back(batch);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl SignalSource for ManualSource {
    fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    fn channel_labels(&self) -> &[String] {
        &self.channel_labels
    }

    fn next_batch(&mut self) -> Result<Option<SignalBatch>, ViewerError> {
        Ok(self.queue.pop_front())
    }
}

/// Synthetic source: sines plus noise, with a trigger pulse every
/// `trigger_interval` seconds. Paced by the wall clock.
pub struct SimulatedSource {
    sample_rate_hz: f64,
    channel_labels: Vec<String>,
    trigger_interval: f64,
    amplitude_uv: f32,
    noise_uv: f32,
    rng: StdRng,
    epoch: f64,
    started: Instant,
    produced: u64,
    next_trigger_value: u8,
}

impl SimulatedSource {
    pub fn new(channel_count: usize, sample_rate_hz: f64, seed: u64) -> Result<Self, ViewerError> {
        if sample_rate_hz <= 0.0 {
            return Err(ViewerError::InvalidSampleRate);
        }
        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        Ok(Self {
            sample_rate_hz,
            channel_labels: (0..channel_count).map(|i| format!("Ch{i}")).collect(),
            trigger_interval: 2.0,
            amplitude_uv: 20.0,
            noise_uv: 5.0,
            rng: StdRng::seed_from_u64(seed),
            epoch,
            started: Instant::now(),
            produced: 0,
            next_trigger_value: 1,
        })
    }

    pub fn with_trigger_interval(mut self, seconds: f64) -> Self {
        self.trigger_interval = seconds;
        self
    }

    pub fn with_amplitude(mut self, amplitude_uv: f32, noise_uv: f32) -> Self {
        self.amplitude_uv = amplitude_uv;
        self.noise_uv = noise_uv;
        self
    }

    /// Produce exactly `count` samples regardless of the wall clock.
    pub fn generate(&mut self, count: usize) -> SignalBatch {
        let fs = self.sample_rate_hz;
        let first_index = self.produced;
        let trigger_every = ((self.trigger_interval * fs).round() as u64).max(1);
        let mut samples = vec![Vec::with_capacity(count); self.channel_labels.len()];
        let mut trigger = Vec::with_capacity(count);
        for i in 0..count as u64 {
            let n = first_index + i;
            let t = (n as f64 / fs) as f32;
            for (c, channel) in samples.iter_mut().enumerate() {
                let freq = 1.0 + c as f32 * 0.5;
                let noise = if self.noise_uv > 0.0 {
                    self.rng.gen_range(-self.noise_uv..self.noise_uv)
                } else {
                    0.0
                };
                channel.push((TAU * freq * t).sin() * self.amplitude_uv + noise);
            }
            if n > 0 && n % trigger_every == 0 {
                trigger.push(self.next_trigger_value as f32);
                self.next_trigger_value = self.next_trigger_value.wrapping_add(1).max(1);
            } else {
                trigger.push(0.0);
            }
        }
        self.produced += count as u64;
        SignalBatch {
            first_timestamp: self.epoch + first_index as f64 / fs,
            sample_rate_hz: fs,
            samples,
            trigger,
        }
    }
}

impl SignalSource for SimulatedSource {
    fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    fn channel_labels(&self) -> &[String] {
        &self.channel_labels
    }

    fn next_batch(&mut self) -> Result<Option<SignalBatch>, ViewerError> {
        let due = (self.started.elapsed().as_secs_f64() * self.sample_rate_hz) as u64;
        if due <= self.produced {
            return Ok(None);
        }
        let count = (due - self.produced) as usize;
        Ok(Some(self.generate(count)))
    }
}

/// Lightweight helper to produce a batch from owned sample data.
pub fn make_batch(
    first_timestamp: f64,
    sample_rate_hz: f64,
    samples: Vec<Vec<f32>>,
    trigger: Vec<f32>,
) -> SignalBatch {
    SignalBatch {
        first_timestamp,
        sample_rate_hz,
        samples,
        trigger,
    }
}
