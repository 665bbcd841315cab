//! Interleaved audio buffer
//!
//! Samples are stored interleaved: [L0, R0, L1, R1, ...]. The same type
//! carries decoded source clips, rendered blocks and recorded chunks.

use crate::error::{Result, RitualError};

#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    num_channels: usize,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a silent buffer
    pub fn new(num_channels: usize, num_frames: usize, sample_rate: u32) -> Self {
        let num_channels = num_channels.max(1);
        Self {
            samples: vec![0.0; num_channels * num_frames],
            num_channels,
            sample_rate,
        }
    }

    /// Create a buffer from existing interleaved samples
    pub fn from_interleaved(samples: Vec<f32>, num_channels: usize, sample_rate: u32) -> Result<Self> {
        if num_channels == 0 || samples.len() % num_channels != 0 {
            return Err(RitualError::UnsupportedFormat {
                format: format!(
                    "{} samples cannot be split into {} channels",
                    samples.len(),
                    num_channels
                ),
            });
        }
        Ok(Self {
            samples,
            num_channels,
            sample_rate,
        })
    }

    /// Mono sine tone, handy for fixtures and demos
    pub fn sine(frequency: f32, duration_secs: f32, sample_rate: u32) -> Self {
        let frames = (duration_secs * sample_rate as f32) as usize;
        let step = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;
        let samples = (0..frames).map(|i| 0.5 * (step * i as f32).sin()).collect();
        Self {
            samples,
            num_channels: 1,
            sample_rate,
        }
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Number of frames (samples per channel)
    pub fn num_frames(&self) -> usize {
        self.samples.len() / self.num_channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.num_frames() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn get(&self, frame: usize, channel: usize) -> Option<f32> {
        if frame < self.num_frames() && channel < self.num_channels {
            Some(self.samples[frame * self.num_channels + channel])
        } else {
            None
        }
    }

    pub fn set(&mut self, frame: usize, channel: usize, value: f32) {
        if frame < self.num_frames() && channel < self.num_channels {
            self.samples[frame * self.num_channels + channel] = value;
        }
    }

    /// Copy `count` frames starting at `start`, truncated at the end of the buffer
    pub fn slice_frames(&self, start: usize, count: usize) -> AudioBuffer {
        let start = start.min(self.num_frames());
        let end = start.saturating_add(count).min(self.num_frames());
        AudioBuffer {
            samples: self.samples[start * self.num_channels..end * self.num_channels].to_vec(),
            num_channels: self.num_channels,
            sample_rate: self.sample_rate,
        }
    }

    /// Check buffer contains finite audio
    pub fn is_valid(&self) -> bool {
        self.samples.iter().all(|s| s.is_finite())
    }

    /// RMS level in dB for a channel
    pub fn rms_db(&self, channel: usize) -> f64 {
        if channel >= self.num_channels || self.num_frames() == 0 {
            return f64::NEG_INFINITY;
        }

        let sum_sq: f64 = self
            .samples
            .iter()
            .skip(channel)
            .step_by(self.num_channels)
            .map(|&s| (s as f64).powi(2))
            .sum();

        let rms = (sum_sq / self.num_frames() as f64).sqrt();

        if rms > 0.0 {
            20.0 * rms.log10()
        } else {
            f64::NEG_INFINITY
        }
    }
}
