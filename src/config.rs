//! Session configuration
//!
//! Loaded from a JSON file; every field has a default so partial files are
//! accepted. Two behaviors that varied between deployments, duration clamping
//! and the countdown clock source, are explicit options here.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RitualError};

/// How the session duration is derived from the source clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DurationPolicy {
    /// Session lasts exactly as long as the clip.
    #[default]
    Raw,
    /// Clip length clamped to `[min_secs, max_secs]`.
    Clamp { min_secs: f64, max_secs: f64 },
}

impl DurationPolicy {
    /// Resolve the session length for a clip of `clip_secs`.
    pub fn resolve(&self, clip_secs: f64) -> f64 {
        match *self {
            DurationPolicy::Raw => clip_secs,
            DurationPolicy::Clamp { min_secs, max_secs } => clip_secs.clamp(min_secs, max_secs),
        }
    }
}

/// Clock that drives the displayed countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CountdownMode {
    /// Fixed 1 s repeating timer, independent of audio time. May drift.
    #[default]
    WallClock,
    /// Remaining time derived from rendered audio frames on each tick.
    AudioClock,
}

/// Guidance hint texts and their timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HintSchedule {
    pub texts: Vec<String>,
    pub start_delay_ms: u64,
    pub display_ms: u64,
    pub gap_ms: u64,
    /// Minimum delay before the last hint; stretched to reach the final window.
    pub last_gap_ms: u64,
}

impl Default for HintSchedule {
    fn default() -> Self {
        Self {
            texts: vec![
                "Touch the grid to shape the sound".to_string(),
                "Each column is a frequency band, low to high".to_string(),
                "Higher rows lift a band, lower rows cut it".to_string(),
                "Use several fingers at once".to_string(),
                "The final window is open. Your last gestures become the print".to_string(),
            ],
            start_delay_ms: 2000,
            display_ms: 4000,
            gap_ms: 3000,
            last_gap_ms: 8000,
        }
    }
}

impl HintSchedule {
    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    pub fn display(&self) -> Duration {
        Duration::from_millis(self.display_ms)
    }

    pub fn gap(&self) -> Duration {
        Duration::from_millis(self.gap_ms)
    }

    pub fn last_gap(&self) -> Duration {
        Duration::from_millis(self.last_gap_ms)
    }
}

/// Complete configuration for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub duration_policy: DurationPolicy,
    pub countdown_mode: CountdownMode,
    /// Length of the closing window in seconds.
    pub final_window_secs: u32,
    /// Safety net for a recorder that never acknowledges stop.
    pub completion_fallback_ms: u64,
    /// Frames rendered per audio block.
    pub block_frames: usize,
    /// Q of every peaking band.
    pub band_q: f64,
    pub spark_probability: f64,
    pub max_particles: usize,
    pub spark_lifetime_secs: f32,
    pub hints: HintSchedule,
    /// Frames buffered by the recorder before it emits a chunk.
    pub recorder_chunk_frames: usize,
    pub snapshot_width: u32,
    pub snapshot_height: u32,
    /// Seed for spark randomness; entropy-seeded when absent.
    pub rng_seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_policy: DurationPolicy::Raw,
            countdown_mode: CountdownMode::WallClock,
            final_window_secs: 36,
            completion_fallback_ms: 500,
            block_frames: 512,
            band_q: 1.0,
            spark_probability: 0.3,
            max_particles: 200,
            spark_lifetime_secs: 1.2,
            hints: HintSchedule::default(),
            recorder_chunk_frames: 48_000,
            snapshot_width: 512,
            snapshot_height: 512,
            rng_seed: None,
        }
    }
}

impl SessionConfig {
    /// Load a configuration file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| RitualError::Config {
            reason: format!("cannot read {}: {}", path.display(), e),
        })?;
        let config: SessionConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write this configuration as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn completion_fallback(&self) -> Duration {
        Duration::from_millis(self.completion_fallback_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if let DurationPolicy::Clamp { min_secs, max_secs } = self.duration_policy {
            if !(min_secs > 0.0 && min_secs <= max_secs) {
                return Err(RitualError::Config {
                    reason: format!("clamp range [{}, {}] is empty", min_secs, max_secs),
                });
            }
        }
        if !(0.0..=1.0).contains(&self.spark_probability) {
            return Err(RitualError::Config {
                reason: format!("spark_probability {} outside [0, 1]", self.spark_probability),
            });
        }
        if self.block_frames == 0 || self.recorder_chunk_frames == 0 {
            return Err(RitualError::Config {
                reason: "block_frames and recorder_chunk_frames must be non-zero".to_string(),
            });
        }
        if self.band_q <= 0.0 {
            return Err(RitualError::Config {
                reason: format!("band_q must be positive, got {}", self.band_q),
            });
        }
        if self.snapshot_width == 0 || self.snapshot_height == 0 {
            return Err(RitualError::Config {
                reason: "snapshot dimensions must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}
