//! Crystallized artifact
//!
//! A still image of the scene plus the recorded audio as one WAV blob. The
//! audio part may be absent when recording was unsupported or failed.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::warn;
use uuid::Uuid;

use super::recorder::RecordingFormat;
use crate::engine::io::encode_wav;
use crate::grid::FinalEqState;

#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub id: Uuid,
    /// PNG-encoded snapshot
    pub image: Vec<u8>,
    /// WAV-encoded recording, if any
    pub audio: Option<Vec<u8>>,
    pub duration_secs: f64,
    pub created_at: DateTime<Utc>,
    /// Hex SHA-256 over image then audio bytes
    pub checksum: String,
    pub final_eq: FinalEqState,
}

impl Artifact {
    /// Assemble an artifact from a snapshot and recorded chunks.
    ///
    /// Audio problems are never fatal: an empty recording or an encoding
    /// failure yields an artifact without audio.
    pub fn assemble(
        image: Vec<u8>,
        chunks: Vec<Vec<f32>>,
        format: Option<RecordingFormat>,
        duration_secs: f64,
        final_eq: FinalEqState,
    ) -> Self {
        let audio = format.and_then(|format| {
            let samples: Vec<f32> = chunks.into_iter().flatten().collect();
            if samples.is_empty() {
                return None;
            }
            match encode_wav(&samples, format.num_channels, format.sample_rate) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!("[CAPTURE] Dropping audio, encoding failed: {}", e);
                    None
                }
            }
        });

        let checksum = checksum(&image, audio.as_deref());
        Self {
            id: Uuid::new_v4(),
            image,
            audio,
            duration_secs,
            created_at: Utc::now(),
            checksum,
            final_eq,
        }
    }

    pub fn has_audio(&self) -> bool {
        self.audio.as_ref().is_some_and(|a| !a.is_empty())
    }

    /// Recompute the checksum and compare
    pub fn verify(&self) -> bool {
        checksum(&self.image, self.audio.as_deref()) == self.checksum
    }
}

/// Hex SHA-256 over the image bytes followed by the audio bytes
pub fn checksum(image: &[u8], audio: Option<&[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image);
    if let Some(audio) = audio {
        hasher.update(audio);
    }
    format!("{:x}", hasher.finalize())
}
