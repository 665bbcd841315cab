//! Capture & Crystallization
//!
//! Recorder seam and artifact assembly. The crystallization sequence itself
//! is driven by the session, which owns the latch that decides when the
//! recorder is done.

mod artifact;
mod latch;
mod recorder;

pub use artifact::{checksum, Artifact};
pub use latch::{CompletionLatch, CompletionSource};
pub use recorder::{ChunkRecorder, Recorder, RecorderState, RecordingFormat, UnsupportedRecorder};
