//! Recording of the graph's capture tap
//!
//! A recorder buffers tapped blocks into fixed-size chunks. Stopping is a
//! two-step handshake: `request_stop` flushes and begins stopping, and the
//! acknowledgement arrives later through `poll_stopped`. A recorder that never
//! acknowledges is tolerated by the session's fallback timer.

use crate::engine::AudioBuffer;
use crate::error::{Result, RitualError};

/// Layout of the recorded stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingFormat {
    pub sample_rate: u32,
    pub num_channels: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecorderState {
    #[default]
    Inactive,
    Recording,
    Stopping,
    Stopped,
}

pub trait Recorder {
    /// Begin recording. An error means recording is skipped for the session.
    fn start(&mut self, format: RecordingFormat) -> Result<()>;

    /// Append a tapped block; ignored unless recording
    fn write(&mut self, block: &AudioBuffer);

    /// Flush buffered audio and begin stopping
    fn request_stop(&mut self);

    /// True exactly once, when the recorder acknowledges it has stopped
    fn poll_stopped(&mut self) -> bool;

    /// Stop immediately without acknowledgement (teardown)
    fn abort(&mut self);

    fn state(&self) -> RecorderState;

    fn format(&self) -> Option<RecordingFormat>;

    /// Drain accumulated chunks of interleaved samples
    fn take_chunks(&mut self) -> Vec<Vec<f32>>;

    fn is_active(&self) -> bool {
        matches!(self.state(), RecorderState::Recording | RecorderState::Stopping)
    }
}

/// In-memory chunked recorder
#[derive(Debug, Clone)]
pub struct ChunkRecorder {
    state: RecorderState,
    format: Option<RecordingFormat>,
    chunk_frames: usize,
    pending: Vec<f32>,
    chunks: Vec<Vec<f32>>,
    acknowledges: bool,
    ack_pending: bool,
}

impl ChunkRecorder {
    pub fn new(chunk_frames: usize) -> Self {
        Self {
            state: RecorderState::Inactive,
            format: None,
            chunk_frames: chunk_frames.max(1),
            pending: Vec::new(),
            chunks: Vec::new(),
            acknowledges: true,
            ack_pending: false,
        }
    }

    /// A recorder that flushes on stop but never acknowledges it
    pub fn never_acknowledging(chunk_frames: usize) -> Self {
        Self {
            acknowledges: false,
            ..Self::new(chunk_frames)
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn flush(&mut self) {
        if !self.pending.is_empty() {
            self.chunks.push(std::mem::take(&mut self.pending));
        }
    }
}

impl Recorder for ChunkRecorder {
    fn start(&mut self, format: RecordingFormat) -> Result<()> {
        self.state = RecorderState::Recording;
        self.format = Some(format);
        self.pending.clear();
        self.chunks.clear();
        self.ack_pending = false;
        Ok(())
    }

    fn write(&mut self, block: &AudioBuffer) {
        if self.state != RecorderState::Recording {
            return;
        }
        self.pending.extend_from_slice(block.samples());

        let channels = self.format.map(|f| f.num_channels).unwrap_or(1).max(1);
        let chunk_len = self.chunk_frames * channels;
        while self.pending.len() >= chunk_len {
            let rest = self.pending.split_off(chunk_len);
            self.chunks.push(std::mem::replace(&mut self.pending, rest));
        }
    }

    fn request_stop(&mut self) {
        if self.state != RecorderState::Recording {
            return;
        }
        self.flush();
        self.state = RecorderState::Stopping;
        self.ack_pending = self.acknowledges;
    }

    fn poll_stopped(&mut self) -> bool {
        if self.ack_pending {
            self.ack_pending = false;
            self.state = RecorderState::Stopped;
            return true;
        }
        false
    }

    fn abort(&mut self) {
        if self.is_active() {
            self.flush();
            self.state = RecorderState::Stopped;
            self.ack_pending = false;
        }
    }

    fn state(&self) -> RecorderState {
        self.state
    }

    fn format(&self) -> Option<RecordingFormat> {
        self.format
    }

    fn take_chunks(&mut self) -> Vec<Vec<f32>> {
        std::mem::take(&mut self.chunks)
    }
}

/// Recorder for platforms without recording support; `start` always fails
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedRecorder;

impl Recorder for UnsupportedRecorder {
    fn start(&mut self, _format: RecordingFormat) -> Result<()> {
        Err(RitualError::RecordingUnavailable {
            reason: "recording is not supported here".to_string(),
        })
    }

    fn write(&mut self, _block: &AudioBuffer) {}

    fn request_stop(&mut self) {}

    fn poll_stopped(&mut self) -> bool {
        false
    }

    fn abort(&mut self) {}

    fn state(&self) -> RecorderState {
        RecorderState::Inactive
    }

    fn format(&self) -> Option<RecordingFormat> {
        None
    }

    fn take_chunks(&mut self) -> Vec<Vec<f32>> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MONO: RecordingFormat = RecordingFormat {
        sample_rate: 48000,
        num_channels: 1,
    };

    #[test]
    fn test_chunks_split_at_size() {
        let mut recorder = ChunkRecorder::new(100);
        recorder.start(MONO).unwrap();
        recorder.write(&AudioBuffer::new(1, 250, 48000));
        assert_eq!(recorder.chunk_count(), 2);

        recorder.request_stop();
        assert_eq!(recorder.chunk_count(), 3);
        let sizes: Vec<_> = recorder.take_chunks().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
    }

    #[test]
    fn test_stop_acknowledged_once() {
        let mut recorder = ChunkRecorder::new(100);
        recorder.start(MONO).unwrap();
        assert!(!recorder.poll_stopped());
        recorder.request_stop();
        assert_eq!(recorder.state(), RecorderState::Stopping);
        assert!(recorder.poll_stopped());
        assert!(!recorder.poll_stopped());
        assert_eq!(recorder.state(), RecorderState::Stopped);
    }

    #[test]
    fn test_never_acknowledging_still_flushes() {
        let mut recorder = ChunkRecorder::never_acknowledging(100);
        recorder.start(MONO).unwrap();
        recorder.write(&AudioBuffer::new(1, 10, 48000));
        recorder.request_stop();
        for _ in 0..10 {
            assert!(!recorder.poll_stopped());
        }
        assert_eq!(recorder.take_chunks().len(), 1);
    }

    #[test]
    fn test_writes_ignored_when_inactive() {
        let mut recorder = ChunkRecorder::new(10);
        recorder.write(&AudioBuffer::new(1, 50, 48000));
        assert_eq!(recorder.chunk_count(), 0);
        recorder.abort();
        assert_eq!(recorder.state(), RecorderState::Inactive);
    }

    #[test]
    fn test_unsupported_recorder() {
        let mut recorder = UnsupportedRecorder;
        assert!(recorder.start(MONO).is_err());
        assert!(!recorder.is_active());
    }
}
