//! 36-band EQ processing graph
//!
//! Topology is one linear chain: source → band 0 → … → band 35, then the
//! rendered block fans out to the audible sink and is returned to the caller
//! as the capture tap. Both receive the same buffer, so the recording is
//! sample-identical to what was heard.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, warn};

use super::biquad::{BiquadCoeffs, BiquadState};
use crate::engine::AudioBuffer;
use crate::error::{Result, RitualError};
use crate::grid::{band_frequency, row_gain_db, NUM_BANDS};

/// Audible output of the graph
pub trait AudioSink {
    fn write(&mut self, block: &AudioBuffer);
}

/// Opens audio outputs. Failure leaves the controller in degraded mode.
pub trait AudioBackend {
    fn open_output(&mut self, sample_rate: u32, num_channels: usize) -> Result<Box<dyn AudioSink>>;
}

/// Sink that discards everything (headless rendering)
#[derive(Debug, Default)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn write(&mut self, _block: &AudioBuffer) {}
}

/// Backend whose outputs discard audio
#[derive(Debug, Default)]
pub struct NullBackend;

impl AudioBackend for NullBackend {
    fn open_output(&mut self, _sample_rate: u32, _num_channels: usize) -> Result<Box<dyn AudioSink>> {
        Ok(Box::new(NullSink))
    }
}

/// Backend that never initializes
#[derive(Debug, Default)]
pub struct UnavailableBackend;

impl AudioBackend for UnavailableBackend {
    fn open_output(&mut self, _sample_rate: u32, _num_channels: usize) -> Result<Box<dyn AudioSink>> {
        Err(RitualError::AudioUnavailable {
            reason: "no audio output device".to_string(),
        })
    }
}

/// Backend whose outputs append into a shared buffer the caller can inspect
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    heard: Rc<RefCell<Vec<f32>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interleaved samples written to every sink opened so far
    pub fn heard(&self) -> Vec<f32> {
        self.heard.borrow().clone()
    }
}

struct MemorySink {
    heard: Rc<RefCell<Vec<f32>>>,
}

impl AudioSink for MemorySink {
    fn write(&mut self, block: &AudioBuffer) {
        self.heard.borrow_mut().extend_from_slice(block.samples());
    }
}

impl AudioBackend for MemoryBackend {
    fn open_output(&mut self, _sample_rate: u32, _num_channels: usize) -> Result<Box<dyn AudioSink>> {
        Ok(Box::new(MemorySink {
            heard: Rc::clone(&self.heard),
        }))
    }
}

/// One peaking band with per-channel history
#[derive(Debug, Clone)]
struct PeakBand {
    frequency: f64,
    coeffs: BiquadCoeffs,
    states: Vec<BiquadState>,
}

/// The constructed graph for one source clip
pub struct EqGraph {
    source: AudioBuffer,
    cursor: usize,
    stopped: bool,
    q: f64,
    bands: Vec<PeakBand>,
    sink: Box<dyn AudioSink>,
}

impl EqGraph {
    pub fn new(source: AudioBuffer, q: f64, sink: Box<dyn AudioSink>) -> Self {
        let channels = source.num_channels();
        let bands = (0..NUM_BANDS)
            .map(|band| PeakBand {
                frequency: band_frequency(band),
                coeffs: BiquadCoeffs::unity(),
                states: vec![BiquadState::default(); channels],
            })
            .collect();

        Self {
            source,
            cursor: 0,
            stopped: false,
            q,
            bands,
            sink,
        }
    }

    /// Apply a gain to one band immediately (no smoothing)
    pub fn set_band_gain(&mut self, band: usize, gain_db: f64) {
        let sample_rate = self.source.sample_rate() as f64;
        let q = self.q;
        if let Some(b) = self.bands.get_mut(band) {
            b.coeffs = BiquadCoeffs::peaking(sample_rate, b.frequency, gain_db, q);
        }
    }

    /// Render up to `frames` frames. Returns the tap block, `None` once finished.
    pub fn render(&mut self, frames: usize) -> Option<AudioBuffer> {
        if self.is_finished() || frames == 0 {
            return None;
        }

        let mut block = self.source.slice_frames(self.cursor, frames);
        self.cursor += block.num_frames();

        let channels = block.num_channels();
        for (i, sample) in block.samples_mut().iter_mut().enumerate() {
            let channel = i % channels;
            let mut value = *sample as f64;
            for band in &mut self.bands {
                if !band.coeffs.is_unity() {
                    value = band.states[channel].process(value, &band.coeffs);
                }
            }
            *sample = value as f32;
        }

        self.sink.write(&block);
        Some(block)
    }

    /// Stop the source. Idempotent.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// True once the source is stopped or fully rendered
    pub fn is_finished(&self) -> bool {
        self.stopped || self.cursor >= self.source.num_frames()
    }

    /// True only when the source ran out on its own
    pub fn reached_end(&self) -> bool {
        !self.stopped && self.cursor >= self.source.num_frames()
    }

    pub fn frames_rendered(&self) -> usize {
        self.cursor
    }

    pub fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    pub fn num_channels(&self) -> usize {
        self.source.num_channels()
    }
}

/// Owns the graph for a session; every call is a no-op when degraded
#[derive(Default)]
pub struct EqGraphController {
    graph: Option<EqGraph>,
    degraded: bool,
}

impl EqGraphController {
    /// Build the graph for `source`. An output that fails to open degrades the
    /// controller instead of failing the session.
    pub fn construct(backend: &mut dyn AudioBackend, source: AudioBuffer, q: f64) -> Self {
        match backend.open_output(source.sample_rate(), source.num_channels()) {
            Ok(sink) => {
                debug!(
                    "[EQ] Graph constructed: {} bands, {} Hz, {} ch",
                    NUM_BANDS,
                    source.sample_rate(),
                    source.num_channels()
                );
                Self {
                    graph: Some(EqGraph::new(source, q, sink)),
                    degraded: false,
                }
            }
            Err(e) => {
                warn!("[EQ] Audio subsystem unavailable, continuing without sound: {}", e);
                Self {
                    graph: None,
                    degraded: true,
                }
            }
        }
    }

    /// Set a band's gain from a grid row (`row/35 · 36 − 18` dB)
    pub fn set_band_gain(&mut self, band: usize, row: usize) {
        if let Some(graph) = self.graph.as_mut() {
            graph.set_band_gain(band, row_gain_db(row));
        }
    }

    pub fn render(&mut self, frames: usize) -> Option<AudioBuffer> {
        self.graph.as_mut().and_then(|g| g.render(frames))
    }

    /// Stop the source, tolerating an already-stopped or missing graph
    pub fn stop_source(&mut self) {
        if let Some(graph) = self.graph.as_mut() {
            graph.stop();
        }
    }

    /// Drop the graph and its output
    pub fn release(&mut self) {
        if self.graph.take().is_some() {
            debug!("[EQ] Graph released");
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn is_playing(&self) -> bool {
        self.graph.as_ref().is_some_and(|g| !g.is_finished())
    }

    pub fn reached_end(&self) -> bool {
        self.graph.as_ref().is_some_and(|g| g.reached_end())
    }

    /// Seconds of audio rendered so far
    pub fn elapsed_secs(&self) -> Option<f64> {
        self.graph
            .as_ref()
            .map(|g| g.frames_rendered() as f64 / g.sample_rate().max(1) as f64)
    }

    /// Frames of audio still to render before the clip ends
    pub fn frames_until(&self, seconds: f64) -> usize {
        match self.graph.as_ref() {
            Some(g) => {
                let target = (seconds * g.sample_rate() as f64).round() as usize;
                target.saturating_sub(g.frames_rendered())
            }
            None => 0,
        }
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.graph.as_ref().map(|g| g.sample_rate())
    }

    pub fn num_channels(&self) -> Option<usize> {
        self.graph.as_ref().map(|g| g.num_channels())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rms(samples: &[f32]) -> f64 {
        let sum: f64 = samples.iter().map(|&s| (s as f64).powi(2)).sum();
        (sum / samples.len() as f64).sqrt()
    }

    #[test]
    fn test_flat_graph_is_transparent() {
        let source = AudioBuffer::sine(440.0, 0.1, 48000);
        let mut backend = MemoryBackend::new();
        let mut controller = EqGraphController::construct(&mut backend, source.clone(), 1.0);

        while controller.render(512).is_some() {}

        assert_eq!(backend.heard(), source.samples());
        assert!(controller.reached_end());
    }

    #[test]
    fn test_band_boost_raises_level() {
        // Band 18 is centred on 1280 Hz
        let source = AudioBuffer::sine(1280.0, 0.2, 48000);
        let mut backend = MemoryBackend::new();
        let mut controller = EqGraphController::construct(&mut backend, source.clone(), 1.0);
        controller.set_band_gain(18, 35);

        while controller.render(1024).is_some() {}

        let ratio = rms(&backend.heard()) / rms(source.samples());
        // +18 dB ≈ 7.9x; allow for the filter settling
        assert!(ratio > 6.0 && ratio < 9.0, "ratio = {}", ratio);
    }

    #[test]
    fn test_tap_matches_output() {
        let source = AudioBuffer::sine(300.0, 0.05, 48000);
        let mut backend = MemoryBackend::new();
        let mut controller = EqGraphController::construct(&mut backend, source, 1.0);
        controller.set_band_gain(7, 3);

        let mut tapped = Vec::new();
        while let Some(block) = controller.render(256) {
            tapped.extend_from_slice(block.samples());
        }
        assert_eq!(tapped, backend.heard());
    }

    #[test]
    fn test_degraded_controller_is_inert() {
        let source = AudioBuffer::sine(440.0, 0.1, 48000);
        let mut controller = EqGraphController::construct(&mut UnavailableBackend, source, 1.0);

        assert!(controller.is_degraded());
        controller.set_band_gain(0, 35);
        assert!(controller.render(512).is_none());
        assert!(!controller.reached_end());
        controller.stop_source();
        controller.release();
    }

    #[test]
    fn test_stop_is_idempotent_and_not_natural_end() {
        let source = AudioBuffer::sine(440.0, 0.1, 48000);
        let mut controller = EqGraphController::construct(&mut NullBackend, source, 1.0);
        controller.render(100);
        controller.stop_source();
        controller.stop_source();
        assert!(!controller.is_playing());
        assert!(!controller.reached_end());
        assert!(controller.render(100).is_none());
    }
}
