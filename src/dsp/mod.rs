//! DSP Module
//!
//! Peaking biquads and the 36-band EQ graph built from them.

mod biquad;
mod eq_graph;

pub use biquad::{BiquadCoeffs, BiquadState};
pub use eq_graph::{
    AudioBackend, AudioSink, EqGraph, EqGraphController, MemoryBackend, NullBackend, NullSink,
    UnavailableBackend,
};
