//! Ritual - gesture-driven EQ session engine
//!
//! A performer plays a 36×36 grid for a bounded session ("ritual"). Each
//! accepted gesture sets the gain of one band of a 36-band EQ over a source
//! clip and lights the matching cell of a 3D scene. When the ritual ends the
//! session crystallizes into a Sound Print, an image plus the recorded audio,
//! which the library keeps in public, private and trash collections.
//!
//! # Architecture
//!
//! - [`input`]: pointer/touch coordinates to grid cells
//! - [`dsp`]: the EQ graph and its audio output seam
//! - [`visual`]: cell columns, sparks, the closing ribbon, snapshots
//! - [`session`]: lifecycle state machine, countdown, hints, events
//! - [`capture`]: recorder seam, completion latch, artifact assembly
//! - [`library`]: bounded collections over a keyed store

pub mod capture;
pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod grid;
pub mod input;
pub mod library;
pub mod session;
pub mod visual;

pub use capture::Artifact;
pub use config::SessionConfig;
pub use error::{Result, RitualError};
pub use library::{Collection, Library, Privacy, SoundPrint};
pub use session::{Session, SessionEvent, SessionState};
