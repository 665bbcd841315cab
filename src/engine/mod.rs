//! Audio Engine Module
//!
//! Low-level pieces the session is built on:
//! - Interleaved audio buffers
//! - WAV decode/encode
//! - Virtual-time timer scheduling

pub mod buffer;
pub mod io;
pub mod scheduler;

pub use buffer::AudioBuffer;
pub use io::{decode_clip, decode_file, encode_wav};
pub use scheduler::{Scheduler, TimerId};
