//! Gesture streams for headless performances
//!
//! A script is a JSON file of timestamped contact sets on a surface. Without
//! a script, contacts are drawn at random over the whole surface.

use std::fs;
use std::path::Path;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::input::{Contact, SurfaceRect};

/// Contacts landing together at `at_ms` after the ritual starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedGesture {
    pub at_ms: u64,
    pub contacts: Vec<Contact>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureScript {
    pub surface: SurfaceRect,
    pub gestures: Vec<ScriptedGesture>,
}

impl GestureScript {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut script: GestureScript = serde_json::from_str(&content)?;
        script.gestures.sort_by_key(|g| g.at_ms);
        Ok(script)
    }
}

/// Source of contact sets as performance time advances
pub enum GestureStream {
    Scripted {
        script: GestureScript,
        next: usize,
    },
    Random {
        surface: SurfaceRect,
        rng: SmallRng,
        interval: Duration,
        next_at: Duration,
    },
}

impl GestureStream {
    pub fn scripted(script: GestureScript) -> Self {
        GestureStream::Scripted { script, next: 0 }
    }

    /// Random single contacts at `rate` per second
    pub fn random(surface: SurfaceRect, rate: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let interval = Duration::from_secs_f64(1.0 / rate.max(0.01));
        GestureStream::Random {
            surface,
            rng,
            interval,
            next_at: interval,
        }
    }

    pub fn surface(&self) -> SurfaceRect {
        match self {
            GestureStream::Scripted { script, .. } => script.surface,
            GestureStream::Random { surface, .. } => *surface,
        }
    }

    /// Contact sets due at or before `elapsed`, in order
    pub fn due(&mut self, elapsed: Duration) -> Vec<Vec<Contact>> {
        let mut out = Vec::new();
        match self {
            GestureStream::Scripted { script, next } => {
                while let Some(gesture) = script.gestures.get(*next) {
                    if Duration::from_millis(gesture.at_ms) > elapsed {
                        break;
                    }
                    out.push(gesture.contacts.clone());
                    *next += 1;
                }
            }
            GestureStream::Random {
                surface,
                rng,
                interval,
                next_at,
            } => {
                while *next_at <= elapsed {
                    let x = surface.left + rng.gen::<f64>() * surface.width;
                    let y = surface.top + rng.gen::<f64>() * surface.height;
                    out.push(vec![Contact::new(x, y)]);
                    *next_at += *interval;
                }
            }
        }
        out
    }
}
