//! Single-assignment completion latch
//!
//! Two sources race to finish crystallization: the recorder's stop
//! acknowledgement and the fallback timer. The first to fire wins; every
//! later attempt is rejected, so completion runs exactly once.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionSource {
    /// The recorder acknowledged it stopped and flushed
    RecorderStopped,
    /// The fallback timer elapsed first
    FallbackTimer,
}

impl fmt::Display for CompletionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionSource::RecorderStopped => write!(f, "recorder stopped"),
            CompletionSource::FallbackTimer => write!(f, "fallback timer"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionLatch {
    winner: Option<CompletionSource>,
}

impl CompletionLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to complete from `source`. Returns true only for the first caller.
    pub fn try_fire(&mut self, source: CompletionSource) -> bool {
        if self.winner.is_some() {
            return false;
        }
        self.winner = Some(source);
        true
    }

    pub fn winner(&self) -> Option<CompletionSource> {
        self.winner
    }

    pub fn is_fired(&self) -> bool {
        self.winner.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_source_wins() {
        let mut latch = CompletionLatch::new();
        assert!(latch.try_fire(CompletionSource::RecorderStopped));
        assert!(!latch.try_fire(CompletionSource::FallbackTimer));
        assert!(!latch.try_fire(CompletionSource::RecorderStopped));
        assert_eq!(latch.winner(), Some(CompletionSource::RecorderStopped));
    }

    #[test]
    fn test_fallback_can_win() {
        let mut latch = CompletionLatch::new();
        assert!(latch.try_fire(CompletionSource::FallbackTimer));
        assert!(!latch.try_fire(CompletionSource::RecorderStopped));
        assert!(latch.is_fired());
    }
}
