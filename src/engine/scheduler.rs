//! Virtual-time timer scheduler
//!
//! Single-threaded and cooperative: nothing fires on its own. The owner
//! advances the clock and drains due timers in time order, which keeps the
//! session deterministic under test and lets a host drive it from real time.

use std::time::Duration;

/// Handle for a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct Timer<T> {
    id: TimerId,
    due: Duration,
    period: Option<Duration>,
    payload: T,
}

/// Ordered set of one-shot and repeating timers over a virtual clock
#[derive(Debug, Clone)]
pub struct Scheduler<T> {
    now: Duration,
    next_id: u64,
    timers: Vec<Timer<T>>,
}

impl<T: Clone> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            timers: Vec::new(),
        }
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Fire `payload` once, `delay` from now
    pub fn schedule_once(&mut self, delay: Duration, payload: T) -> TimerId {
        self.push(delay, None, payload)
    }

    /// Fire `payload` every `period`, first one `period` from now
    pub fn schedule_repeating(&mut self, period: Duration, payload: T) -> TimerId {
        self.schedule_repeating_after(period, period, payload)
    }

    /// Fire `payload` every `period`, first one `first` from now
    pub fn schedule_repeating_after(&mut self, first: Duration, period: Duration, payload: T) -> TimerId {
        let period = period.max(Duration::from_millis(1));
        self.push(first, Some(period), payload)
    }

    fn push(&mut self, delay: Duration, period: Option<Duration>, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.push(Timer {
            id,
            due: self.now + delay,
            period,
            payload,
        });
        id
    }

    /// Cancel a timer. Cancelling an unknown or already-fired timer is a no-op.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        self.timers.len() != before
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.timers.iter().any(|t| t.id == id)
    }

    /// Due time of the earliest pending timer
    pub fn next_due(&self) -> Option<Duration> {
        self.timers.iter().map(|t| t.due).min()
    }

    /// Pop the earliest timer due at or before `until`, moving the clock to it.
    ///
    /// Ties fire in scheduling order. Repeating timers are re-armed.
    pub fn pop_due(&mut self, until: Duration) -> Option<(TimerId, T)> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= until)
            .min_by_key(|(_, t)| (t.due, t.id))
            .map(|(i, _)| i)?;

        let due = self.timers[index].due;
        self.now = self.now.max(due);

        match self.timers[index].period {
            Some(period) => {
                let timer = &mut self.timers[index];
                timer.due += period;
                Some((timer.id, timer.payload.clone()))
            }
            None => {
                let timer = self.timers.swap_remove(index);
                Some((timer.id, timer.payload))
            }
        }
    }

    /// Move the clock forward without firing anything
    pub fn advance_to(&mut self, time: Duration) {
        self.now = self.now.max(time);
    }

    /// Push every pending timer `delta` into the future
    pub fn defer_all(&mut self, delta: Duration) {
        for timer in &mut self.timers {
            timer.due += delta;
        }
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_fires_in_time_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_once(ms(300), "c");
        scheduler.schedule_once(ms(100), "a");
        scheduler.schedule_once(ms(200), "b");

        let fired: Vec<_> = std::iter::from_fn(|| scheduler.pop_due(ms(1000)))
            .map(|(_, p)| p)
            .collect();
        assert_eq!(fired, vec!["a", "b", "c"]);
        assert_eq!(scheduler.now(), ms(300));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_respects_horizon() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_once(ms(500), ());
        assert!(scheduler.pop_due(ms(499)).is_none());
        assert!(scheduler.pop_due(ms(500)).is_some());
    }

    #[test]
    fn test_repeating_rearms() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.schedule_repeating(Duration::from_secs(1), "tick");

        let mut count = 0;
        while scheduler.pop_due(Duration::from_secs(5)).is_some() {
            count += 1;
        }
        assert_eq!(count, 5);
        assert!(scheduler.is_pending(id));
        assert_eq!(scheduler.next_due(), Some(Duration::from_secs(6)));
    }

    #[test]
    fn test_repeating_with_short_first_period() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_repeating_after(ms(500), Duration::from_secs(1), ());

        assert!(scheduler.pop_due(ms(499)).is_none());
        assert!(scheduler.pop_due(ms(500)).is_some());
        assert_eq!(scheduler.next_due(), Some(ms(1500)));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.schedule_once(ms(10), ());
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        assert!(scheduler.pop_due(ms(100)).is_none());
    }

    #[test]
    fn test_defer_all() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_once(ms(100), ());
        scheduler.defer_all(ms(50));
        assert!(scheduler.pop_due(ms(120)).is_none());
        assert!(scheduler.pop_due(ms(150)).is_some());
    }

    #[test]
    fn test_ties_fire_in_schedule_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_once(ms(100), 1);
        scheduler.schedule_once(ms(100), 2);
        assert_eq!(scheduler.pop_due(ms(100)).map(|(_, p)| p), Some(1));
        assert_eq!(scheduler.pop_due(ms(100)).map(|(_, p)| p), Some(2));
    }
}
