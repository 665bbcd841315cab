//! Guidance hint sequencing
//!
//! Hints run as a chain of one-shot timers: show, hide after the display
//! time, wait, show the next. Only one timer of the chain is pending at a
//! time, so cancelling it stops the whole sequence.

use std::time::Duration;

use super::SessionTimer;
use crate::config::HintSchedule;
use crate::engine::{Scheduler, TimerId};

#[derive(Debug, Clone)]
pub(crate) struct HintSequencer {
    schedule: HintSchedule,
    pending: Option<TimerId>,
    visible: Option<usize>,
}

impl HintSequencer {
    pub fn new(schedule: HintSchedule) -> Self {
        Self {
            schedule,
            pending: None,
            visible: None,
        }
    }

    /// Arm the first hint after the start delay
    pub fn start(&mut self, scheduler: &mut Scheduler<SessionTimer>) {
        self.cancel(scheduler);
        if self.schedule.texts.is_empty() {
            return;
        }
        self.pending = Some(scheduler.schedule_once(self.schedule.start_delay(), SessionTimer::HintShow(0)));
    }

    /// Show hint `index` and arm its hide. Returns the text to display.
    pub fn show(&mut self, index: usize, scheduler: &mut Scheduler<SessionTimer>) -> Option<String> {
        self.pending = None;
        let text = self.schedule.texts.get(index)?.clone();
        self.visible = Some(index);
        self.pending = Some(scheduler.schedule_once(self.schedule.display(), SessionTimer::HintHide(index)));
        Some(text)
    }

    /// Hide hint `index` and arm the next one, if any.
    ///
    /// The wait before the last hint is at least `last_gap` and is stretched
    /// so the last hint lands on entry into the final window.
    pub fn hide(&mut self, index: usize, until_final_window: Duration, scheduler: &mut Scheduler<SessionTimer>) {
        self.pending = None;
        if self.visible == Some(index) {
            self.visible = None;
        }

        let next = index + 1;
        let count = self.schedule.texts.len();
        if next >= count {
            return;
        }
        let delay = if next == count - 1 {
            self.schedule.last_gap().max(until_final_window)
        } else {
            self.schedule.gap()
        };
        self.pending = Some(scheduler.schedule_once(delay, SessionTimer::HintShow(next)));
    }

    /// Stop the sequence. Returns the hint that was on screen, if any.
    pub fn cancel(&mut self, scheduler: &mut Scheduler<SessionTimer>) -> Option<usize> {
        if let Some(id) = self.pending.take() {
            scheduler.cancel(id);
        }
        self.visible.take()
    }

    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }
}
