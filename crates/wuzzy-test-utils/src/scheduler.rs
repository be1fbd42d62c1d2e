// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduler that never fires on its own.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use wuzzy_core::{Scheduler, TimerId};

/// Records armed timers. Tests "fire" one with [`ManualScheduler::fire`]
/// and then call the queue's timer entry point themselves.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    armed: Mutex<HashMap<TimerId, Duration>>,
    history: Mutex<Vec<(TimerId, Duration)>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self, timer: TimerId) -> bool {
        self.armed.lock().unwrap().contains_key(&timer)
    }

    /// Delay the timer was last armed with, if it is still pending.
    pub fn delay(&self, timer: TimerId) -> Option<Duration> {
        self.armed.lock().unwrap().get(&timer).copied()
    }

    pub fn armed_count(&self) -> usize {
        self.armed.lock().unwrap().len()
    }

    /// Disarms the timer, returning its delay if it was pending.
    pub fn fire(&self, timer: TimerId) -> Option<Duration> {
        self.armed.lock().unwrap().remove(&timer)
    }

    /// Every `schedule_after` call so far, in order.
    pub fn history(&self) -> Vec<(TimerId, Duration)> {
        self.history.lock().unwrap().clone()
    }

    /// Delays of every armed retry timer, in order.
    pub fn retry_delays(&self) -> Vec<Duration> {
        self.history()
            .into_iter()
            .filter(|(timer, _)| *timer == TimerId::Retry)
            .map(|(_, delay)| delay)
            .collect()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_after(&self, delay: Duration, timer: TimerId) {
        self.armed.lock().unwrap().insert(timer, delay);
        self.history.lock().unwrap().push((timer, delay));
    }

    fn cancel(&self, timer: TimerId) {
        self.armed.lock().unwrap().remove(&timer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rearming_replaces_and_fire_disarms() {
        let scheduler = ManualScheduler::new();
        scheduler.schedule_after(Duration::from_secs(2), TimerId::Retry);
        scheduler.schedule_after(Duration::from_secs(4), TimerId::Retry);
        assert_eq!(scheduler.delay(TimerId::Retry), Some(Duration::from_secs(4)));
        assert_eq!(scheduler.fire(TimerId::Retry), Some(Duration::from_secs(4)));
        assert!(!scheduler.is_armed(TimerId::Retry));
        assert_eq!(
            scheduler.retry_delays(),
            [Duration::from_secs(2), Duration::from_secs(4)]
        );
    }
}
