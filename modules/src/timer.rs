//! Per-module timers, fired by the host through the manager.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use crate::context::ModuleContext;

/// Identifies a timer within its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

pub type TimerFn = dyn FnMut(&mut ModuleContext<'_>) -> anyhow::Result<()> + Send;

pub(crate) struct Timer {
    pub(crate) due: Instant,
    pub(crate) interval: Option<Duration>,
    pub(crate) callback: Box<TimerFn>,
}

/// The timers of one loaded module.
#[derive(Default)]
pub(crate) struct Timers {
    entries: BTreeMap<TimerId, Timer>,
    next: u64,
    /// Timer currently running and whether it cleared itself.
    running: Option<(TimerId, bool)>,
}

impl Timers {
    pub(crate) fn insert(&mut self, timer: Timer) -> TimerId {
        self.next += 1;
        let id = TimerId(self.next);
        self.entries.insert(id, timer);
        id
    }

    pub(crate) fn remove(&mut self, id: TimerId) -> bool {
        if self.entries.remove(&id).is_some() {
            return true;
        }
        match &mut self.running {
            Some((running, cleared)) if *running == id && !*cleared => {
                *cleared = true;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn clear(&mut self) -> usize {
        let cleared = self.entries.len();
        self.entries.clear();
        if let Some((_, running)) = &mut self.running {
            *running = true;
        }
        cleared
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn ids(&self) -> Vec<TimerId> {
        self.entries.keys().copied().collect()
    }

    /// Timers due at `now`, earliest first. Ties go to the older timer.
    pub(crate) fn due(&self, now: Instant) -> Vec<TimerId> {
        let mut due: Vec<(Instant, TimerId)> = self
            .entries
            .iter()
            .filter(|(_, timer)| timer.due <= now)
            .map(|(id, timer)| (timer.due, *id))
            .collect();
        due.sort_unstable();
        due.into_iter().map(|(_, id)| id).collect()
    }

    /// Removes a timer from the set and marks it as running.
    pub(crate) fn take(&mut self, id: TimerId) -> Option<Timer> {
        let timer = self.entries.remove(&id)?;
        self.running = Some((id, false));
        Some(timer)
    }

    /// Ends the run started by [`take`](Self::take), re-arming
    /// intervals that were not cleared while running.
    pub(crate) fn finish(&mut self, id: TimerId, mut timer: Timer, now: Instant) {
        let cleared = matches!(self.running.take(), Some((running, true)) if running == id);
        if let (Some(interval), false) = (timer.interval, cleared) {
            timer.due = now + interval;
            self.entries.insert(id, timer);
        }
    }
}

impl fmt::Debug for Timers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timers")
            .field("active", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer(due: Instant, interval: Option<Duration>) -> Timer {
        Timer {
            due,
            interval,
            callback: Box::new(|_| Ok(())),
        }
    }

    #[test]
    fn due_timers_come_out_in_order() {
        let start = Instant::now();
        let mut timers = Timers::default();
        let late = timers.insert(timer(start + Duration::from_millis(20), None));
        let early = timers.insert(timer(start + Duration::from_millis(10), None));
        timers.insert(timer(start + Duration::from_secs(5), None));

        let now = start + Duration::from_millis(30);
        assert_eq!(timers.due(now), vec![early, late]);
        for id in [early, late] {
            let t = timers.take(id).unwrap();
            timers.finish(id, t, now);
        }
        assert!(timers.due(now).is_empty());
        assert_eq!(timers.len(), 1);
    }

    #[test]
    fn intervals_rearm_unless_cleared_while_running() {
        let start = Instant::now();
        let every = Duration::from_millis(10);
        let mut timers = Timers::default();
        let id = timers.insert(timer(start + every, Some(every)));

        let now = start + every;
        let t = timers.take(id).unwrap();
        timers.finish(id, t, now);
        assert_eq!(timers.ids(), vec![id]);
        assert!(timers.due(now).is_empty());

        let now = now + every;
        assert_eq!(timers.due(now), vec![id]);
        let t = timers.take(id).unwrap();
        assert!(timers.remove(id));
        assert!(!timers.remove(id));
        timers.finish(id, t, now);
        assert_eq!(timers.len(), 0);
    }

    #[test]
    fn clear_counts_pending_timers() {
        let start = Instant::now();
        let mut timers = Timers::default();
        timers.insert(timer(start, None));
        timers.insert(timer(start, Some(Duration::from_secs(1))));
        assert_eq!(timers.clear(), 2);
        assert_eq!(timers.len(), 0);
    }
}
