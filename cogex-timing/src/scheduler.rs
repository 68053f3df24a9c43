//! Timer scheduling for trial state machines.
//!
//! A [`Scheduler`] owns every pending timer of a run. State machines ask it
//! for timers and cancel them; the driving loop waits for the next deadline
//! and feeds due timers back into the machine. Two implementations exist:
//! [`VirtualScheduler`] advances a fake clock on demand (tests, simulation),
//! [`RealtimeScheduler`] sleeps on a [`Timer`].

use std::fmt;
use std::time::Duration;

use tracing::trace;

use crate::timer::Timer;

/// Handle for a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub trait Scheduler<K> {
    /// Current time in nanoseconds on this scheduler's clock.
    fn now(&self) -> u64;

    /// Arms a timer that becomes due `delay` from now.
    fn schedule(&mut self, delay: Duration, key: K) -> TimerId;

    /// Disarms a timer. Returns false if it already fired or was cancelled.
    fn cancel(&mut self, id: TimerId) -> bool;

    /// Deadline of the earliest pending timer.
    fn next_deadline(&self) -> Option<u64>;

    /// Blocks (or jumps) until the clock reads at least `deadline_ns`.
    fn wait_until(&mut self, deadline_ns: u64);

    /// Removes and returns the earliest timer that is due now.
    fn pop_due(&mut self) -> Option<(TimerId, K)>;

    fn pending(&self) -> usize;
}

#[derive(Debug)]
struct Entry<K> {
    id: TimerId,
    deadline_ns: u64,
    key: K,
}

/// Deadline-ordered timer list. Ties fire in scheduling order.
#[derive(Debug)]
pub struct TimerQueue<K> {
    entries: Vec<Entry<K>>,
    next_id: u64,
}

impl<K> Default for TimerQueue<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }
}

impl<K> TimerQueue<K> {
    pub fn insert(&mut self, deadline_ns: u64, key: K) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let at = self.entries.partition_point(|e| e.deadline_ns <= deadline_ns);
        self.entries.insert(
            at,
            Entry {
                id,
                deadline_ns,
                key,
            },
        );
        id
    }

    pub fn remove(&mut self, id: TimerId) -> bool {
        match self.entries.iter().position(|e| e.id == id) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.entries.first().map(|e| e.deadline_ns)
    }

    pub fn pop_due(&mut self, now_ns: u64) -> Option<(TimerId, K)> {
        if self.entries.first()?.deadline_ns > now_ns {
            return None;
        }
        let entry = self.entries.remove(0);
        Some((entry.id, entry.key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Scheduler on a fake clock that only moves when told to.
#[derive(Debug)]
pub struct VirtualScheduler<K> {
    now_ns: u64,
    queue: TimerQueue<K>,
}

impl<K> Default for VirtualScheduler<K> {
    fn default() -> Self {
        Self {
            now_ns: 0,
            queue: TimerQueue::default(),
        }
    }
}

impl<K: fmt::Debug> VirtualScheduler<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward without firing anything; due timers are
    /// collected with [`Scheduler::pop_due`].
    pub fn advance(&mut self, d: Duration) {
        self.now_ns = self.now_ns.saturating_add(nanos(d));
    }

    /// Jumps to the earliest deadline and fires that timer.
    pub fn fire_next(&mut self) -> Option<(TimerId, K)> {
        let deadline = self.queue.next_deadline()?;
        self.wait_until(deadline);
        self.pop_due()
    }
}

impl<K: fmt::Debug> Scheduler<K> for VirtualScheduler<K> {
    fn now(&self) -> u64 {
        self.now_ns
    }

    fn schedule(&mut self, delay: Duration, key: K) -> TimerId {
        let deadline = self.now_ns.saturating_add(nanos(delay));
        trace!(?key, deadline_ns = deadline, "virtual timer armed");
        self.queue.insert(deadline, key)
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        self.queue.remove(id)
    }

    fn next_deadline(&self) -> Option<u64> {
        self.queue.next_deadline()
    }

    fn wait_until(&mut self, deadline_ns: u64) {
        self.now_ns = self.now_ns.max(deadline_ns);
    }

    fn pop_due(&mut self) -> Option<(TimerId, K)> {
        self.queue.pop_due(self.now_ns)
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}

/// Scheduler backed by a real clock.
#[derive(Debug)]
pub struct RealtimeScheduler<K, T: Timer> {
    timer: T,
    queue: TimerQueue<K>,
}

impl<K, T: Timer> RealtimeScheduler<K, T> {
    pub fn new(timer: T) -> Self {
        Self {
            timer,
            queue: TimerQueue::default(),
        }
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }
}

impl<K: fmt::Debug, T: Timer> Scheduler<K> for RealtimeScheduler<K, T> {
    fn now(&self) -> u64 {
        self.timer.now()
    }

    fn schedule(&mut self, delay: Duration, key: K) -> TimerId {
        let deadline = self.timer.now().saturating_add(nanos(delay));
        trace!(?key, deadline_ns = deadline, "timer armed");
        self.queue.insert(deadline, key)
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        self.queue.remove(id)
    }

    fn next_deadline(&self) -> Option<u64> {
        self.queue.next_deadline()
    }

    fn wait_until(&mut self, deadline_ns: u64) {
        loop {
            let now = self.timer.now();
            if now >= deadline_ns {
                break;
            }
            self.timer.sleep(Duration::from_nanos(deadline_ns - now));
        }
    }

    fn pop_due(&mut self) -> Option<(TimerId, K)> {
        self.queue.pop_due(self.timer.now())
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}
