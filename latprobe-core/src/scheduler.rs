use crate::time::SimTime;
use core::cmp::{Ordering, Reverse};
use std::{collections::BinaryHeap, time::Duration};

/// The virtual clock and its queue of pending events.
///
/// Events come out in non-decreasing time order. Events due at the same
/// time come out in the order they were scheduled. Popping an event
/// moves the clock to the event's time: the clock never goes backward,
/// and an event scheduled in the past is due `now`.
///
/// ```
/// # use latprobe_core::{scheduler::Scheduler, time::SimTime};
/// # use std::time::Duration;
/// let mut scheduler = Scheduler::new();
/// scheduler.schedule_at(SimTime::from_secs(2), "second");
/// scheduler.schedule_at(SimTime::from_secs(1), "first");
/// scheduler.schedule_in(Duration::from_secs(1), "tied with first");
///
/// assert_eq!(scheduler.pop(), Some((SimTime::from_secs(1), "first")));
/// assert_eq!(scheduler.pop(), Some((SimTime::from_secs(1), "tied with first")));
/// assert_eq!(scheduler.now(), SimTime::from_secs(1));
/// ```
pub struct Scheduler<E> {
    queue: BinaryHeap<Reverse<Entry<E>>>,
    now: SimTime,
    sequence: u64,
    stop_at: Option<SimTime>,
}

struct Entry<E> {
    time: SimTime,
    sequence: u64,
    event: E,
}

impl<E> PartialEq for Entry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.sequence == other.sequence
    }
}

impl<E> Eq for Entry<E> {}

impl<E> PartialOrd for Entry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Entry<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then(self.sequence.cmp(&other.sequence))
    }
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            now: SimTime::ZERO,
            sequence: 0,
            stop_at: None,
        }
    }

    #[inline]
    pub fn now(&self) -> SimTime {
        self.now
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// time of the next pending event, if any
    #[inline]
    pub fn next_event_time(&self) -> Option<SimTime> {
        self.queue.peek().map(|entry| entry.0.time)
    }

    pub fn stop_time(&self) -> Option<SimTime> {
        self.stop_at
    }

    /// Refuse to pop any event due strictly after `time`.
    ///
    /// Events due exactly at `time` still run.
    pub fn stop_at(&mut self, time: SimTime) {
        self.stop_at = Some(time);
    }

    pub fn schedule_at(&mut self, time: SimTime, event: E) {
        let time = std::cmp::max(time, self.now);
        let sequence = self.sequence;
        self.sequence += 1;

        self.queue.push(Reverse(Entry {
            time,
            sequence,
            event,
        }));
    }

    pub fn schedule_in(&mut self, delay: Duration, event: E) {
        self.schedule_at(self.now + delay, event)
    }

    /// Pop the next due event and advance the clock to its time.
    ///
    /// Returns `None` when the queue is empty or when the next event is
    /// due after the stop time. In the latter case the clock is moved to
    /// the stop time and the remaining events stay pending.
    pub fn pop(&mut self) -> Option<(SimTime, E)> {
        let next = self.next_event_time()?;

        if let Some(stop) = self.stop_at
            && next > stop
        {
            self.now = std::cmp::max(self.now, stop);
            return None;
        }

        let Reverse(entry) = self.queue.pop()?;
        self.now = entry.time;
        Some((entry.time, entry.event))
    }
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}
