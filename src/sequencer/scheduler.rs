// Scheduler - Deferred and repeating tasks on a millisecond clock
// Single-threaded: the owner polls `pop_due` from its event loop

use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Identifies a scheduled timer so it can be cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Shared "still running" flag for a family of deferred tasks.
///
/// Tasks queued before `cancel` still fire, but their handlers check the
/// token and do nothing.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Repeating interval that would never move the deadline forward
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("Repeating interval must be a positive number of milliseconds, got {0}")]
pub struct InvalidInterval(pub f64);

/// A timer that came due
#[derive(Debug, Clone, PartialEq)]
pub struct DueTask<T> {
    pub id: TimerId,
    /// Deadline the task was scheduled for
    pub due_ms: f64,
    pub task: T,
}

#[derive(Debug)]
struct Entry<T> {
    due_ms: f64,
    seq: u64,
    id: TimerId,
    interval_ms: Option<f64>,
    task: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // Earliest deadline first, insertion order breaks ties
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.due_ms
            .total_cmp(&other.due_ms)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Timer queue holding one-shot and repeating tasks.
///
/// Deadlines are absolute milliseconds on the owner's clock. Tasks with equal
/// deadlines fire in the order they were scheduled.
#[derive(Debug)]
pub struct TimerQueue<T> {
    heap: BinaryHeap<Reverse<Entry<T>>>,
    active: HashSet<TimerId>,
    next_id: u64,
    next_seq: u64,
}

impl<T: Clone> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            active: HashSet::new(),
            next_id: 1,
            next_seq: 0,
        }
    }

    /// Run `task` once at `due_ms`
    pub fn schedule_once(&mut self, due_ms: f64, task: T) -> TimerId {
        self.insert(due_ms, None, task)
    }

    /// Run `task` at `first_due_ms` and then every `interval_ms` until cancelled
    pub fn schedule_repeating(
        &mut self,
        first_due_ms: f64,
        interval_ms: f64,
        task: T,
    ) -> Result<TimerId, InvalidInterval> {
        if !(interval_ms.is_finite() && first_due_ms + interval_ms > first_due_ms) {
            return Err(InvalidInterval(interval_ms));
        }
        Ok(self.insert(first_due_ms, Some(interval_ms), task))
    }

    /// Cancel a timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.active.remove(&id)
    }

    /// Number of pending timers
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Deadline of the earliest pending timer
    pub fn next_due(&mut self) -> Option<f64> {
        self.discard_cancelled();
        self.heap.peek().map(|Reverse(entry)| entry.due_ms)
    }

    /// Pop the earliest task whose deadline is at or before `now_ms`.
    /// Repeating timers are re-armed on their interval grid, at the first
    /// deadline after `now_ms`: periods missed during a stall fire once, not
    /// once each.
    pub fn pop_due(&mut self, now_ms: f64) -> Option<DueTask<T>> {
        self.discard_cancelled();

        let due = matches!(self.heap.peek(), Some(Reverse(entry)) if entry.due_ms <= now_ms);
        if !due {
            return None;
        }

        let Reverse(entry) = self.heap.pop()?;
        match entry.interval_ms {
            Some(interval_ms) => {
                let mut next_due = entry.due_ms + interval_ms;
                if next_due <= now_ms {
                    let missed = ((now_ms - entry.due_ms) / interval_ms).floor();
                    next_due = entry.due_ms + (missed + 1.0) * interval_ms;
                }

                if next_due > entry.due_ms {
                    let seq = self.take_seq();
                    self.heap.push(Reverse(Entry {
                        due_ms: next_due,
                        seq,
                        id: entry.id,
                        interval_ms: entry.interval_ms,
                        task: entry.task.clone(),
                    }));
                } else {
                    self.active.remove(&entry.id);
                }
            }
            None => {
                self.active.remove(&entry.id);
            }
        }

        Some(DueTask {
            id: entry.id,
            due_ms: entry.due_ms,
            task: entry.task,
        })
    }

    fn insert(&mut self, due_ms: f64, interval_ms: Option<f64>, task: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let seq = self.take_seq();

        self.active.insert(id);
        self.heap.push(Reverse(Entry {
            due_ms,
            seq,
            id,
            interval_ms,
            task,
        }));
        id
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn discard_cancelled(&mut self) {
        while let Some(Reverse(entry)) = self.heap.peek() {
            if self.active.contains(&entry.id) {
                break;
            }
            self.heap.pop();
        }
    }
}

impl<T: Clone> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
