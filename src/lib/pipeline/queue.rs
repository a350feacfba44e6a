//! Blocking FIFO queue shared between pipeline stages.
//!
//! # Key Types
//!
//! - [`StageQueue`]: unbounded FIFO guarded by one mutex and one condition variable
//! - [`Dequeued`]: result of a blocking dequeue, either an item or a confirmed stop
//! - [`IdleStrategy`]: how an idle consumer waits (condition variable or polling)
//! - [`QueueStats`]: counters collected per queue for the run report
//!
//! # Wait/notify discipline
//!
//! All mutation of the item buffer happens under the queue lock. A consumer checks
//! "buffer empty" and then the caller's stop predicate while holding that lock, and only
//! then waits, which atomically releases the lock. A producer that could make the stop
//! predicate true must therefore take the same lock before notifying (see
//! [`StageQueue::wake_all`]); otherwise its notification could fall between a
//! consumer's predicate check and its wait and be lost.
//!
//! Stop predicates may take other leaf locks (the completion tracker) but must never
//! take another queue's lock.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

/// Outcome of [`StageQueue::dequeue_blocking`].
#[derive(Debug, PartialEq, Eq)]
pub enum Dequeued<T> {
    /// The head item of the queue.
    Item(T),
    /// The queue was empty and the stop predicate held; the consumer should terminate.
    Stop,
}

/// How an idle consumer waits for work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdleStrategy {
    /// Wait on the queue's condition variable (default).
    #[default]
    Block,
    /// Release the lock, sleep for the interval, and re-check.
    ///
    /// Fallback for environments where condition variables are unavailable or
    /// unreliable. Same correctness as `Block`, worse latency and CPU use.
    Poll(Duration),
}

/// Counters collected per queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Queue name.
    pub name: String,
    /// Items appended over the queue's lifetime.
    pub enqueued: u64,
    /// Items removed over the queue's lifetime.
    pub dequeued: u64,
    /// Largest number of items held at once.
    pub peak_depth: u64,
    /// Times an idle consumer woke up (signalled, broadcast, spurious or poll tick).
    pub idle_wakeups: u64,
}

/// An unbounded FIFO queue with blocking dequeue and a caller-supplied stop predicate.
///
/// The queue knows nothing about when work is finished; each consumer passes the
/// predicate that decides whether an empty queue means "wait" or "stop".
///
/// # Example
///
/// ```
/// use triage_lib::pipeline::{Dequeued, StageQueue};
///
/// let queue = StageQueue::new("intake");
/// queue.enqueue(1);
/// queue.enqueue(2);
/// assert_eq!(queue.dequeue_blocking(|| true), Dequeued::Item(1));
/// assert_eq!(queue.dequeue_blocking(|| true), Dequeued::Item(2));
/// assert_eq!(queue.dequeue_blocking(|| true), Dequeued::Stop);
/// ```
pub struct StageQueue<T> {
    name: String,
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    idle: IdleStrategy,

    // Stats
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    peak_depth: AtomicU64,
    idle_wakeups: AtomicU64,
}

impl<T> StageQueue<T> {
    /// Create an empty queue that blocks idle consumers on its condition variable.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
            idle: IdleStrategy::Block,
            enqueued: AtomicU64::new(0),
            dequeued: AtomicU64::new(0),
            peak_depth: AtomicU64::new(0),
            idle_wakeups: AtomicU64::new(0),
        }
    }

    /// Set how idle consumers wait.
    #[must_use]
    pub fn with_idle_strategy(mut self, idle: IdleStrategy) -> Self {
        self.idle = idle;
        self
    }

    /// The queue's name, used in logs and stats.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append an item and wake one waiting consumer. Never blocks beyond lock contention.
    pub fn enqueue(&self, item: T) {
        let mut items = self.items.lock();
        items.push_back(item);
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        self.peak_depth.fetch_max(items.len() as u64, Ordering::Relaxed);
        self.not_empty.notify_one();
    }

    /// Remove the head item, waiting while the queue is empty and `can_stop` is false.
    ///
    /// `can_stop` is evaluated with the queue lock held, only after the queue has been
    /// observed empty, and again after every wakeup (spurious wakeups simply loop).
    /// Returns [`Dequeued::Stop`] only when the queue is empty and `can_stop` holds.
    pub fn dequeue_blocking<F>(&self, can_stop: F) -> Dequeued<T>
    where
        F: Fn() -> bool,
    {
        let mut items = self.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                self.dequeued.fetch_add(1, Ordering::Relaxed);
                return Dequeued::Item(item);
            }
            if can_stop() {
                return Dequeued::Stop;
            }
            self.idle_wait(&mut items);
            self.idle_wakeups.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn idle_wait(&self, items: &mut MutexGuard<'_, VecDeque<T>>) {
        match self.idle {
            IdleStrategy::Block => self.not_empty.wait(items),
            IdleStrategy::Poll(interval) => {
                MutexGuard::unlocked(items, || thread::sleep(interval));
            }
        }
    }

    /// Wake every waiting consumer so it re-evaluates its stop predicate.
    ///
    /// Takes the queue lock before notifying; see the module docs for why.
    pub fn wake_all(&self) {
        let _items = self.items.lock();
        self.not_empty.notify_all();
    }

    /// Remove and return every queued item without waiting.
    ///
    /// Drained items do not count as dequeued.
    pub fn drain(&self) -> Vec<T> {
        self.items.lock().drain(..).collect()
    }

    /// Number of items currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether the queue is currently empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Snapshot of the queue's counters.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            name: self.name.clone(),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dequeued: self.dequeued.load(Ordering::Relaxed),
            peak_depth: self.peak_depth.load(Ordering::Relaxed),
            idle_wakeups: self.idle_wakeups.load(Ordering::Relaxed),
        }
    }
}
