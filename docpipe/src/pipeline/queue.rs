//! Stage queue and worker-slot coordination.
//!
//! Each stage owns one [`StageQueue`]: an unbounded lock-free FIFO plus the
//! state that decides when a worker must be started or may exit.
//!
//! # Worker slot protocol
//!
//! ```text
//!   push()                              worker
//!   ──────                              ──────
//!   pending += 1                        ... queue observed empty ...
//!   items.push(item)                    claimed = false        (release)
//!   notify                              if pending == 0 → exit
//!   CAS claimed false→true              else CAS claimed false→true
//!     ok  → caller spawns worker          ok  → keep draining
//!     err → a worker already owns it      err → a new worker owns it, exit
//! ```
//!
//! `pending` and `claimed` are accessed with `SeqCst`, so for any push that
//! races with a release, either the releasing worker observes the new
//! `pending` count or the pusher observes `claimed == false`. Exactly one of
//! them wins the compare-and-swap, so the stage is never left with queued
//! work and no worker, and never runs two workers.

use crossbeam_queue::SegQueue;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Concurrent FIFO for one pipeline stage.
pub struct StageQueue<T> {
    items: SegQueue<T>,
    /// Items enqueued and not yet completed (queued + in flight).
    pending: AtomicUsize,
    /// Set while a worker owns this stage.
    claimed: AtomicBool,
    /// Wakes an idle worker when an item is pushed.
    notify: Notify,
}

impl<T> StageQueue<T> {
    pub fn new() -> Self {
        Self {
            items: SegQueue::new(),
            pending: AtomicUsize::new(0),
            claimed: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Appends an item.
    ///
    /// Returns `true` if this push moved the stage from idle to claimed; the
    /// caller is then responsible for starting exactly one worker.
    pub fn push(&self, item: T) -> bool {
        // Counted before it becomes visible so `complete` never underflows.
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.items.push(item);
        self.notify.notify_one();
        self.try_claim()
    }

    /// Removes the oldest item, if any. Never blocks.
    pub fn pop(&self) -> Option<T> {
        self.items.pop()
    }

    /// Marks one previously popped item as fully handled.
    pub fn complete(&self) {
        let previous = self.pending.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "complete() without matching push()");
    }

    /// Gives up the worker slot.
    ///
    /// Returns `true` if the calling worker must exit. Returns `false` if
    /// work arrived while releasing and the caller re-claimed the slot; it
    /// must then keep draining.
    pub fn release(&self) -> bool {
        self.claimed.store(false, Ordering::SeqCst);
        if self.pending.load(Ordering::SeqCst) == 0 {
            return true;
        }
        !self.try_claim()
    }

    /// Waits until an item is pushed or `timeout` elapses.
    ///
    /// Returns `true` if woken by a push. A wake-up does not guarantee the
    /// next `pop` succeeds.
    pub async fn wait_for_work(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.notify.notified())
            .await
            .is_ok()
    }

    /// Number of items currently queued (excludes the one in flight).
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items enqueued and not yet completed.
    #[inline]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// True while a worker owns the stage.
    #[inline]
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }

    fn try_claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl<T> Default for StageQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for StageQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageQueue")
            .field("len", &self.len())
            .field("pending", &self.pending())
            .field("claimed", &self.is_claimed())
            .finish()
    }
}
