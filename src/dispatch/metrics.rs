//! Dispatch counters

use std::ops::AddAssign;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time dispatch statistics for one engine (or a sum over several)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchMetrics {
    /// Publish passes run
    pub publishes: u64,
    /// Callback invocations that returned normally
    pub deliveries: u64,
    /// Callback invocations that panicked and were isolated
    pub callback_panics: u64,
    /// Subscriptions dropped because their owner died
    pub pruned: u64,
    /// Waiters resolved by a publish
    pub waiters_resolved: u64,
    /// Waiters that gave up on timeout
    pub waiters_timed_out: u64,
    /// Live subscriptions at snapshot time
    pub subscribers: usize,
    /// Waiters pending at snapshot time
    pub pending_waiters: usize,
}

impl AddAssign for DispatchMetrics {
    fn add_assign(&mut self, other: Self) {
        self.publishes += other.publishes;
        self.deliveries += other.deliveries;
        self.callback_panics += other.callback_panics;
        self.pruned += other.pruned;
        self.waiters_resolved += other.waiters_resolved;
        self.waiters_timed_out += other.waiters_timed_out;
        self.subscribers += other.subscribers;
        self.pending_waiters += other.pending_waiters;
    }
}

#[derive(Debug, Default)]
pub(crate) struct DispatchCounters {
    publishes: AtomicU64,
    deliveries: AtomicU64,
    callback_panics: AtomicU64,
    pruned: AtomicU64,
    waiters_resolved: AtomicU64,
    waiters_timed_out: AtomicU64,
}

impl DispatchCounters {
    pub(crate) fn record_publish(&self) {
        self.publishes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivery(&self) {
        self.deliveries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_panic(&self) {
        self.callback_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pruned(&self, count: usize) {
        self.pruned.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_resolved(&self, count: usize) {
        self.waiters_resolved.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.waiters_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, subscribers: usize, pending_waiters: usize) -> DispatchMetrics {
        DispatchMetrics {
            publishes: self.publishes.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            callback_panics: self.callback_panics.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
            waiters_resolved: self.waiters_resolved.load(Ordering::Relaxed),
            waiters_timed_out: self.waiters_timed_out.load(Ordering::Relaxed),
            subscribers,
            pending_waiters,
        }
    }
}
