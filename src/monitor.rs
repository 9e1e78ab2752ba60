//! Liveness monitor: per-worker "last message seen" slots, checked by a
//! watchdog thread so a handler stuck in a long-running call is logged
//! instead of silently stalling its worker. Grounded on `skynet_monitor.c`.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crate::handle::Handle;

/// One worker's dispatch bookkeeping. `version` increments every time the
/// worker starts or finishes dispatching a message; `check_version` is the
/// value the watchdog last observed. If they're still equal on the next
/// watchdog pass, the worker has been stuck in the same dispatch call for a
/// full check interval.
struct Slot {
    version: AtomicU64,
    check_version: AtomicU64,
    source: AtomicU32,
    destination: AtomicU32,
}

impl Slot {
    fn new() -> Slot {
        Slot {
            version: AtomicU64::new(0),
            check_version: AtomicU64::new(0),
            source: AtomicU32::new(0),
            destination: AtomicU32::new(0),
        }
    }
}

/// One slot per worker thread, indexed by worker id.
pub struct Monitor {
    slots: Vec<Slot>,
}

impl Monitor {
    pub fn new(worker_count: usize) -> Monitor {
        Monitor { slots: (0..worker_count).map(|_| Slot::new()).collect() }
    }

    /// Record that worker `worker_id` is about to dispatch a message from
    /// `source` to `destination`.
    pub fn begin(&self, worker_id: usize, source: Handle, destination: Handle) {
        let slot = &self.slots[worker_id];
        slot.source.store(source.0, Ordering::SeqCst);
        slot.destination.store(destination.0, Ordering::SeqCst);
        slot.version.fetch_add(1, Ordering::SeqCst);
    }

    /// Record that worker `worker_id` finished its current dispatch.
    pub fn end(&self, worker_id: usize) {
        self.slots[worker_id].version.fetch_add(1, Ordering::SeqCst);
    }

    /// Compare each slot's `version` against the value recorded on the
    /// previous call. Returns the `(worker_id, destination)` pairs that have
    /// not advanced — i.e. are suspected stuck in the same dispatch.
    pub fn check(&self) -> Vec<(usize, Handle)> {
        let mut stuck = Vec::new();
        for (worker_id, slot) in self.slots.iter().enumerate() {
            let version = slot.version.load(Ordering::SeqCst);
            let last = slot.check_version.swap(version, Ordering::SeqCst);
            // An odd version means the worker is mid-dispatch (begin() was
            // called, end() was not); if it hasn't moved since the last
            // check, the handler has been running for a full interval.
            if last == version && version % 2 == 1 {
                let destination = Handle(slot.destination.load(Ordering::SeqCst));
                stuck.push((worker_id, destination));
            }
        }
        stuck
    }
}

/// Periodically runs `Monitor::check` and logs anything stuck, marking the
/// destination service `endless` so it is flagged only once. Runs on its own
/// thread (§4.H); `interval` matches the original's fixed five-second cadence.
pub fn watchdog_pass(
    monitor: &Monitor,
    core: &crate::core::Core,
) {
    for (worker_id, destination) in monitor.check() {
        if destination.is_none() {
            continue;
        }
        if let Some(ctx) = core.registry.grab(destination) {
            if !ctx.is_endless() {
                ctx.mark_endless();
                tracing::warn!(worker = worker_id, handle = %destination, "service appears stuck in a single dispatch call");
            }
        }
    }
}

pub type SharedMonitor = Arc<Monitor>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_monitor_reports_nothing_stuck() {
        let m = Monitor::new(4);
        assert!(m.check().is_empty());
    }

    #[test]
    fn in_progress_dispatch_with_no_progress_is_flagged() {
        let m = Monitor::new(2);
        m.begin(0, Handle(1), Handle(2));
        // First check just primes check_version.
        assert!(m.check().is_empty());
        // No end() called between checks: version unchanged, odd (mid-dispatch).
        let stuck = m.check();
        assert_eq!(stuck, vec![(0, Handle(2))]);
    }

    #[test]
    fn completed_dispatch_is_not_flagged() {
        let m = Monitor::new(1);
        m.begin(0, Handle(1), Handle(2));
        m.end(0);
        assert!(m.check().is_empty());
        assert!(m.check().is_empty());
    }
}
