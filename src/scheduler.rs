//! Worker-pool scheduler: a fixed set of OS threads pulling mailboxes off
//! the global run queue and dispatching a weighted batch of messages from
//! each before returning it (or re-queuing it for more work). Grounded on
//! `skynet_start.c`'s `thread_worker`/`skynet_context_message_dispatch`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

use crate::core::Core;
use crate::monitor::Monitor;

/// Per-worker dispatch weight, indexed by `worker_id % 32`. Negative means
/// "dispatch exactly one message, regardless of mailbox length"; zero means
/// "drain the mailbox completely"; positive `w` means "dispatch
/// `ceil(length >> w)` messages, floored at 1". Matches `skynet_start.c`'s
/// fixed `WEIGHT` table.
const WEIGHT_TABLE: [i32; 32] = [
    -1, -1, -1, -1, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 3, 3, 3, 3, 3, 3, 3, 3,
];

struct SleepGate {
    mutex: Mutex<()>,
    condvar: Condvar,
    sleeping: AtomicUsize,
}

impl SleepGate {
    fn new() -> SleepGate {
        SleepGate { mutex: Mutex::new(()), condvar: Condvar::new(), sleeping: AtomicUsize::new(0) }
    }

    /// Block until woken or `timeout` elapses. The bounded wait guards
    /// against the inherent lost-wakeup race between a worker deciding to
    /// park and actually registering on the condvar: a missed notify simply
    /// costs one extra poll rather than a stalled worker.
    fn park(&self, timeout: std::time::Duration) {
        self.sleeping.fetch_add(1, Ordering::SeqCst);
        let guard = self.mutex.lock().unwrap();
        let _ = self.condvar.wait_timeout(guard, timeout).unwrap();
        self.sleeping.fetch_sub(1, Ordering::SeqCst);
    }

    fn wake_one(&self) {
        if self.sleeping.load(Ordering::SeqCst) > 0 {
            let _guard = self.mutex.lock().unwrap();
            self.condvar.notify_one();
        }
    }

    fn wake_all(&self) {
        let _guard = self.mutex.lock().unwrap();
        self.condvar.notify_all();
    }
}

/// Shared scheduler state: the sleep/wake gate plus the shutdown flag every
/// worker polls between batches.
pub struct Scheduler {
    gate: SleepGate,
    shutdown: AtomicBool,
    pub monitor: Monitor,
}

impl Scheduler {
    pub fn new(worker_count: usize) -> Scheduler {
        Scheduler { gate: SleepGate::new(), shutdown: AtomicBool::new(false), monitor: Monitor::new(worker_count) }
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.gate.wake_all();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Wake one parked worker — called after a push makes the run queue
    /// non-empty.
    pub fn notify_work(&self) {
        self.gate.wake_one();
    }

    /// Run one worker's loop body: pop a mailbox, dispatch its weighted
    /// batch, and re-queue it if messages remain. Returns `false` once the
    /// run queue was empty and the worker should park.
    fn run_one(&self, core: &Core, worker_id: usize) -> bool {
        let mailbox = match core.queue.pop() {
            Some(m) => m,
            None => return false,
        };

        if mailbox.is_release() {
            mailbox.drain_and_release(|_msg| {});
            return true;
        }

        let ctx = match core.registry.grab(mailbox.handle) {
            Some(ctx) => ctx,
            None => {
                // Handle retired between queueing and dispatch; drop the
                // mailbox's remaining contents.
                mailbox.drain_and_release(|_msg| {});
                return true;
            }
        };

        let weight = WEIGHT_TABLE[worker_id % WEIGHT_TABLE.len()];
        let batch = batch_size(weight, mailbox.len());

        let handle = ctx.handle();
        for _ in 0..batch {
            let msg = match mailbox.pop() {
                Some(m) => m,
                None => break,
            };
            self.monitor.begin(worker_id, msg.source, handle);
            let start = core.profile_enabled().then(Instant::now);
            ctx.behavior.lock().unwrap().handle(core, handle, msg);
            if let Some(start) = start {
                ctx.add_profile_micros(start.elapsed().as_micros() as u64);
            }
            self.monitor.end(worker_id);
            if let Some(overload) = mailbox.overload_observation() {
                tracing::warn!(%handle, length = overload, "mailbox overload");
            }
        }

        // mailbox.pop() clears `in_global` the instant the ring empties, so
        // non-empty here means the batch cap was hit with work left over.
        if !mailbox.is_empty() {
            core.queue.push(mailbox);
            core.notify_queued();
        }
        true
    }

    /// A worker thread's body: loop until shutdown, parking when the run
    /// queue is empty.
    pub fn worker_loop(&self, core: &Core, worker_id: usize) {
        loop {
            if self.run_one(core, worker_id) {
                continue;
            }
            if self.is_shutting_down() {
                return;
            }
            self.gate.park(std::time::Duration::from_millis(50));
        }
    }
}

/// `ceil(length >> weight)` floored at 1 for positive weights; 0 drains
/// everything; negative dispatches exactly one.
fn batch_size(weight: i32, length: usize) -> usize {
    if weight < 0 {
        1
    } else if weight == 0 {
        length.max(1)
    } else {
        let divisor = 1usize << (weight as u32);
        let shifted = (length + divisor - 1) >> (weight as u32);
        shifted.max(1)
    }
}
