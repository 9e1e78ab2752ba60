//! Shared scaffolding for the end-to-end scenario tests: a minimal running
//! instance (`Core` + `Scheduler` + a worker pool) without the full
//! `bootstrap::Runtime` start-up sequence, since these tests don't need a
//! logger service or a config file.

use std::sync::Arc;
use std::thread::JoinHandle;

use harbor_rt::core::Core;
use harbor_rt::scheduler::Scheduler;

pub struct Harness {
    pub core: Arc<Core>,
    pub scheduler: Arc<Scheduler>,
    workers: Vec<JoinHandle<()>>,
}

impl Harness {
    pub fn start(worker_count: usize) -> Harness {
        let core = Arc::new(Core::new(1, 0));
        let scheduler = Arc::new(Scheduler::new(worker_count));

        {
            let scheduler = scheduler.clone();
            core.set_wake_hook(Box::new(move || scheduler.notify_work()));
        }

        let workers = (0..worker_count)
            .map(|id| {
                let core = core.clone();
                let scheduler = scheduler.clone();
                std::thread::spawn(move || scheduler.worker_loop(&core, id))
            })
            .collect();

        Harness { core, scheduler, workers }
    }

    pub fn shutdown(mut self) {
        self.scheduler.request_shutdown();
        for w in self.workers.drain(..) {
            let _ = w.join();
        }
    }
}

/// Spin-wait (bounded) for `cond` to become true, polling every millisecond.
/// Used instead of a fixed sleep so tests run fast on quiet machines and
/// still tolerate load on busy ones.
pub fn wait_until(mut cond: impl FnMut() -> bool, timeout: std::time::Duration) -> bool {
    let start = std::time::Instant::now();
    while !cond() {
        if start.elapsed() > timeout {
            return false;
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    true
}
