//! Boundary glue: turns a `RuntimeConfig` into a running set of threads and
//! back down again. Grounded on `skynet_start.c`'s `skynet_start()` —
//! harbor/registry/mq/module-table init, logger launch, bootstrap command,
//! worker/timer/monitor/socket thread spawn — and its `bootstrap()` command
//! parser.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::RuntimeConfig;
use crate::core::Core;
use crate::error::StartupError;
use crate::logger::Logger;
use crate::scheduler::Scheduler;
use crate::socket::SocketBridge;

const TIMER_TICK: Duration = Duration::from_millis(10); // one centisecond
const MONITOR_INTERVAL: Duration = Duration::from_secs(5);
const SOCKET_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Sleep for up to `total`, but in short slices so a shutdown request is
/// noticed promptly instead of only after the full interval elapses.
fn sleep_in_chunks(total: Duration, shutdown: &AtomicBool) {
    const SLICE: Duration = Duration::from_millis(100);
    let mut remaining = total;
    while remaining > Duration::ZERO && !shutdown.load(Ordering::SeqCst) {
        let step = remaining.min(SLICE);
        std::thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
}

/// Split a bootstrap command like `"snlua bootstrap"` into its module name
/// and argument string, matching `skynet_start.c`'s `bootstrap()` parser
/// (first whitespace-delimited token is the module, the rest is args).
fn split_bootstrap(command: &str) -> (&str, &str) {
    match command.split_once(' ') {
        Some((module, args)) => (module, args.trim_start()),
        None => (command, ""),
    }
}

/// A running instance: owns every auxiliary thread and the shared `Core`.
/// Dropping a `Runtime` does not stop it — call `shutdown()` explicitly.
pub struct Runtime {
    pub core: Arc<Core>,
    scheduler: Arc<Scheduler>,
    socket_bridge: Arc<SocketBridge>,
    workers: Vec<JoinHandle<()>>,
    timer_thread: Option<JoinHandle<()>>,
    monitor_thread: Option<JoinHandle<()>>,
    socket_thread: Option<JoinHandle<()>>,
    aux_shutdown: Arc<AtomicBool>,
}

impl Runtime {
    /// Bring up a full runtime instance from `config`. `register_modules` is
    /// called with the fresh `Core` before the built-in logger or the
    /// configured bootstrap command are launched, so callers can load their
    /// own `Behavior` factories under the names their bootstrap command and
    /// service code expect — the in-process substitute for the original's
    /// `cpath` module search happening before `bootstrap()` runs.
    pub fn start(config: RuntimeConfig, register_modules: impl FnOnce(&Core)) -> Result<Runtime, StartupError> {
        let start_wall = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as u32).unwrap_or(0);
        let core = Arc::new(Core::new(config.harbor, start_wall));

        core.modules.register("logger", Box::new(|| Box::new(Logger::new())));
        register_modules(&core);

        let scheduler = Arc::new(Scheduler::new(config.thread));

        // Wire the wake hook before anything can push, so the very first
        // service launch already has a working notify path to the worker
        // pool's park/wake gate.
        {
            let scheduler = scheduler.clone();
            core.set_wake_hook(Box::new(move || scheduler.notify_work()));
        }

        core.new_service(&config.logservice, config.logger.as_deref().unwrap_or(""))
            .map_err(StartupError::LoggerFailed)?;

        let (bootstrap_module, bootstrap_args) = split_bootstrap(&config.bootstrap);
        core.new_service(bootstrap_module, bootstrap_args)
            .map_err(|_| StartupError::BootstrapFailed(config.bootstrap.clone()))?;

        core.set_profile(config.profile);

        let socket_bridge = Arc::new(SocketBridge::new());
        let aux_shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(config.thread);
        for worker_id in 0..config.thread {
            let core = core.clone();
            let scheduler = scheduler.clone();
            let handle = std::thread::Builder::new()
                .name(format!("harbor-worker-{worker_id}"))
                .spawn(move || scheduler.worker_loop(&core, worker_id))
                .map_err(|source| StartupError::ThreadSpawn { kind: "worker", source })?;
            workers.push(handle);
        }

        let timer_thread = {
            let core = core.clone();
            let shutdown = aux_shutdown.clone();
            std::thread::Builder::new()
                .name("harbor-timer".to_string())
                .spawn(move || {
                    while !shutdown.load(Ordering::SeqCst) {
                        core.fire_timers();
                        std::thread::sleep(TIMER_TICK);
                    }
                })
                .map_err(|source| StartupError::ThreadSpawn { kind: "timer", source })?
        };

        let monitor_thread = {
            let core = core.clone();
            let scheduler = scheduler.clone();
            let shutdown = aux_shutdown.clone();
            std::thread::Builder::new()
                .name("harbor-monitor".to_string())
                .spawn(move || {
                    while !shutdown.load(Ordering::SeqCst) {
                        crate::monitor::watchdog_pass(&scheduler.monitor, &core);
                        sleep_in_chunks(MONITOR_INTERVAL, &shutdown);
                    }
                })
                .map_err(|source| StartupError::ThreadSpawn { kind: "monitor", source })?
        };

        let socket_thread = {
            let core = core.clone();
            let bridge = socket_bridge.clone();
            std::thread::Builder::new()
                .name("harbor-socket".to_string())
                .spawn(move || crate::socket::socket_thread_loop(&bridge, &core, SOCKET_POLL_INTERVAL))
                .map_err(|source| StartupError::ThreadSpawn { kind: "socket", source })?
        };

        Ok(Runtime {
            core,
            scheduler,
            socket_bridge,
            workers,
            timer_thread: Some(timer_thread),
            monitor_thread: Some(monitor_thread),
            socket_thread: Some(socket_thread),
            aux_shutdown,
        })
    }

    pub fn socket_bridge(&self) -> &Arc<SocketBridge> {
        &self.socket_bridge
    }

    /// Graceful shutdown (§8's "all services retire, threads exit
    /// cleanly"): stop accepting new dispatch work and let every worker
    /// drain the run queue it already holds, join the pool, and only then
    /// retire whatever is left and stop the auxiliary threads — retiring
    /// while workers might still be mid-dispatch on the same mailboxes
    /// would race the scheduler's own teardown of them.
    pub fn shutdown(mut self) {
        self.scheduler.request_shutdown();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }

        self.core.retire_all();

        self.aux_shutdown.store(true, Ordering::SeqCst);
        self.socket_bridge.shutdown();
        if let Some(t) = self.timer_thread.take() {
            let _ = t.join();
        }
        if let Some(t) = self.monitor_thread.take() {
            let _ = t.join();
        }
        if let Some(t) = self.socket_thread.take() {
            let _ = t.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_bootstrap_separates_module_and_args() {
        assert_eq!(split_bootstrap("snlua bootstrap"), ("snlua", "bootstrap"));
        assert_eq!(split_bootstrap("echo"), ("echo", ""));
        assert_eq!(split_bootstrap("snlua   bootstrap.lua arg1"), ("snlua", "bootstrap.lua arg1"));
    }
}
