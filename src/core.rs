//! The runtime core: the single struct that owns every shared subsystem
//! (registry, run queue, timer wheel, environment, module table) and
//! exposes the operations `Behavior` implementations and the scheduler call
//! against. Grounded on `skynet_server.c`/`skynet.h`'s `skynet_context_new`,
//! `skynet_send`, `skynet_context_message_dispatch`, and
//! `skynet_handle_retire`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use crate::context::ServiceContext;
use crate::env::Env;
use crate::handle::Handle;
use crate::message::{Message, MessageType};
use crate::module::ModuleTable;
use crate::queue::GlobalQueue;
use crate::registry::Registry;
use crate::timer::TimerWheel;

/// Shared state for one runtime instance. `Core` is never cloned behind an
/// `Arc` held by `ServiceContext` — see SPEC_FULL.md §5/§9 on why the
/// `Core -> Registry -> ServiceContext -> Core` cycle is avoided by passing
/// `&Core` into `Behavior` calls instead of storing it.
pub struct Core {
    pub registry: Registry,
    pub queue: GlobalQueue,
    pub timer: TimerWheel,
    pub env: Env,
    pub modules: ModuleTable,
    profile_enabled: AtomicBool,
    context_total: AtomicUsize,
    /// Called after anything is pushed onto `queue`, so a parked worker can
    /// be woken. Set once by the scheduler at start-up (`set_wake_hook`);
    /// left unset in unit tests that drive `Core` directly.
    wake_hook: OnceLock<Box<dyn Fn() + Send + Sync>>,
}

impl Core {
    pub fn new(harbor: u8, start_wall_secs: u32) -> Core {
        Core {
            registry: Registry::new(harbor),
            queue: GlobalQueue::new(),
            timer: TimerWheel::new(start_wall_secs),
            env: Env::new(),
            modules: ModuleTable::new(),
            profile_enabled: AtomicBool::new(false),
            context_total: AtomicUsize::new(0),
            wake_hook: OnceLock::new(),
        }
    }

    /// Install the callback invoked every time a mailbox is pushed onto the
    /// global queue. Intended to be called once, at start-up, with a
    /// closure that wakes a parked scheduler worker.
    pub fn set_wake_hook(&self, hook: Box<dyn Fn() + Send + Sync>) {
        self.wake_hook.set(hook).ok().expect("wake hook already installed");
    }

    fn wake(&self) {
        if let Some(hook) = self.wake_hook.get() {
            hook();
        }
    }

    /// Exposed for the scheduler: call after re-queuing a mailbox with
    /// leftover work, so another parked worker picks it up.
    pub(crate) fn notify_queued(&self) {
        self.wake();
    }

    pub fn profile_enabled(&self) -> bool {
        self.profile_enabled.load(Ordering::SeqCst)
    }

    pub fn set_profile(&self, on: bool) {
        self.profile_enabled.store(on, Ordering::SeqCst);
    }

    /// Number of currently-registered services. Used by the shutdown path
    /// to decide when every service has retired.
    pub fn context_total(&self) -> usize {
        self.context_total.load(Ordering::SeqCst)
    }

    /// Create and initialize a new service from the module named
    /// `module_name`, passing `args` to `Behavior::init`. On success the
    /// service's mailbox is queued for its first dispatch pass (mirroring
    /// `skynet_context_new`'s unconditional initial `skynet_globalmq_push`).
    /// On failure the handle is retired before `init`'s error is returned.
    pub fn new_service(&self, module_name: &str, args: &str) -> Result<Handle, String> {
        let behavior = self
            .modules
            .create(module_name)
            .ok_or_else(|| format!("module not found: {module_name:?}"))?;
        let ctx = Arc::new(ServiceContext::new(behavior));
        let handle = self.registry.register(ctx.clone());
        self.context_total.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(%handle, module = module_name, "service created");

        let init_result = ctx.behavior.lock().unwrap().init(self, handle, args);
        match init_result {
            Ok(()) => {
                self.queue.push(ctx.mailbox().clone());
                self.wake();
                Ok(handle)
            }
            Err(reason) => {
                self.registry.retire(handle);
                self.context_total.fetch_sub(1, Ordering::SeqCst);
                tracing::error!(%handle, module = module_name, %reason, "service init failed");
                Err(reason)
            }
        }
    }

    /// Deliver `msg` to `handle`'s mailbox, queuing it onto the global run
    /// queue if it was not already queued. Returns `false` (message
    /// dropped) if `handle` does not name a live service.
    pub fn push(&self, handle: Handle, msg: Message) -> bool {
        match self.registry.grab(handle) {
            Some(ctx) => {
                let mailbox = ctx.mailbox().clone();
                if mailbox.push(msg) {
                    self.queue.push(mailbox);
                    self.wake();
                }
                true
            }
            None => false,
        }
    }

    /// Schedule a response-typed message to `handle` after `delay_cs`
    /// centiseconds. `delay_cs <= 0` bypasses the wheel and pushes
    /// immediately, matching `skynet_timeout`'s fast path. Returns the
    /// `session` it was called with, unchanged, so callers can chain it.
    pub fn timeout(&self, handle: Handle, delay_cs: i64, session: i32) -> i32 {
        if delay_cs <= 0 {
            self.push(handle, Message::empty(Handle::NONE, session, MessageType::Response));
        } else {
            self.timer.insert(handle, delay_cs as u32, session);
        }
        session
    }

    /// Advance the timer wheel by one centisecond and push every message
    /// that became due. Returns the number of timers fired. Called from the
    /// dedicated timer thread (§4.H).
    pub fn fire_timers(&self) -> usize {
        let due = self.timer.tick();
        let n = due.len();
        for d in due {
            self.push(d.handle, Message::empty(Handle::NONE, d.session, MessageType::Response));
        }
        n
    }

    pub fn find_name(&self, name: &str) -> Option<Handle> {
        self.registry.find_name(name)
    }

    pub fn name_handle(&self, handle: Handle, name: &str) -> Option<String> {
        self.registry.name_handle(handle, name)
    }

    /// Retire `handle`: remove it from the registry, invoke
    /// `Behavior::release`, and mark its mailbox for teardown (queuing it if
    /// it is not already queued, so the scheduler drains and drops it).
    pub fn retire_handle(&self, handle: Handle) -> bool {
        match self.registry.retire(handle) {
            Some(ctx) => {
                self.context_total.fetch_sub(1, Ordering::SeqCst);
                ctx.behavior.lock().unwrap().release();
                let mailbox = ctx.mailbox().clone();
                if mailbox.mark_release() {
                    self.queue.push(mailbox);
                    self.wake();
                }
                tracing::debug!(%handle, "service retired");
                true
            }
            None => false,
        }
    }

    /// Retire every live service, draining its mailbox synchronously first
    /// (mirrors the shutdown path forcing a final `dispatch_all`, e.g. so
    /// the logger prints anything still queued). Used only at shutdown.
    pub fn retire_all(&self) {
        loop {
            let handles: Vec<Handle> = {
                let snapshot = self.registry.live_handles();
                if snapshot.is_empty() {
                    return;
                }
                snapshot
            };
            for handle in handles {
                if let Some(ctx) = self.registry.grab(handle) {
                    ctx.dispatch_all(self);
                }
                self.retire_handle(handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Behavior;
    use crate::message::Message;

    struct Echo;
    impl Behavior for Echo {
        fn init(&mut self, _core: &Core, _handle: Handle, _args: &str) -> Result<(), String> {
            Ok(())
        }
        fn handle(&mut self, core: &Core, handle: Handle, msg: Message) {
            core.push(msg.source, Message::new(handle, msg.session, msg.msg_type, msg.payload));
        }
    }

    struct RefusesInit;
    impl Behavior for RefusesInit {
        fn init(&mut self, _core: &Core, _handle: Handle, _args: &str) -> Result<(), String> {
            Err("no thanks".to_string())
        }
        fn handle(&mut self, _core: &Core, _handle: Handle, _msg: Message) {}
    }

    fn core_with(name: &str, factory: crate::context::BehaviorFactory) -> Core {
        let core = Core::new(1, 0);
        core.modules.register(name, factory);
        core
    }

    #[test]
    fn new_service_queues_for_first_dispatch() {
        let core = core_with("echo", Box::new(|| Box::new(Echo)));
        let handle = core.new_service("echo", "").unwrap();
        assert!(!handle.is_none());
        assert_eq!(core.context_total(), 1);
        let mailbox = core.queue.pop().unwrap();
        assert_eq!(mailbox.handle, handle);
    }

    #[test]
    fn failed_init_retires_handle_and_reports_error() {
        let core = core_with("bad", Box::new(|| Box::new(RefusesInit)));
        let err = core.new_service("bad", "").unwrap_err();
        assert_eq!(err, "no thanks");
        assert_eq!(core.context_total(), 0);
    }

    #[test]
    fn unknown_module_is_an_error() {
        let core = Core::new(1, 0);
        assert!(core.new_service("missing", "").is_err());
    }

    #[test]
    fn push_to_unknown_handle_returns_false() {
        let core = Core::new(1, 0);
        let delivered = core.push(Handle(999), Message::empty(Handle::NONE, 0, MessageType::Text));
        assert!(!delivered);
    }

    #[test]
    fn zero_delay_timeout_pushes_immediately() {
        let core = core_with("echo", Box::new(|| Box::new(Echo)));
        let handle = core.new_service("echo", "").unwrap();
        core.queue.pop(); // drain initial post-init queue entry
        core.timeout(handle, 0, 55);
        let mailbox = core.queue.pop().unwrap();
        let msg = mailbox.pop().unwrap();
        assert_eq!(msg.session, 55);
        assert_eq!(msg.msg_type, MessageType::Response);
    }

    #[test]
    fn positive_delay_timeout_fires_via_wheel() {
        let core = core_with("echo", Box::new(|| Box::new(Echo)));
        let handle = core.new_service("echo", "").unwrap();
        core.queue.pop();
        core.timeout(handle, 5, 9);
        for _ in 0..4 {
            assert_eq!(core.fire_timers(), 0);
        }
        assert_eq!(core.fire_timers(), 1);
        let mailbox = core.queue.pop().unwrap();
        let msg = mailbox.pop().unwrap();
        assert_eq!(msg.session, 9);
    }

    #[test]
    fn retire_handle_removes_service_and_queues_mailbox_for_teardown() {
        let core = core_with("echo", Box::new(|| Box::new(Echo)));
        let handle = core.new_service("echo", "").unwrap();
        core.queue.pop();
        assert!(core.retire_handle(handle));
        assert_eq!(core.context_total(), 0);
        assert!(!core.push(handle, Message::empty(Handle::NONE, 0, MessageType::Text)));
    }

    #[test]
    fn name_then_find_round_trips() {
        let core = core_with("echo", Box::new(|| Box::new(Echo)));
        let handle = core.new_service("echo", "").unwrap();
        core.name_handle(handle, "echoer");
        assert_eq!(core.find_name("echoer"), Some(handle));
    }
}
