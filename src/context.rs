//! Service context: the handle, behavior, and mailbox that make up one
//! actor. Grounded on the `skynet_context` struct described in §3/§4.B of
//! the design and on `skynet_server.c`'s `skynet_context_new`/`_push`/
//! `_dispatchall` (the dispatch-all tail is visible through `skynet_start.c`'s
//! `bootstrap()` forcing the logger to flush).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crate::handle::Handle;
use crate::mailbox::Mailbox;
use crate::message::Message;

/// A loaded service's behavior. Only `init` is required — `create`,
/// `signal`, and `release` default to no-ops, mirroring "only `_init` is
/// required" from the module-symbol contract in §6.
pub trait Behavior: Send {
    /// Called once, before `init`, with no arguments.
    fn create(&mut self) {}

    /// Called once after the context is registered. `Err` aborts start-up
    /// of this service: the handle is retired and `0` is returned to the
    /// caller of `new_service`.
    fn init(&mut self, core: &crate::core::Core, handle: Handle, args: &str) -> Result<(), String>;

    /// Invoked once per dispatched message.
    fn handle(&mut self, core: &crate::core::Core, handle: Handle, msg: Message);

    /// Out-of-band control signal (module-defined meaning).
    fn signal(&mut self, _core: &crate::core::Core, _handle: Handle, _signal: i32) {}

    /// Called when the service is retired, before its mailbox is drained.
    fn release(&mut self) {}
}

/// A behavior factory: the in-process substitute for the dynamic module
/// loader named in §6/§9 (dynamic code modules are explicitly out of
/// scope — see SPEC_FULL.md §1).
pub type BehaviorFactory = Box<dyn Fn() -> Box<dyn Behavior> + Send + Sync>;

pub struct ServiceContext {
    handle: OnceLock<Handle>,
    pub(crate) behavior: Mutex<Box<dyn Behavior>>,
    mailbox: OnceLock<Arc<Mailbox>>,
    endless: AtomicBool,
    /// Accumulated thread CPU time in microseconds, when profiling is on.
    profile_us: AtomicU64,
}

impl ServiceContext {
    pub(crate) fn new(behavior: Box<dyn Behavior>) -> ServiceContext {
        ServiceContext {
            handle: OnceLock::new(),
            behavior: Mutex::new(behavior),
            mailbox: OnceLock::new(),
            endless: AtomicBool::new(false),
            profile_us: AtomicU64::new(0),
        }
    }

    pub(crate) fn assign(&self, handle: Handle, mailbox: Arc<Mailbox>) {
        self.handle.set(handle).ok().expect("context already assigned a handle");
        self.mailbox.set(mailbox).ok().expect("context already assigned a mailbox");
    }

    pub fn handle(&self) -> Handle {
        *self.handle.get().expect("context not yet registered")
    }

    pub fn mailbox(&self) -> &Arc<Mailbox> {
        self.mailbox.get().expect("context not yet registered")
    }

    pub fn is_endless(&self) -> bool {
        self.endless.load(Ordering::SeqCst)
    }

    /// Watchdog-only: set the endless flag. Idempotent.
    pub(crate) fn mark_endless(&self) {
        self.endless.store(true, Ordering::SeqCst);
    }

    pub fn profile_micros(&self) -> u64 {
        self.profile_us.load(Ordering::SeqCst)
    }

    pub(crate) fn add_profile_micros(&self, delta: u64) {
        self.profile_us.fetch_add(delta, Ordering::SeqCst);
    }

    /// Drain the mailbox synchronously, invoking the behavior per message.
    /// Used during shutdown to flush a service (e.g. force the logger to
    /// print queued errors before process exit).
    pub fn dispatch_all(self: &Arc<Self>, core: &crate::core::Core) {
        let handle = self.handle();
        while let Some(msg) = self.mailbox().pop() {
            self.behavior.lock().unwrap().handle(core, handle, msg);
        }
    }
}
