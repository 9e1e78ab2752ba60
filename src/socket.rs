//! External I/O boundary. A full epoll/kqueue socket engine is out of scope
//! (SPEC_FULL.md §1); `SocketBridge` captures the contract the real thing
//! would satisfy — poll for readiness, hand back events, wake a target
//! service — so the rest of the runtime (in particular the auxiliary
//! thread layout in §4.H) is shaped correctly around it. Grounded on
//! `skynet_socket.c`'s poll-then-dispatch boundary, minus the actual
//! syscalls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::core::Core;
use crate::handle::Handle;
use crate::message::{Message, MessageType};

/// One queued loopback event: `target` receives `payload` tagged
/// `MessageType::Socket` the next time the bridge is polled.
struct Event {
    target: Handle,
    payload: Box<[u8]>,
}

/// A minimal in-process stand-in for the socket I/O engine: no real file
/// descriptors, just a FIFO of events a test or service can enqueue and that
/// the bridge's poll loop delivers as `Socket`-typed messages.
pub struct SocketBridge {
    pending: Mutex<Vec<Event>>,
    active: AtomicBool,
}

impl SocketBridge {
    pub fn new() -> SocketBridge {
        SocketBridge { pending: Mutex::new(Vec::new()), active: AtomicBool::new(true) }
    }

    /// Enqueue a loopback event; the next `poll_once` delivers it.
    pub fn enqueue(&self, target: Handle, payload: impl Into<Box<[u8]>>) {
        self.pending.lock().unwrap().push(Event { target, payload: payload.into() });
    }

    pub fn shutdown(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Drain and deliver whatever is pending. Returns the number delivered.
    pub fn poll_once(&self, core: &Core) -> usize {
        let events: Vec<Event> = std::mem::take(&mut *self.pending.lock().unwrap());
        let n = events.len();
        for ev in events {
            core.push(ev.target, Message::new(Handle::NONE, 0, MessageType::Socket, Some(ev.payload)));
        }
        n
    }
}

impl Default for SocketBridge {
    fn default() -> SocketBridge {
        SocketBridge::new()
    }
}

/// The dedicated socket thread's body (§4.H): poll on a short fixed
/// interval until shutdown. The real engine blocks in `epoll_wait`; this
/// stand-in sleeps, since there is no underlying fd to block on.
pub fn socket_thread_loop(bridge: &Arc<SocketBridge>, core: &Core, poll_interval: Duration) {
    while bridge.is_active() {
        bridge.poll_once(core);
        std::thread::sleep(poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Behavior;
    use crate::message::Message as Msg;

    struct Sink(Arc<Mutex<Vec<Msg>>>);
    impl Behavior for Sink {
        fn init(&mut self, _c: &Core, _h: Handle, _a: &str) -> Result<(), String> {
            Ok(())
        }
        fn handle(&mut self, _c: &Core, _h: Handle, msg: Msg) {
            self.0.lock().unwrap().push(msg);
        }
    }

    #[test]
    fn enqueued_event_delivers_as_socket_message() {
        let core = Core::new(1, 0);
        let received = Arc::new(Mutex::new(Vec::new()));
        let received2 = received.clone();
        core.modules.register("sink", Box::new(move || Box::new(Sink(received2.clone()))));
        let handle = core.new_service("sink", "").unwrap();
        core.queue.pop();

        let bridge = SocketBridge::new();
        bridge.enqueue(handle, b"hello".to_vec().into_boxed_slice());
        let delivered = bridge.poll_once(&core);
        assert_eq!(delivered, 1);

        let mailbox = core.queue.pop().unwrap();
        let msg = mailbox.pop().unwrap();
        assert_eq!(msg.msg_type, MessageType::Socket);
        assert_eq!(msg.payload.as_deref(), Some(&b"hello"[..]));
    }
}
