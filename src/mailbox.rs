//! Per-service mailbox: a growable message ring plus the bookkeeping that
//! lets the scheduler know whether the mailbox is already queued for
//! dispatch. Grounded on `skynet_mq.c`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::handle::Handle;
use crate::message::Message;

/// Starting capacity of a fresh mailbox ring, as in `DEFAULT_QUEUE_SIZE`.
const DEFAULT_CAP: usize = 64;
/// Overload threshold a mailbox starts at; doubles every time length exceeds
/// it, resets to this value when the mailbox empties.
const OVERLOAD_THRESHOLD: usize = 1024;

struct Ring {
    buf: Vec<Option<Message>>,
    head: usize,
    tail: usize,
    cap: usize,
}

impl Ring {
    fn new() -> Ring {
        let mut buf = Vec::with_capacity(DEFAULT_CAP);
        buf.resize_with(DEFAULT_CAP, || None);
        Ring { buf, head: 0, tail: 0, cap: DEFAULT_CAP }
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Current pending-message count: `(tail - head) mod cap`.
    fn len(&self) -> usize {
        if self.tail >= self.head {
            self.tail - self.head
        } else {
            self.tail + self.cap - self.head
        }
    }

    fn push(&mut self, msg: Message) {
        self.buf[self.tail] = Some(msg);
        self.tail += 1;
        if self.tail >= self.cap {
            self.tail = 0;
        }
        if self.head == self.tail {
            self.expand();
        }
    }

    /// Doubling growth: allocate a ring twice the size, copy `head..tail`
    /// (through the wrap) into the front of the new buffer, and reset
    /// `head = 0`, `tail = old_cap`.
    fn expand(&mut self) {
        let new_cap = self.cap * 2;
        let mut new_buf = Vec::with_capacity(new_cap);
        new_buf.resize_with(new_cap, || None);
        for i in 0..self.cap {
            new_buf[i] = self.buf[(self.head + i) % self.cap].take();
        }
        self.buf = new_buf;
        self.head = 0;
        self.tail = self.cap;
        self.cap = new_cap;
    }

    fn pop(&mut self) -> Option<Message> {
        if self.is_empty() {
            return None;
        }
        let msg = self.buf[self.head].take();
        self.head += 1;
        if self.head >= self.cap {
            self.head = 0;
        }
        msg
    }
}

struct MailboxInner {
    ring: Ring,
    overload_threshold: usize,
    last_overload: Option<usize>,
}

/// A service's inbox. `in_global` doubles as the mutual-exclusion token: a
/// mailbox is dispatched by at most one worker at a time because the flag is
/// cleared only when the mailbox empties or is explicitly re-pushed.
pub struct Mailbox {
    pub handle: Handle,
    inner: Mutex<MailboxInner>,
    in_global: AtomicBool,
    release: AtomicBool,
    /// Intrusive linkage into the global run queue.
    pub(crate) next: Mutex<Option<Arc<Mailbox>>>,
    len_hint: AtomicUsize,
}

impl Mailbox {
    pub fn new(handle: Handle) -> Arc<Mailbox> {
        Arc::new(Mailbox {
            handle,
            inner: Mutex::new(MailboxInner {
                ring: Ring::new(),
                overload_threshold: OVERLOAD_THRESHOLD,
                last_overload: None,
            }),
            // A freshly created mailbox starts "in global" per skynet_mq_create's
            // comment: it must not be pushed into the global queue a second time
            // by an eager push() before the caller explicitly enqueues it post-init.
            in_global: AtomicBool::new(true),
            release: AtomicBool::new(false),
            next: Mutex::new(None),
            len_hint: AtomicUsize::new(0),
        })
    }

    #[inline]
    pub fn in_global(&self) -> bool {
        self.in_global.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn is_release(&self) -> bool {
        self.release.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.len_hint.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push a message. If the mailbox was not already queued for dispatch,
    /// the caller must push it onto the global queue (returned as `true`).
    #[must_use]
    pub fn push(&self, msg: Message) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.ring.push(msg);
        self.len_hint.store(inner.ring.len(), Ordering::SeqCst);
        drop(inner);
        self.in_global.swap(true, Ordering::SeqCst) == false
    }

    /// Pop a message. Returns `None` and clears `in_global` if the mailbox
    /// is empty; otherwise returns the message and, if the mailbox's length
    /// exceeded the current overload threshold, records an overload
    /// observation and doubles the threshold.
    pub fn pop(&self) -> Option<Message> {
        let mut inner = self.inner.lock().unwrap();
        match inner.ring.pop() {
            Some(msg) => {
                let len = inner.ring.len();
                self.len_hint.store(len, Ordering::SeqCst);
                while len > inner.overload_threshold {
                    inner.last_overload = Some(len);
                    inner.overload_threshold *= 2;
                }
                Some(msg)
            }
            None => {
                inner.overload_threshold = OVERLOAD_THRESHOLD;
                self.len_hint.store(0, Ordering::SeqCst);
                self.in_global.store(false, Ordering::SeqCst);
                None
            }
        }
    }

    /// Consume and return the most recent overload observation, if any.
    pub fn overload_observation(&self) -> Option<usize> {
        let mut inner = self.inner.lock().unwrap();
        inner.last_overload.take()
    }

    /// Mark the mailbox for teardown. If it is not currently queued, push it
    /// so the scheduler observes the flag and tears it down.
    pub fn mark_release(self: &Arc<Self>) -> bool {
        assert!(!self.release.swap(true, Ordering::SeqCst), "mailbox already marked for release");
        self.in_global.swap(true, Ordering::SeqCst) == false
    }

    /// Drain all remaining messages, invoking `drop_fn` on each payload, then
    /// return. Called by the scheduler when it pops a mailbox whose release
    /// flag is set.
    pub fn drain_and_release<F: FnMut(Message)>(&self, mut drop_fn: F) {
        while let Some(msg) = self.pop() {
            drop_fn(msg);
        }
    }
}
