//! Global run queue: a strict FIFO of mailboxes that currently hold work.
//! Ownership: a mailbox queued here is not separately owned by the queue —
//! the queue merely threads it by its intrusive `next` link. Grounded on
//! `skynet_globalmq_push`/`skynet_globalmq_pop`.

use std::sync::{Arc, Mutex};

use crate::mailbox::Mailbox;

struct Inner {
    head: Option<Arc<Mailbox>>,
    tail: Option<Arc<Mailbox>>,
}

pub struct GlobalQueue {
    inner: Mutex<Inner>,
}

impl GlobalQueue {
    pub fn new() -> GlobalQueue {
        GlobalQueue { inner: Mutex::new(Inner { head: None, tail: None }) }
    }

    /// Append `mailbox` at the tail. The caller must ensure `mailbox.next`
    /// is currently empty (it is not already linked).
    pub fn push(&self, mailbox: Arc<Mailbox>) {
        let mut inner = self.inner.lock().unwrap();
        debug_assert!(mailbox.next.lock().unwrap().is_none());
        match inner.tail.take() {
            Some(old_tail) => {
                *old_tail.next.lock().unwrap() = Some(mailbox.clone());
                inner.tail = Some(mailbox);
            }
            None => {
                inner.head = Some(mailbox.clone());
                inner.tail = Some(mailbox);
            }
        }
    }

    /// Detach and return the head mailbox, in FIFO order.
    pub fn pop(&self) -> Option<Arc<Mailbox>> {
        let mut inner = self.inner.lock().unwrap();
        let head = inner.head.take()?;
        let next = head.next.lock().unwrap().take();
        match next {
            Some(n) => inner.head = Some(n),
            None => inner.tail = None,
        }
        Some(head)
    }
}

impl Default for GlobalQueue {
    fn default() -> GlobalQueue {
        GlobalQueue::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::Handle;

    #[test]
    fn fifo_ordering() {
        let q = GlobalQueue::new();
        let a = Mailbox::new(Handle(1));
        let b = Mailbox::new(Handle(2));
        q.push(a.clone());
        q.push(b.clone());
        let first = q.pop().unwrap();
        assert_eq!(first.handle, a.handle);
        let second = q.pop().unwrap();
        assert_eq!(second.handle, b.handle);
        assert!(q.pop().is_none());
    }

    #[test]
    fn pop_clears_next_link() {
        let q = GlobalQueue::new();
        let a = Mailbox::new(Handle(1));
        q.push(a.clone());
        let popped = q.pop().unwrap();
        assert!(popped.next.lock().unwrap().is_none());
    }
}
