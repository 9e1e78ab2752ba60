//! Handle registry: bidirectional name<->id map, id allocation, and
//! context lookup. Grounded verbatim on `skynet_handle.c`.

use std::sync::{Arc, RwLock};

use crate::context::ServiceContext;
use crate::handle::{Handle, HANDLE_MASK, HARBOR_SHIFT};

const DEFAULT_SLOT_SIZE: usize = 4;
const MAX_SLOT_SIZE: usize = 0x4000_0000;
const DEFAULT_NAME_CAP: usize = 2;

struct Inner {
    harbor: u32,
    handle_index: u32,
    slots: Vec<Option<Arc<ServiceContext>>>,
    names: Vec<(String, Handle)>,
}

/// Process-wide handle table, guarded by a reader-writer lock. Readers
/// (`grab`, `find_name`) dominate and are contention-light.
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Registry {
    pub fn new(harbor: u8) -> Registry {
        Registry {
            inner: RwLock::new(Inner {
                harbor: (harbor as u32) << HARBOR_SHIFT,
                handle_index: 1,
                slots: vec![None; DEFAULT_SLOT_SIZE],
                names: Vec::with_capacity(DEFAULT_NAME_CAP),
            }),
        }
    }

    /// Allocate a handle for `ctx` and slot it in. Probes linearly from
    /// `handle_index`; doubles the table on a full pass. Terminates (by
    /// panicking, as the original aborts) only once the table would exceed
    /// `MAX_SLOT_SIZE` entries — see the open question in SPEC_FULL.md §9.
    pub fn register(&self, ctx: Arc<ServiceContext>) -> Handle {
        let mut inner = self.inner.write().unwrap();
        loop {
            let slot_size = inner.slots.len();
            let mut handle = inner.handle_index;
            let mut found = None;
            for _ in 0..slot_size {
                if handle > HANDLE_MASK {
                    handle = 1;
                }
                let hash = (handle as usize) & (slot_size - 1);
                if inner.slots[hash].is_none() {
                    found = Some((hash, handle));
                    break;
                }
                handle += 1;
            }
            if let Some((hash, handle)) = found {
                inner.slots[hash] = Some(ctx.clone());
                inner.handle_index = handle.wrapping_add(1);
                let full_handle = Handle(handle | inner.harbor);
                ctx.assign(full_handle, crate::mailbox::Mailbox::new(full_handle));
                return full_handle;
            }
            // No free slot after a full pass: double the table and rehash.
            assert!(slot_size * 2 - 1 <= HANDLE_MASK as usize, "handle table exceeds its hard cap");
            assert!(slot_size * 2 <= MAX_SLOT_SIZE, "handle table exceeds its hard cap");
            let mut new_slots: Vec<Option<Arc<ServiceContext>>> = vec![None; slot_size * 2];
            for slot in inner.slots.drain(..) {
                if let Some(c) = slot {
                    let h = c.handle().0;
                    let new_hash = (h as usize) & (slot_size * 2 - 1);
                    assert!(new_slots[new_hash].is_none(), "rehash collision");
                    new_slots[new_hash] = Some(c);
                }
            }
            inner.slots = new_slots;
        }
    }

    /// Remove `handle`'s slot and any names pointing at it. Returns the
    /// removed context, if `handle` was live.
    pub fn retire(&self, handle: Handle) -> Option<Arc<ServiceContext>> {
        let mut inner = self.inner.write().unwrap();
        let slot_size = inner.slots.len();
        let hash = (handle.0 as usize) & (slot_size - 1);
        let matches = matches!(&inner.slots[hash], Some(c) if c.handle() == handle);
        if !matches {
            return None;
        }
        let ctx = inner.slots[hash].take();
        inner.names.retain(|(_, h)| *h != handle);
        ctx
    }

    /// Repeatedly collect occupied handles under the read lock and retire
    /// them outside it, until a full pass finds zero live contexts.
    pub fn retire_all(&self) {
        loop {
            let handles: Vec<Handle> = {
                let inner = self.inner.read().unwrap();
                inner.slots.iter().flatten().map(|c| c.handle()).collect()
            };
            if handles.is_empty() {
                return;
            }
            for h in handles {
                self.retire(h);
            }
        }
    }

    /// Snapshot of every currently-occupied handle, in slot order. Used by
    /// shutdown to iterate services without holding the lock across
    /// per-service work.
    pub fn live_handles(&self) -> Vec<Handle> {
        let inner = self.inner.read().unwrap();
        inner.slots.iter().flatten().map(|c| c.handle()).collect()
    }

    pub fn grab(&self, handle: Handle) -> Option<Arc<ServiceContext>> {
        let inner = self.inner.read().unwrap();
        let slot_size = inner.slots.len();
        let hash = (handle.0 as usize) & (slot_size - 1);
        match &inner.slots[hash] {
            Some(c) if c.handle() == handle => Some(c.clone()),
            _ => None,
        }
    }

    pub fn find_name(&self, name: &str) -> Option<Handle> {
        let inner = self.inner.read().unwrap();
        inner.names.binary_search_by(|(n, _)| n.as_str().cmp(name)).ok().map(|i| inner.names[i].1)
    }

    /// Insert `(handle, name)` into the sorted name array. Fails (returns
    /// `None`) if the name already exists.
    pub fn name_handle(&self, handle: Handle, name: &str) -> Option<String> {
        let mut inner = self.inner.write().unwrap();
        match inner.names.binary_search_by(|(n, _)| n.as_str().cmp(name)) {
            Ok(_) => None,
            Err(pos) => {
                inner.names.insert(pos, (name.to_string(), handle));
                Some(name.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Behavior;
    use crate::message::Message;

    struct Noop;
    impl Behavior for Noop {
        fn init(&mut self, _c: &crate::core::Core, _h: Handle, _a: &str) -> Result<(), String> { Ok(()) }
        fn handle(&mut self, _c: &crate::core::Core, _h: Handle, _m: Message) {}
    }

    fn new_ctx() -> Arc<ServiceContext> {
        Arc::new(ServiceContext::new(Box::new(Noop)))
    }

    #[test]
    fn register_then_grab_then_retire() {
        let reg = Registry::new(1);
        let ctx = new_ctx();
        let h = reg.register(ctx.clone());
        assert!(!h.is_none());
        assert!(reg.grab(h).is_some());
        assert!(reg.retire(h).is_some());
        assert!(reg.grab(h).is_none());
    }

    #[test]
    fn retire_returns_none_for_unknown_handle() {
        let reg = Registry::new(1);
        assert!(reg.retire(Handle(999)).is_none());
    }

    #[test]
    fn table_doubles_when_full() {
        let reg = Registry::new(1);
        let mut handles = Vec::new();
        for _ in 0..10 {
            let ctx = new_ctx();
            handles.push(reg.register(ctx));
        }
        for h in handles {
            assert!(reg.grab(h).is_some());
        }
    }

    #[test]
    fn name_idempotence() {
        let reg = Registry::new(1);
        let ctx = new_ctx();
        let h = reg.register(ctx);
        let first = reg.name_handle(h, "logger");
        assert_eq!(first.as_deref(), Some("logger"));
        let second = reg.name_handle(h, "logger");
        assert!(second.is_none());
        assert_eq!(reg.find_name("logger"), Some(h));
    }

    #[test]
    fn retire_all_empties_table() {
        let reg = Registry::new(1);
        for _ in 0..5 {
            reg.register(new_ctx());
        }
        reg.retire_all();
        let inner = reg.inner.read().unwrap();
        assert!(inner.slots.iter().all(|s| s.is_none()));
    }
}
