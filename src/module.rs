//! In-process substitute for the dynamic module loader (`skynet_module.c`).
//!
//! Dynamic code modules are an out-of-scope external collaborator (see
//! SPEC_FULL.md §1): the real system `dlopen`s a `.so` per module name. This
//! table keeps the same name -> behavior lookup contract without the
//! loader, registered statically at start-up instead of resolved from a
//! search path at run time.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::context::BehaviorFactory;

pub struct ModuleTable {
    factories: RwLock<HashMap<String, BehaviorFactory>>,
}

impl ModuleTable {
    pub fn new() -> ModuleTable {
        ModuleTable { factories: RwLock::new(HashMap::new()) }
    }

    /// Register a behavior factory under `name`. A module name may contain
    /// dots in the original (the symbol base is taken after the last dot);
    /// here the full name is simply the lookup key.
    pub fn register(&self, name: impl Into<String>, factory: BehaviorFactory) {
        self.factories.write().unwrap().insert(name.into(), factory);
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn crate::context::Behavior>> {
        let factories = self.factories.read().unwrap();
        factories.get(name).map(|f| {
            let mut b = f();
            b.create();
            b
        })
    }
}

impl Default for ModuleTable {
    fn default() -> ModuleTable {
        ModuleTable::new()
    }
}
