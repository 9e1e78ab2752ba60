//! Process-wide key-value environment, populated from the config file.
//!
//! The original (`skynet_env.c`) stores these as globals in an embedded Lua
//! state; Lua is out of scope here (§1), so the same "read-mostly, write-once
//! per key" contract is kept over a plain `RwLock<HashMap>`.

use std::collections::HashMap;
use std::sync::RwLock;

pub struct Env {
    vars: RwLock<HashMap<String, String>>,
}

impl Env {
    pub fn new() -> Env {
        Env { vars: RwLock::new(HashMap::new()) }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.vars.read().unwrap().get(key).cloned()
    }

    /// Set `key`. Panics if `key` is already set, matching the original's
    /// `assert(lua_isnil(...))` write-once contract.
    pub fn set(&self, key: &str, value: impl Into<String>) {
        let mut vars = self.vars.write().unwrap();
        assert!(!vars.contains_key(key), "environment key {key:?} already set");
        vars.insert(key.to_string(), value.into());
    }
}

impl Default for Env {
    fn default() -> Env {
        Env::new()
    }
}
