//! The well-known `"logger"` service: every other service's error-reporting
//! path (`skynet_error`) ultimately sends here. Backed by `tracing` instead
//! of the original's `fprintf`-to-a-reopenable-file, since structured
//! logging is the ambient stack this pack always reaches for.

use crate::context::Behavior;
use crate::core::Core;
use crate::handle::Handle;
use crate::message::{Message, MessageType};

pub struct Logger {
    name: String,
}

impl Logger {
    pub fn new() -> Logger {
        Logger { name: "logger".to_string() }
    }
}

impl Default for Logger {
    fn default() -> Logger {
        Logger::new()
    }
}

impl Behavior for Logger {
    fn init(&mut self, _core: &Core, _handle: Handle, args: &str) -> Result<(), String> {
        if !args.is_empty() {
            self.name = args.to_string();
        }
        tracing::info!(logger = %self.name, "logger service started");
        Ok(())
    }

    fn handle(&mut self, _core: &Core, _handle: Handle, msg: Message) {
        let text = msg.payload.as_deref().map(String::from_utf8_lossy).unwrap_or_default();
        match msg.msg_type {
            MessageType::Error => tracing::error!(source = %msg.source, "{text}"),
            MessageType::Text => tracing::info!(source = %msg.source, "{text}"),
            other => tracing::debug!(source = %msg.source, msg_type = ?other, "{text}"),
        }
    }

    fn signal(&mut self, _core: &Core, _handle: Handle, _signal: i32) {
        if crate::signal::take_sighup() {
            tracing::info!(logger = %self.name, "reopening on SIGHUP (no-op: tracing writers aren't file-backed here)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_name_is_logger() {
        assert_eq!(Logger::new().name, "logger");
    }

    #[test]
    fn init_with_args_renames() {
        let mut l = Logger::new();
        let core = Core::new(1, 0);
        l.init(&core, Handle(1), "audit").unwrap();
        assert_eq!(l.name, "audit");
    }
}
