//! Typed errors for the start-up path (§7). Per-message failures
//! (send-to-dead-handle, mailbox overload) are not represented here — they
//! are returned directly from the operations that can produce them, since
//! they are recoverable at the call site rather than process-fatal.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("config file unreadable: {0}: {1}")]
    Unreadable(PathBuf, #[source] std::io::Error),
    #[error("malformed config: {0}")]
    Malformed(#[from] config::ConfigError),
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not spawn {kind} thread: {source}")]
    ThreadSpawn {
        kind: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("module load failed: no behavior registered under {0:?}")]
    ModuleNotFound(String),
    #[error("logger service {0:?} failed to start")]
    LoggerFailed(String),
    #[error("bootstrap command {0:?} failed to start")]
    BootstrapFailed(String),
    #[error("pidfile {0:?} is locked by another instance (pid {1})")]
    PidfileLocked(PathBuf, i32),
    #[error("daemonization failed: {0}")]
    Daemonize(#[source] std::io::Error),
}
