/*! Core runtime of a concurrent actor framework.

A `harbor-rt` process hosts many lightweight, message-driven services
("actors") multiplexed over a small fixed pool of OS worker threads. Each
service runs single-threaded — its behavior is never invoked concurrently
with itself — while the pool as a whole scales across cores. Services are
addressed by opaque [`handle::Handle`]s, communicate by pushing
[`message::Message`]s into each other's [`mailbox::Mailbox`], and the
[`scheduler::Scheduler`] pulls ready mailboxes off a [`queue::GlobalQueue`]
and dispatches a weighted batch from each in turn.

```text
          +-----------+        +------------------+
 services |  Registry | <----- |     Core          |
  create  +-----------+        |  (shared state)   |
 services       ^               +------------------+
          +-----------+                 |
          | GlobalQueue| <---- push ----+
          +-----------+
                |
          +-----------+
          | Scheduler  |  (worker pool)
          +-----------+
```

[`core::Core`] owns every shared subsystem — the handle [`registry::Registry`],
the [`queue::GlobalQueue`], the [`timer::TimerWheel`], the process-wide
[`env::Env`], and the [`module::ModuleTable`] substituting for dynamic code
loading. [`bootstrap::Runtime`] wires a [`config::RuntimeConfig`] into a
running instance: it launches the built-in [`logger::Logger`] service, runs
the configured bootstrap command, and spawns the worker pool plus the timer,
monitor, and socket auxiliary threads.
*/

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod core;
pub mod daemon;
pub mod env;
pub mod error;
pub mod handle;
pub mod logger;
pub mod mailbox;
pub mod message;
pub mod module;
pub mod monitor;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod signal;
pub mod socket;
pub mod timer;

pub use bootstrap::Runtime;
pub use config::RuntimeConfig;
pub use context::{Behavior, BehaviorFactory, ServiceContext};
pub use core::Core;
pub use error::{ConfigError, StartupError};
pub use handle::Handle;
pub use message::{Message, MessageType};
