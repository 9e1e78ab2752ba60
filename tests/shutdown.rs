//! End-to-end scenario: a running instance retires every service and every
//! thread exits cleanly on `shutdown()`.

use std::time::Duration;

use harbor_rt::context::Behavior;
use harbor_rt::core::Core;
use harbor_rt::handle::Handle;
use harbor_rt::message::Message;
use harbor_rt::{Runtime, RuntimeConfig};

struct AppService;
impl Behavior for AppService {
    fn init(&mut self, _core: &Core, _handle: Handle, _args: &str) -> Result<(), String> {
        Ok(())
    }
    fn handle(&mut self, _core: &Core, _handle: Handle, _msg: Message) {}
}

#[test]
fn shutdown_retires_every_service_and_joins_every_thread() {
    let config = RuntimeConfig { thread: 2, bootstrap: "app".to_string(), ..RuntimeConfig::default() };

    let runtime = Runtime::start(config, |core| {
        core.modules.register("app", Box::new(|| Box::new(AppService)));
    })
    .expect("runtime should start");

    // Give the worker pool a moment to process the logger/bootstrap launch
    // queue entries before we ask everything to stop.
    std::thread::sleep(Duration::from_millis(100));
    assert!(runtime.core.context_total() >= 2, "logger and bootstrap services should both be registered");

    let core_for_check = runtime.core.clone();
    runtime.shutdown();

    assert_eq!(core_for_check.context_total(), 0, "every service should have been retired");
}
