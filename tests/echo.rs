//! End-to-end scenario: a service that echoes every message back to its
//! sender, exercised through a real worker pool.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use harbor_rt::context::Behavior;
use harbor_rt::core::Core;
use harbor_rt::handle::Handle;
use harbor_rt::message::{Message, MessageType};

struct Echo;
impl Behavior for Echo {
    fn init(&mut self, _core: &Core, _handle: Handle, _args: &str) -> Result<(), String> {
        Ok(())
    }
    fn handle(&mut self, core: &Core, handle: Handle, msg: Message) {
        core.push(msg.source, Message::new(handle, msg.session, MessageType::Response, msg.payload));
    }
}

struct Collector(Arc<Mutex<Vec<Message>>>);
impl Behavior for Collector {
    fn init(&mut self, _core: &Core, _handle: Handle, _args: &str) -> Result<(), String> {
        Ok(())
    }
    fn handle(&mut self, _core: &Core, _handle: Handle, msg: Message) {
        self.0.lock().unwrap().push(msg);
    }
}

#[test]
fn echo_service_replies_to_sender() {
    let harness = common::Harness::start(2);
    harness.core.modules.register("echo", Box::new(|| Box::new(Echo)));

    let received = Arc::new(Mutex::new(Vec::new()));
    let received_for_factory = received.clone();
    harness.core.modules.register("collector", Box::new(move || Box::new(Collector(received_for_factory.clone()))));

    let echo_handle = harness.core.new_service("echo", "").unwrap();
    let collector_handle = harness.core.new_service("collector", "").unwrap();

    harness.core.push(
        echo_handle,
        Message::new(collector_handle, 42, MessageType::Text, Some(b"ping".to_vec().into_boxed_slice())),
    );

    let arrived = common::wait_until(|| !received.lock().unwrap().is_empty(), Duration::from_secs(2));
    assert!(arrived, "echo reply never arrived");

    let replies = received.lock().unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].source, echo_handle);
    assert_eq!(replies[0].session, 42);
    assert_eq!(replies[0].msg_type, MessageType::Response);
    assert_eq!(replies[0].payload.as_deref(), Some(&b"ping"[..]));

    harness.shutdown();
}
