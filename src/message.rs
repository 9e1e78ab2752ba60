//! Message envelope and the wire-visible type tag.
//!
//! Tag values are fixed by the external boundary (§6 of the design): other
//! services key off these discriminants, so they must not be renumbered.

use crate::handle::Handle;

/// The type tag carried in the message envelope. External services rely on
/// these exact values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Text = 0,
    Response = 1,
    Multicast = 2,
    Client = 3,
    System = 4,
    Harbor = 5,
    Socket = 6,
    Error = 7,
    Reserved = 8,
    Query = 9,
    Debug = 10,
    Lua = 11,
}

/// A message passed between services. The payload's ownership transfers to
/// the recipient on delivery; if the message is dropped undelivered the
/// payload is simply dropped along with it (Rust's `Box` makes the original
/// C "drop callback that frees the payload" automatic).
#[derive(Debug, Clone)]
pub struct Message {
    pub source: Handle,
    /// Non-zero means "this is a reply/awaitable".
    pub session: i32,
    pub payload: Option<Box<[u8]>>,
    pub msg_type: MessageType,
}

impl Message {
    pub fn new(source: Handle, session: i32, msg_type: MessageType, payload: Option<Box<[u8]>>) -> Message {
        Message { source, session, payload, msg_type }
    }

    /// A zero-length system/response message, as the timer and signal paths
    /// synthesize.
    pub fn empty(source: Handle, session: i32, msg_type: MessageType) -> Message {
        Message { source, session, payload: None, msg_type }
    }
}
