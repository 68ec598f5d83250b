//! Incremental parsing of the chat event stream.
//!
//! Bytes flow through [`framer::EventFramer`] (blank-line framing),
//! [`decoder::decode_block`] (`event:`/`data:` fields), and
//! [`dispatcher::StreamDispatcher`] (turn side effects).

pub mod decoder;
pub mod dispatcher;
pub mod framer;

pub use decoder::{decode_block, WireEvent};
pub use dispatcher::{DispatchOutcome, EventKind, StreamDispatcher};
pub use framer::EventFramer;
