//! BALLOTBOX Change Broadcasting
//!
//! Fans committed ballot mutations out to every connected observer session:
//! - a single sequenced producer, so all observers see the same order
//! - no persistence or replay; a lagging observer is dropped and resyncs
//! - a bounded registry of observer sessions

pub mod message;
pub mod observer;
pub mod broadcaster;

pub use message::*;
pub use observer::*;
pub use broadcaster::*;
