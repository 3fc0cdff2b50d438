//! BALLOTBOX Node Implementation
//!
//! Combines the voting services into a runnable node:
//! - Ballot and voter stores
//! - Change broadcaster
//! - HTTP API with bearer token auth
//! - WebSocket change stream

mod api;
mod auth;
mod node;
mod runtime;
mod ws;

pub use api::*;
pub use auth::*;
pub use node::*;
pub use runtime::*;
pub use ws::*;
