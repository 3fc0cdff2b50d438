//! BALLOTBOX CLI library
//!
//! HTTP client for the node API and terminal rendering helpers.

pub mod commands;

pub use commands::*;
