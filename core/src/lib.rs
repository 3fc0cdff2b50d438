//! BALLOTBOX Core Library
//!
//! Core types, traits, and abstractions for BALLOTBOX: single-vote ballots
//! whose tallies are pushed live to every connected observer.

pub mod types;
pub mod traits;
pub mod error;
pub mod config;

pub use types::*;
pub use traits::*;
pub use error::*;
pub use config::*;
