//! BALLOTBOX State Management
//!
//! Ballot option and voter storage. Both stores expose atomic per-record
//! operations only: an add-and-fetch on tallies and a conditional
//! first-write on a voter's choice.

pub mod store;
pub mod memory;
pub mod persistent;

pub use store::*;
pub use memory::*;
pub use persistent::*;
