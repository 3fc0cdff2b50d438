//! BALLOTBOX Voting Module
//!
//! Implements the single-vote ballot on top of the stores:
//! - Vote commit coordination (one vote per voter)
//! - Option administration
//! - Tally audit for operator reconciliation
//! - Seed data loading

pub mod lanes;
pub mod coordinator;
pub mod manager;
pub mod audit;
pub mod seed;

pub use lanes::*;
pub use coordinator::*;
pub use manager::*;
pub use audit::*;
pub use seed::*;
