//! Fleetly Shared Types and Utilities
//!
//! This crate contains the domain types, errors, and database utilities
//! shared across the Fleetly platform.

pub mod db;
pub mod error;
pub mod types;

pub use db::*;
pub use error::*;
pub use types::*;
