//! FLASHVOL: flash-swap volume agent for fixed-curve Sui pools
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod account;
pub mod config;
pub mod engine;
pub mod ledger;
pub mod pools;
pub mod types;
