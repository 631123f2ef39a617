//! Core engine: batch → cycle → flash-swap leg.

pub mod batch;
pub mod cycle;
pub mod events;
pub mod flash_swap;
pub mod pacing;
pub mod yield_claim;
