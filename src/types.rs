//! Shared types for the FLASHVOL agent.
//!
//! Addresses, object references, swap directions and the domain error
//! enum. Ledger- and engine-level modules depend on these without
//! depending on each other.

use std::fmt;

pub use sui_sdk_types::{Address as SuiAddress, ObjectDigest, ObjectId, ObjectReference};

// ---------------------------------------------------------------------------
// Addresses and object ids
// ---------------------------------------------------------------------------

/// Parse a hex address, accepting short forms like `0x2` (left-padded).
pub fn parse_address(s: &str) -> Result<SuiAddress, FarmError> {
    parse_hex32(s).map(SuiAddress::new)
}

pub fn parse_object_id(s: &str) -> Result<ObjectId, FarmError> {
    parse_hex32(s).map(ObjectId::new)
}

/// Object digests arrive from the RPC layer in base58.
pub fn parse_digest(s: &str) -> Result<ObjectDigest, FarmError> {
    s.parse::<ObjectDigest>()
        .map_err(|_| FarmError::Decode(format!("invalid object digest {s}")))
}

fn parse_hex32(s: &str) -> Result<[u8; 32], FarmError> {
    let trimmed = s.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if digits.is_empty() || digits.len() > 64 {
        return Err(FarmError::Config(format!("invalid address: {s}")));
    }
    let padded = format!("{digits:0>64}");
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(&padded, &mut bytes)
        .map_err(|e| FarmError::Config(format!("invalid address {s}: {e}")))?;
    Ok(bytes)
}

/// Abbreviated form for log lines (`0x1234…abcd`).
pub fn short_address(address: &SuiAddress) -> String {
    let full = address.to_string();
    format!("{}…{}", &full[..6], &full[full.len() - 4..])
}

/// One spendable balance fragment of a coin type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinObject {
    pub object_ref: ObjectReference,
    pub balance: u64,
}

/// Exact sum of fragment balances. Widened to avoid overflow on
/// accounts with many large fragments.
pub fn total_balance(coins: &[CoinObject]) -> u128 {
    coins.iter().map(|c| c.balance as u128).sum()
}

// ---------------------------------------------------------------------------
// Swap direction
// ---------------------------------------------------------------------------

/// Direction of one flash-swap leg relative to the pool's (A, B) ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwapDirection {
    /// Spend token A, receive token B.
    AToB,
    /// Spend token B, receive token A. The "reverse" direction.
    BToA,
}

impl SwapDirection {
    pub fn is_reverse(&self) -> bool {
        matches!(self, SwapDirection::BToA)
    }

    pub fn inverse(&self) -> Self {
        match self {
            SwapDirection::AToB => SwapDirection::BToA,
            SwapDirection::BToA => SwapDirection::AToB,
        }
    }
}

impl fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapDirection::AToB => write!(f, "A->B"),
            SwapDirection::BToA => write!(f, "B->A"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for FLASHVOL.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FarmError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pool not found: {0}")]
    PoolNotFound(String),

    #[error("No liquidity position owned by {0}")]
    PositionNotFound(String),

    #[error("Insufficient {coin} balance: requested {requested}, available {available}")]
    InsufficientBalance {
        coin: String,
        requested: u128,
        available: u128,
    },

    #[error("Transaction {digest} failed: {reason}")]
    LedgerExecution { digest: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Signer error: {0}")]
    Signer(String),

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
