//! Pool registry.
//!
//! Static catalog of the fixed-curve pools the agent trades, together with
//! the protocol objects every flash swap references (trade package,
//! slippage-check package, clock and market config).

pub mod coins;

use hex_literal::hex;

use crate::types::{FarmError, ObjectId, SwapDirection};
use coins::CoinType;

// ---------------------------------------------------------------------------
// Protocol constants
// ---------------------------------------------------------------------------

/// Package exposing `trade::*`, `collect::*` and `position::Position`.
pub const TRADE_PACKAGE: ObjectId =
    ObjectId::new(hex!("70285592c97965e811e0c6f98dccc3a9c2b4ad854b3594faab9597ada267b860"));

/// Package exposing `slippage_check::assert_slippage`.
pub const SLIPPAGE_PACKAGE: ObjectId =
    ObjectId::new(hex!("8add2f0f8bc9748687639d7eb59b2172ba09a0172d9e63c029e23a7dbdb6abe6"));

/// Sui framework package (`coin`, `balance`).
pub const FRAMEWORK_PACKAGE: ObjectId = system_object(0x2);

/// Well-known objects live at short addresses (`0x2`, `0x6`).
const fn system_object(id: u8) -> ObjectId {
    let mut bytes = [0u8; 32];
    bytes[31] = id;
    ObjectId::new(bytes)
}

/// A shared object reference as passed to a Move call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedObject {
    pub id: ObjectId,
    pub initial_shared_version: u64,
    pub mutable: bool,
}

pub const CLOCK: SharedObject = SharedObject {
    id: system_object(0x6),
    initial_shared_version: 1,
    mutable: false,
};

pub const MARKET_CONFIG: SharedObject = SharedObject {
    id: ObjectId::new(hex!(
        "2375a0b1ec12010aaea3b2545acfa2ad34cfbba03ce4b59f4c39e1e25eed1b2a"
    )),
    initial_shared_version: 499761252,
    mutable: false,
};

const FORWARD_PARAMETER: u128 = 4_295_048_017;
const REVERSE_PARAMETER: u128 = 79_226_673_515_401_279_992_447_579_050;

// ---------------------------------------------------------------------------
// Pools
// ---------------------------------------------------------------------------

/// Value-compared pool identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolTag {
    SuiUsdc,
    UsdtUsdc,
}

/// A tradable pool and its protocol constants. Immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool {
    pub tag: PoolTag,
    pub name: &'static str,
    pub object_id: ObjectId,
    pub initial_shared_version: u64,
    pub token_a: CoinType,
    pub token_b: CoinType,
    /// Curve bound for A→B swaps.
    pub parameter: u128,
    /// Curve bound for B→A swaps.
    pub reverse_parameter: u128,
    /// Direction of the first leg of a round trip, i.e. which side an
    /// account is expected to fund.
    pub entry_direction: SwapDirection,
}

pub static POOLS: [Pool; 2] = [
    Pool {
        tag: PoolTag::SuiUsdc,
        name: "SUI_USDC",
        object_id: ObjectId::new(hex!(
            "455cf8d2ac91e7cb883f515874af750ed3cd18195c970b7a2d46235ac2b0c388"
        )),
        initial_shared_version: 499761256,
        token_a: coins::SUI,
        token_b: coins::USDC,
        parameter: FORWARD_PARAMETER,
        reverse_parameter: REVERSE_PARAMETER,
        entry_direction: SwapDirection::AToB,
    },
    Pool {
        tag: PoolTag::UsdtUsdc,
        name: "USDT_USDC",
        object_id: ObjectId::new(hex!(
            "8a86062a0193c48b9d7c42e5d522ed1b30ba1010c72e0cd0dad1525036775c8b"
        )),
        initial_shared_version: 499761263,
        token_a: coins::USDT,
        token_b: coins::USDC,
        parameter: FORWARD_PARAMETER,
        reverse_parameter: REVERSE_PARAMETER,
        entry_direction: SwapDirection::BToA,
    },
];

impl Pool {
    /// Shared, mutable reference to the pool object.
    pub fn shared_ref(&self) -> SharedObject {
        SharedObject {
            id: self.object_id,
            initial_shared_version: self.initial_shared_version,
            mutable: true,
        }
    }

    /// Coin spent by a swap in `direction`.
    pub fn source(&self, direction: SwapDirection) -> CoinType {
        match direction {
            SwapDirection::AToB => self.token_a,
            SwapDirection::BToA => self.token_b,
        }
    }

    /// Coin received by a swap in `direction`.
    pub fn destination(&self, direction: SwapDirection) -> CoinType {
        self.source(direction.inverse())
    }

    /// The curve parameter that must accompany a swap in `direction`.
    pub fn curve_parameter(&self, direction: SwapDirection) -> u128 {
        match direction {
            SwapDirection::AToB => self.parameter,
            SwapDirection::BToA => self.reverse_parameter,
        }
    }
}

/// Resolve a pool by name. Swapped-order aliases resolve to the same record.
pub fn lookup(name: &str) -> Result<&'static Pool, FarmError> {
    let tag = match name.trim().to_ascii_uppercase().as_str() {
        "SUI_USDC" => PoolTag::SuiUsdc,
        "USDT_USDC" | "USDC_USDT" => PoolTag::UsdtUsdc,
        _ => return Err(FarmError::PoolNotFound(name.to_string())),
    };
    Ok(by_tag(tag))
}

pub fn by_tag(tag: PoolTag) -> &'static Pool {
    match tag {
        PoolTag::SuiUsdc => &POOLS[0],
        PoolTag::UsdtUsdc => &POOLS[1],
    }
}

pub fn all() -> &'static [Pool] {
    &POOLS
}
