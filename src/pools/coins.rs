//! Coin catalog: the coin types the pools trade, with display metadata.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::types::FarmError;

/// A known Move coin type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoinType {
    /// Fully-qualified Move type, e.g. `0x2::sui::SUI`.
    pub type_tag: &'static str,
    pub symbol: &'static str,
    pub decimals: u32,
}

pub const SUI: CoinType = CoinType {
    type_tag: "0x2::sui::SUI",
    symbol: "SUI",
    decimals: 9,
};

pub const USDC: CoinType = CoinType {
    type_tag: "0xdba34672e30cb065b1f93e3ab55318768fd6fef66c15942c9f7cb846e2f900e7::usdc::USDC",
    symbol: "USDC",
    decimals: 6,
};

pub const USDT: CoinType = CoinType {
    type_tag: "0xc060006111016b8a020ad5b33834984a437aaa7d3c74c18e09a95d48aceab08c::coin::COIN",
    symbol: "USDT",
    decimals: 6,
};

pub const ALL: [CoinType; 3] = [SUI, USDC, USDT];

/// Reverse lookup by Move type string.
pub fn by_type_tag(type_tag: &str) -> Option<CoinType> {
    ALL.iter().copied().find(|c| c.type_tag == type_tag)
}

impl CoinType {
    /// Whether this is the chain's native gas asset.
    pub fn is_native_gas(&self) -> bool {
        self.type_tag == SUI.type_tag
    }

    /// Convert a human amount (e.g. `12.5` USDC) to base units,
    /// truncating digits beyond the coin's precision.
    pub fn to_base_units(&self, amount: Decimal) -> Result<u64, FarmError> {
        if amount.is_sign_negative() {
            return Err(FarmError::Config(format!(
                "negative {} amount: {amount}",
                self.symbol
            )));
        }
        let scale = Decimal::from(10u64.pow(self.decimals));
        amount
            .checked_mul(scale)
            .and_then(|v| v.trunc().to_u64())
            .ok_or_else(|| {
                FarmError::Config(format!("{} amount out of range: {amount}", self.symbol))
            })
    }

    /// Convert base units back to a human amount for display.
    pub fn to_human(&self, base_units: u128) -> Decimal {
        i128::try_from(base_units)
            .ok()
            .and_then(|v| Decimal::try_from_i128_with_scale(v, self.decimals).ok())
            .unwrap_or(Decimal::MAX)
    }
}

impl std::fmt::Display for CoinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol)
    }
}
