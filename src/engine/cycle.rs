//! Trade cycle engine.
//!
//! A cycle is a round trip: a forward leg in the pool's entry direction,
//! a randomized pause, then a reverse leg that sells back exactly what the
//! forward leg realized.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

use super::events::{EventSink, LegKind, TradeEvent};
use super::flash_swap::{FlashSwapExecutor, LegReceipt};
use super::pacing::{Pacer, PacingWindow};
use crate::ledger::signer::Signer;
use crate::ledger::Ledger;
use crate::pools::coins::CoinType;
use crate::pools::Pool;
use crate::types::{total_balance, CoinObject, FarmError};

/// Share of the SUI balance traded when no amount is configured. The rest
/// stays behind for gas.
const SUI_FULL_BALANCE_PCT: u128 = 90;

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Completed {
        forward: LegReceipt,
        reverse: LegReceipt,
    },
    ForwardFailed {
        reason: String,
    },
    /// The account is left holding the forward leg's proceeds.
    ReverseFailed {
        forward: LegReceipt,
        reason: String,
    },
}

impl CycleOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, CycleOutcome::Completed { .. })
    }
}

/// Decide the forward amount in source base units.
///
/// `requested` is in human units of the source coin. Without one, the whole
/// balance is used (90 % for SUI).
pub fn size_trade(
    source: CoinType,
    fragments: &[CoinObject],
    requested: Option<Decimal>,
) -> Result<u64, FarmError> {
    let available = total_balance(fragments);

    let amount = match requested {
        Some(human) => {
            let wanted = source.to_base_units(human)? as u128;
            if wanted > available {
                return Err(FarmError::InsufficientBalance {
                    coin: source.symbol.to_string(),
                    requested: wanted,
                    available,
                });
            }
            wanted
        }
        None if source.is_native_gas() => available * SUI_FULL_BALANCE_PCT / 100,
        None => available,
    };

    if amount == 0 {
        return Err(FarmError::InsufficientBalance {
            coin: source.symbol.to_string(),
            requested: 0,
            available,
        });
    }

    Ok(u64::try_from(amount).unwrap_or(u64::MAX))
}

pub struct TradeCycleEngine {
    ledger: Arc<dyn Ledger>,
    executor: FlashSwapExecutor,
    pacer: Arc<dyn Pacer>,
    events: Arc<dyn EventSink>,
    leg_delay: PacingWindow,
}

impl TradeCycleEngine {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        pacer: Arc<dyn Pacer>,
        events: Arc<dyn EventSink>,
        leg_delay: PacingWindow,
    ) -> Self {
        Self {
            executor: FlashSwapExecutor::new(ledger.clone()),
            ledger,
            pacer,
            events,
            leg_delay,
        }
    }

    /// Run one round trip.
    ///
    /// Returns `Err` only when the cycle never reached the ledger (sizing
    /// or balance lookup). Leg failures are reported through the outcome.
    pub async fn run_cycle(
        &self,
        account: &str,
        signer: &dyn Signer,
        pool: &'static Pool,
        requested: Option<Decimal>,
    ) -> Result<CycleOutcome, FarmError> {
        let forward_direction = pool.entry_direction;
        let reverse_direction = forward_direction.inverse();
        let source = pool.source(forward_direction);
        let destination = pool.destination(forward_direction);

        let fragments = self
            .ledger
            .spendable_coins(signer.address(), source.type_tag)
            .await?;
        let amount = size_trade(source, &fragments, requested)?;

        debug!(
            account,
            pool = pool.name,
            amount = %source.to_human(amount as u128),
            coin = source.symbol,
            "Starting round trip"
        );

        let forward = match self
            .executor
            .execute_leg(signer, pool, forward_direction, amount)
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                self.leg_failed(account, pool, LegKind::Forward, source, destination, &e);
                return Ok(CycleOutcome::ForwardFailed { reason: e.to_string() });
            }
        };
        self.leg_completed(account, LegKind::Forward, &forward);

        self.pacer.pause(self.leg_delay).await;

        match self
            .executor
            .execute_leg(signer, pool, reverse_direction, forward.realized)
            .await
        {
            Ok(reverse) => {
                self.leg_completed(account, LegKind::Reverse, &reverse);
                Ok(CycleOutcome::Completed { forward, reverse })
            }
            Err(e) => {
                self.leg_failed(account, pool, LegKind::Reverse, destination, source, &e);
                Ok(CycleOutcome::ReverseFailed {
                    forward,
                    reason: e.to_string(),
                })
            }
        }
    }

    fn leg_completed(&self, account: &str, leg: LegKind, receipt: &LegReceipt) {
        self.events.emit(TradeEvent::LegCompleted {
            account: account.to_string(),
            leg,
            direction: receipt.direction,
            source: receipt.source.symbol,
            destination: receipt.destination.symbol,
            amount_in: receipt.source.to_human(receipt.requested as u128),
            amount_out: receipt.destination.to_human(receipt.realized as u128),
            digest: receipt.digest.clone(),
        });
    }

    fn leg_failed(
        &self,
        account: &str,
        pool: &Pool,
        leg: LegKind,
        source: CoinType,
        destination: CoinType,
        error: &FarmError,
    ) {
        debug!(account, leg = %leg, error = %error, "Leg failed");
        self.events.emit(TradeEvent::CycleFailed {
            account: account.to_string(),
            pool: pool.name,
            leg: Some(leg),
            source: source.symbol,
            destination: destination.symbol,
            reason: error.to_string(),
        });
    }
}
