//! Flash-swap transaction builder and leg executor.
//!
//! One leg is one atomic transaction: borrow the destination side from the
//! pool, compute the debt, repay it from a coin split off the trader's
//! source funds, then assert the slippage bound. Command order matters;
//! the pool rejects a receipt repaid out of order.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::ledger::signer::Signer;
use crate::ledger::transaction::{
    nested, parse_type, Argument, ProgrammableTransaction, PtbBuilder, TypeTag,
};
use crate::ledger::{estimate_and_submit, Ledger, TransactionDraft};
use crate::pools::coins::CoinType;
use crate::pools::{Pool, CLOCK, FRAMEWORK_PACKAGE, MARKET_CONFIG, SLIPPAGE_PACKAGE, TRADE_PACKAGE};
use crate::types::{CoinObject, FarmError, SuiAddress, SwapDirection};

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Handles produced while building one flash swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashSwapContext {
    /// Exactly `amount` of the source coin.
    pub trade_coin: Argument,
    /// `Balance<A>` returned by `flash_swap`.
    pub borrowed_out: Argument,
    /// `Balance<B>` returned by `flash_swap`.
    pub borrowed_debt: Argument,
    pub receipt: Argument,
    /// `coin::zero<Destination>`; fills the destination side of the repayment.
    pub placeholder: Argument,
    /// Source-side debt selected from `swap_receipt_debts`.
    pub owed: Argument,
    /// Coin of size `owed` split off `trade_coin`.
    pub repayment_coin: Argument,
    pub repay_a: Argument,
    pub repay_b: Argument,
    /// Destination coin handed to the trader.
    pub proceeds: Argument,
}

#[derive(Debug, Clone)]
pub struct FlashSwapPlan {
    pub programmable: ProgrammableTransaction,
    pub context: FlashSwapContext,
}

/// The two balances returned by `trade::flash_swap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlashSlot {
    Out,
    Debt,
}

impl FlashSlot {
    fn coin(self, pool: &Pool) -> CoinType {
        match self {
            FlashSlot::Out => pool.token_a,
            FlashSlot::Debt => pool.token_b,
        }
    }
}

/// `(destroyed, kept)`: the source-typed slot is zero and gets destroyed;
/// the destination-typed slot carries the proceeds.
fn slots_for(direction: SwapDirection) -> (FlashSlot, FlashSlot) {
    match direction {
        SwapDirection::AToB => (FlashSlot::Out, FlashSlot::Debt),
        SwapDirection::BToA => (FlashSlot::Debt, FlashSlot::Out),
    }
}

fn check_slots(
    pool: &Pool,
    direction: SwapDirection,
    destroyed: FlashSlot,
    kept: FlashSlot,
) -> Result<(), FarmError> {
    if pool.token_a == pool.token_b {
        return Err(FarmError::InvariantViolation(format!(
            "pool {} has identical token types",
            pool.name
        )));
    }
    let source = pool.source(direction);
    let destination = pool.destination(direction);
    if destroyed.coin(pool) != source {
        return Err(FarmError::InvariantViolation(format!(
            "destroy_zero would consume {} but the source is {source}",
            destroyed.coin(pool)
        )));
    }
    if kept.coin(pool) != destination {
        return Err(FarmError::InvariantViolation(format!(
            "kept balance is {} but the destination is {destination}",
            kept.coin(pool)
        )));
    }
    Ok(())
}

fn type_tag(coin: CoinType) -> Result<TypeTag, FarmError> {
    parse_type(coin.type_tag)
}

/// Build the flash-swap transaction for one leg.
///
/// `source_coins` are the trader's fragments of the source coin; they are
/// ignored when the source is SUI, which is split off the gas coin.
pub fn build_flash_swap(
    pool: &Pool,
    direction: SwapDirection,
    amount: u64,
    recipient: SuiAddress,
    source_coins: &[CoinObject],
) -> Result<FlashSwapPlan, FarmError> {
    if amount == 0 {
        return Err(FarmError::InvariantViolation("flash swap of zero amount".into()));
    }
    let (destroyed, kept) = slots_for(direction);
    check_slots(pool, direction, destroyed, kept)?;

    let source = pool.source(direction);
    let destination = pool.destination(direction);
    let tag_a = type_tag(pool.token_a)?;
    let tag_b = type_tag(pool.token_b)?;
    let tag_source = type_tag(source)?;
    let tag_destination = type_tag(destination)?;

    let mut tx = PtbBuilder::new();

    // -- Inputs --
    let split_amount = tx.pure(&amount)?;
    let pool_ref = tx.shared_object(pool.shared_ref());
    let a2b = tx.pure(&!direction.is_reverse())?;
    let simulate = tx.pure(&true)?;
    let quantity = tx.pure(&amount)?;
    let parameter = tx.pure(&pool.curve_parameter(direction))?;
    let clock = tx.shared_object(CLOCK);
    let market = tx.shared_object(MARKET_CONFIG);
    let revert_on_slippage = tx.pure(&!direction.is_reverse())?;
    let recipient = tx.pure(&recipient)?;

    // 1. Trade coin
    let trade_coin = if source.is_native_gas() {
        nested(tx.split_coins(Argument::Gas, vec![split_amount]), 0)
    } else {
        let (first, rest) = source_coins.split_first().ok_or_else(|| {
            FarmError::InsufficientBalance {
                coin: source.symbol.to_string(),
                requested: amount as u128,
                available: 0,
            }
        })?;
        let primary = tx.owned_object(first.object_ref.clone());
        if !rest.is_empty() {
            let others = rest
                .iter()
                .map(|c| tx.owned_object(c.object_ref.clone()))
                .collect();
            tx.merge_coins(primary, others);
        }
        nested(tx.split_coins(primary, vec![split_amount]), 0)
    };

    // 2. Borrow
    let flash = tx.move_call(
        TRADE_PACKAGE,
        "trade",
        "flash_swap",
        vec![tag_a.clone(), tag_b.clone()],
        vec![pool_ref, a2b, simulate, quantity, parameter, clock, market],
    )?;
    let borrowed_out = nested(flash, 0);
    let borrowed_debt = nested(flash, 1);
    let receipt = nested(flash, 2);
    let slot_arg = |slot: FlashSlot| match slot {
        FlashSlot::Out => borrowed_out,
        FlashSlot::Debt => borrowed_debt,
    };

    // 3. Source-side borrow is always zero
    tx.move_call(
        FRAMEWORK_PACKAGE,
        "balance",
        "destroy_zero",
        vec![tag_source.clone()],
        vec![slot_arg(destroyed)],
    )?;

    // 4. Destination-side repayment is empty
    let placeholder = tx.move_call(
        FRAMEWORK_PACKAGE,
        "coin",
        "zero",
        vec![tag_destination.clone()],
        vec![],
    )?;

    // 5. What the receipt says we owe
    let debts = tx.move_call(TRADE_PACKAGE, "trade", "swap_receipt_debts", vec![], vec![receipt])?;
    let owed = match direction {
        SwapDirection::AToB => nested(debts, 0),
        SwapDirection::BToA => nested(debts, 1),
    };

    // 6. Carve the repayment out of the trade coin
    let repayment_coin = tx.move_call(
        FRAMEWORK_PACKAGE,
        "coin",
        "split",
        vec![tag_source],
        vec![trade_coin, owed],
    )?;

    // 7. Repayment balances, ordered (A, B)
    let (coin_a, coin_b) = match direction {
        SwapDirection::AToB => (repayment_coin, placeholder),
        SwapDirection::BToA => (placeholder, repayment_coin),
    };
    let repay_a = tx.move_call(FRAMEWORK_PACKAGE, "coin", "into_balance", vec![tag_a.clone()], vec![coin_a])?;
    let repay_b = tx.move_call(FRAMEWORK_PACKAGE, "coin", "into_balance", vec![tag_b.clone()], vec![coin_b])?;

    // 8. Repay
    tx.move_call(
        TRADE_PACKAGE,
        "trade",
        "repay_flash_swap",
        vec![tag_a.clone(), tag_b.clone()],
        vec![pool_ref, receipt, repay_a, repay_b, market],
    )?;

    // 9. Slippage bound
    tx.move_call(
        SLIPPAGE_PACKAGE,
        "slippage_check",
        "assert_slippage",
        vec![tag_a, tag_b],
        vec![pool_ref, parameter, revert_on_slippage],
    )?;

    // 10. Proceeds and change back to the trader
    let proceeds = tx.move_call(
        FRAMEWORK_PACKAGE,
        "coin",
        "from_balance",
        vec![tag_destination],
        vec![slot_arg(kept)],
    )?;
    tx.transfer_objects(vec![trade_coin], recipient);
    tx.transfer_objects(vec![proceeds], recipient);

    Ok(FlashSwapPlan {
        programmable: tx.finish(),
        context: FlashSwapContext {
            trade_coin,
            borrowed_out,
            borrowed_debt,
            receipt,
            placeholder,
            owed,
            repayment_coin,
            repay_a,
            repay_b,
            proceeds,
        },
    })
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Result of one confirmed leg.
#[derive(Debug, Clone, PartialEq)]
pub struct LegReceipt {
    pub digest: String,
    pub direction: SwapDirection,
    pub source: CoinType,
    pub destination: CoinType,
    /// Amount requested, in source base units.
    pub requested: u64,
    /// Destination amount credited to the trader, in base units.
    pub realized: u64,
    /// Balance deltas with the gas charge added back on the native-coin
    /// side, so they reflect the swap alone.
    pub source_delta: i128,
    pub destination_delta: i128,
    pub gas_budget: u64,
}

/// Builds, prices and submits flash-swap legs.
pub struct FlashSwapExecutor {
    ledger: Arc<dyn Ledger>,
}

impl FlashSwapExecutor {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Execute one leg of `amount` source base units.
    ///
    /// Source fragments are fetched fresh; the previous leg has consumed or
    /// replaced the ones seen before it.
    pub async fn execute_leg(
        &self,
        signer: &dyn Signer,
        pool: &Pool,
        direction: SwapDirection,
        amount: u64,
    ) -> Result<LegReceipt, FarmError> {
        let trader = signer.address();
        let source = pool.source(direction);
        let destination = pool.destination(direction);

        let fragments = if source.is_native_gas() {
            Vec::new()
        } else {
            self.ledger.spendable_coins(trader, source.type_tag).await?
        };

        let plan = build_flash_swap(pool, direction, amount, trader, &fragments)?;
        debug!(
            pool = pool.name,
            direction = %direction,
            amount,
            fragments = fragments.len(),
            commands = plan.programmable.commands.len(),
            "Flash swap built"
        );

        let draft = TransactionDraft::new(trader, plan.programmable);
        let (outcome, gas_budget) = estimate_and_submit(self.ledger.as_ref(), draft, signer).await?;

        // The sender's native-coin change already has gas taken out.
        let gas_paid = outcome.gas_used.net_charge();
        let swap_delta = |coin: CoinType| {
            let delta = outcome.delta(trader, coin.type_tag);
            if coin.is_native_gas() {
                delta + gas_paid
            } else {
                delta
            }
        };
        let destination_delta = swap_delta(destination);
        let source_delta = swap_delta(source);

        if destination_delta <= 0 {
            return Err(FarmError::LedgerExecution {
                digest: outcome.digest,
                reason: format!("no {destination} credited (delta {destination_delta})"),
            });
        }
        if source_delta > 0 {
            warn!(
                digest = %outcome.digest,
                source = %source,
                source_delta,
                "Source balance increased across a flash swap"
            );
        }

        let realized = u64::try_from(destination_delta).map_err(|_| {
            FarmError::Decode(format!("realized amount {destination_delta} exceeds u64"))
        })?;

        debug!(
            pool = pool.name,
            direction = %direction,
            realized,
            gas_paid,
            digest = %outcome.digest,
            "Leg confirmed"
        );

        Ok(LegReceipt {
            digest: outcome.digest,
            direction,
            source,
            destination,
            requested: amount,
            realized,
            source_delta,
            destination_delta,
            gas_budget,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
